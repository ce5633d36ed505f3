// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use cms::cert::CertificateChoices;
use cms::content_info::CmsVersion;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerInfo};
use core::fmt::{self, Display, Formatter};
use der::asn1::{ObjectIdentifier, OctetString};
use der::Decode;
use der::{Sequence, SliceReader};
use x509_cert::Certificate;

/// OID for [`SpcIndirectDataContent`].
pub const SPC_INDIRECT_DATA_OBJID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.4");

/// Authenticode ASN.1 image and digest data.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcIndirectDataContent {
    /// Image data.
    pub data: SpcAttributeTypeAndOptionalValue,

    /// Authenticode digest.
    pub message_digest: DigestInfo,
}

/// Authenticode ASN.1 image data.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcAttributeTypeAndOptionalValue {
    /// Type of data stored in the `value` field.
    pub value_type: ObjectIdentifier,

    /// Image data. Kept opaque; only the digest is consulted.
    pub value: der::Any,
}

/// Authenticode ASN.1 digest data.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct DigestInfo {
    /// Authenticode digest algorithm.
    pub digest_algorithm: spki::AlgorithmIdentifierOwned,

    /// Authenticode digest.
    pub digest: OctetString,
}

/// Error returned by [`AuthenticodeSignature::from_bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthenticodeSignatureParseError {
    /// The signature data is empty.
    Empty,

    /// The signature data is not valid [`ContentInfo`].
    InvalidContentInfo(der::Error),

    /// The content type does not match [`const_oid::db::rfc6268::ID_SIGNED_DATA`].
    InvalidContentType(ObjectIdentifier),

    /// The content info is not valid [`SignedData`].
    InvalidSignedData(der::Error),

    /// The version of [`SignedData`] is not 1.
    InvalidSignedDataVersion(CmsVersion),

    /// The number of digest algorithms is not 1.
    InvalidNumDigestAlgorithms(usize),

    /// The encapsulated content type does not match [`SPC_INDIRECT_DATA_OBJID`].
    InvalidEncapsulatedContentType(ObjectIdentifier),

    /// The encapsulated content is empty.
    EmptyEncapsulatedContent,

    /// The encapsulated content is not valid [`SpcIndirectDataContent`].
    InvalidSpcIndirectDataContent(der::Error),

    /// The number of signer infos is not 1.
    InvalidNumSignerInfo(usize),

    /// The version of [`SignerInfo`] is not 1.
    InvalidSignerInfoVersion(CmsVersion),

    /// The digest algorithm is not internally consistent.
    AlgorithmMismatch,

    /// No authenticated attributes are present.
    EmptyAuthenticatedAttributes,

    /// The `contentType` authenticated attribute is missing.
    MissingContentTypeAuthenticatedAttribute,

    /// The `messageDigest` authenticated attribute is missing.
    MissingMessageDigestAuthenticatedAttribute,
}

impl Display for AuthenticodeSignatureParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "signature data is empty"),
            Self::InvalidContentInfo(err) => {
                write!(f, "invalid content info: {err}")
            }
            Self::InvalidContentType(oid) => {
                write!(f, "unexpected content type: {oid}")
            }
            Self::InvalidSignedData(err) => {
                write!(f, "invalid signed data: {err}")
            }
            Self::InvalidSignedDataVersion(version) => {
                write!(f, "unexpected signed data version: {version:?}")
            }
            Self::InvalidNumDigestAlgorithms(num) => {
                write!(f, "expected one digest algorithm, found {num}")
            }
            Self::InvalidEncapsulatedContentType(oid) => {
                write!(f, "unexpected encapsulated content type: {oid}")
            }
            Self::EmptyEncapsulatedContent => {
                write!(f, "encapsulated content is empty")
            }
            Self::InvalidSpcIndirectDataContent(err) => {
                write!(f, "invalid indirect data content: {err}")
            }
            Self::InvalidNumSignerInfo(num) => {
                write!(f, "expected one signer info, found {num}")
            }
            Self::InvalidSignerInfoVersion(version) => {
                write!(f, "unexpected signer info version: {version:?}")
            }
            Self::AlgorithmMismatch => {
                write!(f, "signer digest algorithm does not match signed data")
            }
            Self::EmptyAuthenticatedAttributes => {
                write!(f, "no authenticated attributes")
            }
            Self::MissingContentTypeAuthenticatedAttribute => {
                write!(f, "missing contentType authenticated attribute")
            }
            Self::MissingMessageDigestAuthenticatedAttribute => {
                write!(f, "missing messageDigest authenticated attribute")
            }
        }
    }
}

impl std::error::Error for AuthenticodeSignatureParseError {}

/// Parsed authenticode signature.
///
/// Only the structural rules of Authenticode are checked here. Whether
/// the signature is cryptographically valid or trusted is a separate
/// question answered by a [`TrustVerifier`](crate::TrustVerifier).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthenticodeSignature {
    signed_data: SignedData,
    signer_info: SignerInfo,
    indirect_data: SpcIndirectDataContent,
}

type ParseResult<T> = Result<T, AuthenticodeSignatureParseError>;

fn decode_signed_data(bytes: &[u8]) -> ParseResult<SignedData> {
    use AuthenticodeSignatureParseError as E;

    // The certificate table pads entries, so `bytes` may carry unused
    // trailing data that `Decode::from_der` would reject.
    let mut reader = SliceReader::new(bytes).map_err(|_| E::Empty)?;
    let content_info =
        ContentInfo::decode(&mut reader).map_err(E::InvalidContentInfo)?;
    if content_info.content_type != const_oid::db::rfc6268::ID_SIGNED_DATA {
        return Err(E::InvalidContentType(content_info.content_type));
    }

    let signed_data = content_info
        .content
        .decode_as::<SignedData>()
        .map_err(E::InvalidSignedData)?;
    if signed_data.version != CmsVersion::V1 {
        return Err(E::InvalidSignedDataVersion(signed_data.version));
    }
    if signed_data.digest_algorithms.len() != 1 {
        return Err(E::InvalidNumDigestAlgorithms(
            signed_data.digest_algorithms.len(),
        ));
    }
    Ok(signed_data)
}

fn decode_indirect_data(
    signed_data: &SignedData,
) -> ParseResult<SpcIndirectDataContent> {
    use AuthenticodeSignatureParseError as E;

    let encap = &signed_data.encap_content_info;
    if encap.econtent_type != SPC_INDIRECT_DATA_OBJID {
        return Err(E::InvalidEncapsulatedContentType(encap.econtent_type));
    }
    encap
        .econtent
        .as_ref()
        .ok_or(E::EmptyEncapsulatedContent)?
        .decode_as::<SpcIndirectDataContent>()
        .map_err(E::InvalidSpcIndirectDataContent)
}

fn single_signer_info(signed_data: &SignedData) -> ParseResult<SignerInfo> {
    use AuthenticodeSignatureParseError as E;

    let [signer_info] = signed_data.signer_infos.0.as_slice() else {
        return Err(E::InvalidNumSignerInfo(signed_data.signer_infos.0.len()));
    };
    if signer_info.version != CmsVersion::V1 {
        return Err(E::InvalidSignerInfoVersion(signer_info.version));
    }
    if signed_data.digest_algorithms.as_slice().first()
        != Some(&signer_info.digest_alg)
    {
        return Err(E::AlgorithmMismatch);
    }

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or(E::EmptyAuthenticatedAttributes)?;
    let has_attr = |oid| signed_attrs.iter().any(|a| a.oid == oid);
    if !has_attr(const_oid::db::rfc6268::ID_CONTENT_TYPE) {
        return Err(E::MissingContentTypeAuthenticatedAttribute);
    }
    if !has_attr(const_oid::db::rfc6268::ID_MESSAGE_DIGEST) {
        return Err(E::MissingMessageDigestAuthenticatedAttribute);
    }
    Ok(signer_info.clone())
}

impl AuthenticodeSignature {
    /// Parse an `AuthenticodeSignature` from DER-encoded bytes.
    ///
    /// Note that while many aspects of the data are validated, this
    /// does not constitute actual signature verification.
    pub fn from_bytes(bytes: &[u8]) -> ParseResult<Self> {
        let signed_data = decode_signed_data(bytes)?;
        let indirect_data = decode_indirect_data(&signed_data)?;
        let signer_info = single_signer_info(&signed_data)?;
        Ok(Self {
            signed_data,
            signer_info,
            indirect_data,
        })
    }

    /// Get the only [`SignerInfo`] of the signed data.
    pub fn signer_info(&self) -> &SignerInfo {
        &self.signer_info
    }

    /// Get the authenticode digest.
    ///
    /// This is the digest value embedded in the signature; it is not
    /// guaranteed to be correct.
    pub fn digest(&self) -> &[u8] {
        self.indirect_data.message_digest.digest.as_bytes()
    }

    /// Get the digest algorithm named by the indirect data content.
    pub fn digest_algorithm(&self) -> &ObjectIdentifier {
        &self.indirect_data.message_digest.digest_algorithm.oid
    }

    /// Get the certificates embedded in the signed data.
    ///
    /// Entries that are not plain X.509 certificates (attribute
    /// certificates, other formats) are skipped.
    pub fn certificates(&self) -> impl Iterator<Item = &Certificate> {
        self.signed_data
            .certificates
            .iter()
            .flat_map(|set| set.0.iter())
            .filter_map(|choice| match choice {
                CertificateChoices::Certificate(cert) => Some(cert),
                _ => None,
            })
    }
}
