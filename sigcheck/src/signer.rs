// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::attributes::{Attribute, AttributeSet};
use crate::DecodeError;
use cms::signed_data::SignerIdentifier;
use der::Decode;
use x509_cert::attr::Attributes;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

/// Issuer name and serial number identifying a certificate.
///
/// This is a lookup key into a [`CertificateStore`](crate::CertificateStore).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateIdentity {
    /// Distinguished name of the certificate issuer.
    pub issuer: Name,
    /// Serial number assigned by the issuer.
    pub serial_number: SerialNumber,
}

/// The parts of a CMS signer info needed for a trust report.
///
/// The primary signer and a counter-signer share this shape; a
/// counter-signature payload is decoded with [`SignerInfo::from_der`]
/// just like any other signer info.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignerInfo {
    /// Issuer of the signing certificate.
    pub issuer: Name,
    /// Serial number of the signing certificate.
    pub serial_number: SerialNumber,
    /// Attributes covered by the signature.
    pub authenticated_attributes: AttributeSet,
    /// Attributes added after signing, such as counter-signatures.
    pub unauthenticated_attributes: AttributeSet,
}

fn attribute_set(attrs: Option<&Attributes>) -> Result<AttributeSet, DecodeError> {
    attrs
        .into_iter()
        .flat_map(|attrs| attrs.iter())
        .map(Attribute::try_from)
        .collect()
}

impl SignerInfo {
    /// Decode a DER-encoded CMS `SignerInfo`.
    pub fn from_der(bytes: &[u8]) -> Result<Self, DecodeError> {
        let signer_info = cms::signed_data::SignerInfo::from_der(bytes)?;
        Self::try_from(&signer_info)
    }

    /// Identity of the signing certificate.
    pub fn identity(&self) -> CertificateIdentity {
        CertificateIdentity {
            issuer: self.issuer.clone(),
            serial_number: self.serial_number.clone(),
        }
    }
}

impl TryFrom<&cms::signed_data::SignerInfo> for SignerInfo {
    type Error = DecodeError;

    fn try_from(
        signer_info: &cms::signed_data::SignerInfo,
    ) -> Result<Self, DecodeError> {
        let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer_info.sid
        else {
            return Err(DecodeError::UnsupportedSignerIdentifier);
        };

        Ok(Self {
            issuer: sid.issuer.clone(),
            serial_number: sid.serial_number.clone(),
            authenticated_attributes: attribute_set(
                signer_info.signed_attrs.as_ref(),
            )?,
            unauthenticated_attributes: attribute_set(
                signer_info.unsigned_attrs.as_ref(),
            )?,
        })
    }
}
