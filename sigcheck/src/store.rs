// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::text::decode_directory_string;
use crate::{AuthenticodeSignature, CertificateIdentity};
use der::asn1::ObjectIdentifier;
use der::Encode;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use sha2::{Digest, Sha256};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const ORGANIZATIONAL_UNIT: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.4.11");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const EMAIL_ADDRESS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// Which name of a certificate to display.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameKind {
    /// The issuer name.
    Issuer,
    /// The subject name.
    Subject,
}

/// Simple display form of a distinguished name.
///
/// The first common name wins, then organisational unit, organisation
/// and e-mail address; failing those, the first string attribute.
pub fn simple_display_name(name: &Name) -> Option<String> {
    let attrs = || name.0.iter().flat_map(|rdn| rdn.0.iter());
    [COMMON_NAME, ORGANIZATIONAL_UNIT, ORGANIZATION, EMAIL_ADDRESS]
        .iter()
        .find_map(|oid| {
            attrs()
                .filter(|atv| atv.oid == *oid)
                .find_map(|atv| decode_directory_string((&atv.value).into()))
        })
        .or_else(|| {
            attrs().find_map(|atv| decode_directory_string((&atv.value).into()))
        })
}

/// A certificate found in the signed container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateRecord {
    certificate: Certificate,
}

impl CertificateRecord {
    /// Wrap a certificate.
    pub fn new(certificate: Certificate) -> Self {
        Self { certificate }
    }

    /// The underlying certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Simple display form of the issuer or subject name.
    pub fn display_name(&self, kind: NameKind) -> Option<String> {
        let tbs = &self.certificate.tbs_certificate;
        match kind {
            NameKind::Issuer => simple_display_name(&tbs.issuer),
            NameKind::Subject => simple_display_name(&tbs.subject),
        }
    }

    /// Serial number of the certificate.
    pub fn serial_number(&self) -> &SerialNumber {
        &self.certificate.tbs_certificate.serial_number
    }

    /// Lowercase hex serial number without separators or the DER sign
    /// byte, as `openssl x509 -serial` prints it.
    pub fn serial_hex(&self) -> String {
        let bytes = match self.serial_number().as_bytes() {
            [0, rest @ ..] if !rest.is_empty() => rest,
            bytes => bytes,
        };
        hex::encode(bytes)
    }

    /// Whether this is the certificate `identity` refers to.
    pub fn matches(&self, identity: &CertificateIdentity) -> bool {
        let tbs = &self.certificate.tbs_certificate;
        tbs.issuer == identity.issuer
            && tbs.serial_number == identity.serial_number
    }

    /// Lowercase hex SHA-256 of the DER encoding.
    pub fn sha256_thumbprint(&self) -> Option<String> {
        let der = self.certificate.to_der().ok()?;
        Some(hex::encode(Sha256::digest(der)))
    }
}

impl Serialize for CertificateRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CertificateRecord", 3)?;
        state.serialize_field("issuer_name", &self.display_name(NameKind::Issuer))?;
        state.serialize_field(
            "subject_name",
            &self.display_name(NameKind::Subject),
        )?;
        state.serialize_field("serial_number", &self.serial_hex())?;
        state.end()
    }
}

/// Certificates carried by a signed container.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CertificateStore {
    records: Vec<CertificateRecord>,
}

impl CertificateStore {
    /// Create a store holding `certificates`.
    pub fn new(certificates: impl IntoIterator<Item = Certificate>) -> Self {
        Self {
            records: certificates.into_iter().map(CertificateRecord::new).collect(),
        }
    }

    /// Collect the certificates embedded in a signature.
    pub fn from_signature(signature: &AuthenticodeSignature) -> Self {
        Self::new(signature.certificates().cloned())
    }

    /// Find the certificate with exactly this issuer and serial number.
    pub fn find_by_subject(
        &self,
        identity: &CertificateIdentity,
    ) -> Option<&CertificateRecord> {
        let found = self.records.iter().find(|r| r.matches(identity));
        if found.is_none() {
            tracing::debug!(
                issuer = %identity.issuer,
                serial = %identity.serial_number,
                "certificate not in store"
            );
        }
        found
    }

    /// Iterate over every certificate.
    pub fn iter(&self) -> impl Iterator<Item = &CertificateRecord> {
        self.records.iter()
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
