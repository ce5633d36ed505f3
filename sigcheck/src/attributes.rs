// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::DecodeError;
use der::asn1::ObjectIdentifier;
use der::Encode;

/// OID of the Authenticode `SpcSpOpusInfo` authenticated attribute.
pub const SPC_SP_OPUS_INFO_OBJID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.12");

/// OID of the PKCS #9 `countersignature` unauthenticated attribute.
pub const COUNTER_SIGNATURE_OBJID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.6");

/// OID of the PKCS #9 `signingTime` authenticated attribute.
pub const SIGNING_TIME_OBJID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

/// Attributes this crate knows how to decode.
///
/// Any other identifier is never searched for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KnownAttribute {
    /// Publisher information, decoded by [`OpusInfo::decode`](crate::OpusInfo::decode).
    OpusInfo,
    /// Nested signer info of a timestamp authority.
    CounterSignature,
    /// Signing time of a counter-signer.
    SigningTime,
}

impl KnownAttribute {
    /// Object identifier of the attribute.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::OpusInfo => SPC_SP_OPUS_INFO_OBJID,
            Self::CounterSignature => COUNTER_SIGNATURE_OBJID,
            Self::SigningTime => SIGNING_TIME_OBJID,
        }
    }

    /// Short name used in log output.
    pub fn name(self) -> &'static str {
        match self {
            Self::OpusInfo => "opus info",
            Self::CounterSignature => "counter-signature",
            Self::SigningTime => "signing time",
        }
    }
}

/// A signer-info attribute: an identifier and its DER-encoded values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribute {
    /// Attribute type.
    pub oid: ObjectIdentifier,
    /// Each value as a complete DER TLV, in container order.
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    /// Create an attribute from an identifier and encoded values.
    pub fn new(oid: ObjectIdentifier, values: Vec<Vec<u8>>) -> Self {
        Self { oid, values }
    }

    /// The first value, which is the only one ever decoded.
    pub fn first_value(&self) -> Option<&[u8]> {
        self.values.first().map(Vec::as_slice)
    }
}

impl TryFrom<&x509_cert::attr::Attribute> for Attribute {
    type Error = DecodeError;

    fn try_from(attr: &x509_cert::attr::Attribute) -> Result<Self, DecodeError> {
        let values = attr
            .values
            .iter()
            .map(|value| value.to_der())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(attr.oid, values))
    }
}

/// Attributes of one signer info, in container order.
///
/// Identifiers are not guaranteed to be unique.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeSet(pub Vec<Attribute>);

impl AttributeSet {
    /// Find the first attribute whose identifier equals `oid`.
    ///
    /// Later duplicates are ignored. Absence is a normal outcome.
    pub fn find(&self, oid: &ObjectIdentifier) -> Option<&Attribute> {
        self.0.iter().find(|attr| attr.oid == *oid)
    }

    /// Find the first attribute of a known kind.
    pub fn find_known(&self, kind: KnownAttribute) -> Option<&Attribute> {
        let found = self.find(&kind.oid());
        if found.is_none() {
            tracing::debug!(attribute = kind.name(), "attribute not present");
        }
        found
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no attribute.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the attributes in order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }
}

impl From<Vec<Attribute>> for AttributeSet {
    fn from(attrs: Vec<Attribute>) -> Self {
        Self(attrs)
    }
}

impl FromIterator<Attribute> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
