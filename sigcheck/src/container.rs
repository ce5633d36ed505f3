// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{
    AttributeCertificateAuthenticodeError, AttributeCertificateError,
    AttributeCertificateIterator, CertificateStore, DecodeError, PeTrait,
    SignerInfo,
};
use core::fmt::{self, Display, Formatter};

/// Primary signer and certificates of a signed container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedContainer {
    /// The primary signer.
    pub signer: SignerInfo,
    /// Certificates shipped with the signature.
    pub store: CertificateStore,
}

/// Error returned by [`ContainerQuery::query`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryError {
    /// The image carries no embedded signature.
    NoSignature,

    /// The certificate table is malformed.
    InvalidCertificateTable(AttributeCertificateError),

    /// The first certificate table entry is not a valid signature.
    InvalidSignature(AttributeCertificateAuthenticodeError),

    /// The primary signer info could not be converted.
    InvalidSignerInfo(DecodeError),
}

impl QueryError {
    /// Whether the image simply has no signature, as opposed to a
    /// malformed one.
    pub fn is_no_signature(&self) -> bool {
        matches!(self, Self::NoSignature)
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSignature => write!(f, "no embedded signature"),
            Self::InvalidCertificateTable(err) => {
                write!(f, "malformed certificate table: {err}")
            }
            Self::InvalidSignature(err) => {
                write!(f, "malformed signature: {err}")
            }
            Self::InvalidSignerInfo(err) => {
                write!(f, "malformed signer info: {err}")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// Source of the primary signer info and certificate store of an image.
pub trait ContainerQuery {
    /// Open the signed container embedded in `pe`.
    fn query(&self, pe: &dyn PeTrait) -> Result<SignedContainer, QueryError>;
}

/// Reads the first entry of the PE attribute certificate table.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedContainerQuery;

impl ContainerQuery for EmbeddedContainerQuery {
    fn query(&self, pe: &dyn PeTrait) -> Result<SignedContainer, QueryError> {
        let first = AttributeCertificateIterator::new(pe)
            .map_err(QueryError::InvalidCertificateTable)?
            .and_then(|mut iter| iter.next())
            .ok_or(QueryError::NoSignature)?;
        let signature = first
            .get_authenticode_signature()
            .map_err(QueryError::InvalidSignature)?;
        let signer = SignerInfo::try_from(signature.signer_info())
            .map_err(QueryError::InvalidSignerInfo)?;

        Ok(SignedContainer {
            signer,
            store: CertificateStore::from_signature(&signature),
        })
    }
}
