// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use core::fmt::{self, Display, Formatter};

/// Why a payload was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MalformedPayload {
    /// The payload is not valid DER.
    Der(der::Error),

    /// The payload is valid DER but not of the expected shape.
    Invalid(&'static str),
}

impl Display for MalformedPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Der(err) => write!(f, "{err}"),
            Self::Invalid(what) => f.write_str(what),
        }
    }
}

/// Error returned when an attribute payload cannot be decoded.
///
/// Every variant aborts only the decode step that produced it; the
/// report field it feeds is left empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The payload could not be decoded, whether because of invalid
    /// DER or an unexpected structure.
    Malformed(MalformedPayload),

    /// A decoded string could not be allocated.
    OutOfMemory,

    /// The signer is identified by subject key identifier rather than
    /// issuer and serial number.
    UnsupportedSignerIdentifier,
}

impl DecodeError {
    pub(crate) const fn malformed(what: &'static str) -> Self {
        Self::Malformed(MalformedPayload::Invalid(what))
    }

    /// Whether the payload itself was rejected, as opposed to a resource
    /// failure. True for [`DecodeError::Malformed`], including invalid
    /// DER, and for an unsupported signer identifier.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::OutOfMemory)
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(why) => write!(f, "malformed payload: {why}"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::UnsupportedSignerIdentifier => {
                write!(f, "signer is not identified by issuer and serial number")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<der::Error> for DecodeError {
    fn from(err: der::Error) -> Self {
        Self::Malformed(MalformedPayload::Der(err))
    }
}
