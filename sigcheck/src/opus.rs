// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Publisher information (`SpcSpOpusInfo`).
//!
//! ```text
//! SpcSpOpusInfo ::= SEQUENCE {
//!     programName    [0] EXPLICIT SpcString OPTIONAL,
//!     moreInfo       [1] EXPLICIT SpcLink OPTIONAL,
//!     publisherInfo  [2] EXPLICIT SpcLink OPTIONAL
//! }
//!
//! SpcString ::= CHOICE {
//!     unicode  [0] IMPLICIT BMPString,
//!     ascii    [1] IMPLICIT IA5String
//! }
//!
//! SpcLink ::= CHOICE {
//!     url      [0] IMPLICIT IA5String,
//!     moniker  [1] IMPLICIT SpcSerializedObject,
//!     file     [2] EXPLICIT SpcString
//! }
//! ```

use crate::attributes::Attribute;
use crate::text::{decode_bmp, decode_ia5};
use crate::DecodeError;
use der::asn1::AnyRef;
use der::{Decode, Reader, SliceReader, Tag, Tagged};
use serde::Serialize;

/// A publisher-supplied link.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Link {
    /// The `url` choice.
    Url(String),
    /// The `file` choice.
    File(String),
    /// Any other choice. Not distinguishable from a deliberately empty
    /// link.
    None,
}

impl Link {
    /// The link target, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Url(s) | Self::File(s) => Some(s),
            Self::None => None,
        }
    }
}

/// Program name and links from the Opus info attribute.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OpusInfo {
    /// Name of the signed program.
    pub program_name: Option<String>,
    /// Link to the publisher.
    pub publisher_link: Option<Link>,
    /// Link to more information about the program.
    pub more_info_link: Option<Link>,
}

fn context_tag(value: &AnyRef<'_>) -> Option<(u8, bool)> {
    match value.tag() {
        Tag::ContextSpecific {
            constructed,
            number,
        } => Some((number.value(), constructed)),
        _ => None,
    }
}

/// Unwrap an `[n] EXPLICIT` field.
fn explicit_inner<'a>(field: AnyRef<'a>) -> Result<AnyRef<'a>, DecodeError> {
    Ok(AnyRef::from_der(field.value())?)
}

fn decode_spc_string(value: AnyRef<'_>) -> Result<Option<String>, DecodeError> {
    match context_tag(&value) {
        Some((0, false)) => decode_bmp(value.value()).map(Some),
        Some((1, false)) => decode_ia5(value.value()).map(Some),
        _ => Ok(None),
    }
}

fn decode_link(value: AnyRef<'_>) -> Result<Link, DecodeError> {
    let link = match context_tag(&value) {
        Some((0, false)) => Link::Url(decode_ia5(value.value())?),
        Some((2, true)) => match decode_spc_string(explicit_inner(value)?)? {
            Some(file) => Link::File(file),
            None => Link::None,
        },
        _ => Link::None,
    };
    Ok(link)
}

impl OpusInfo {
    /// Decode an `SpcSpOpusInfo` structure from DER.
    pub fn from_der(bytes: &[u8]) -> Result<Self, DecodeError> {
        let outer = AnyRef::from_der(bytes)?;
        if outer.tag() != Tag::Sequence {
            return Err(DecodeError::malformed("opus info is not a SEQUENCE"));
        }

        let mut info = Self::default();
        let mut reader = SliceReader::new(outer.value())?;
        while !reader.is_finished() {
            let field = AnyRef::decode(&mut reader)?;
            // Fields are all explicitly tagged; anything else is an
            // extension and is skipped.
            let Some((number, true)) = context_tag(&field) else {
                continue;
            };
            match number {
                0 if info.program_name.is_none() => {
                    info.program_name =
                        decode_spc_string(explicit_inner(field)?)?;
                }
                1 if info.more_info_link.is_none() => {
                    info.more_info_link =
                        Some(decode_link(explicit_inner(field)?)?);
                }
                2 if info.publisher_link.is_none() => {
                    info.publisher_link =
                        Some(decode_link(explicit_inner(field)?)?);
                }
                _ => {}
            }
        }
        Ok(info)
    }

    /// Decode the first value of a located Opus info attribute.
    ///
    /// Later values are ignored.
    pub fn decode(attribute: &Attribute) -> Result<Self, DecodeError> {
        let value = attribute
            .first_value()
            .ok_or(DecodeError::malformed("attribute has no value"))?;
        Self::from_der(value)
    }
}
