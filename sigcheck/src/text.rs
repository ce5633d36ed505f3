// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Copying ASN.1 string contents into owned strings.

use crate::DecodeError;
use der::asn1::AnyRef;
use der::{Tag, Tagged};

fn allocate(len: usize) -> Result<String, DecodeError> {
    let mut s = String::new();
    s.try_reserve_exact(len)
        .map_err(|_| DecodeError::OutOfMemory)?;
    Ok(s)
}

/// Decode big-endian UTF-16 (`BMPString`) contents.
///
/// A trailing NUL terminator is dropped.
pub(crate) fn decode_bmp(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::malformed("odd BMPString length"));
    }
    let mut s = allocate(bytes.len())?;
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    for c in char::decode_utf16(units) {
        s.push(c.map_err(|_| DecodeError::malformed("invalid UTF-16"))?);
    }
    if s.ends_with('\0') {
        s.pop();
    }
    Ok(s)
}

/// Decode 7-bit (`IA5String`) contents.
pub(crate) fn decode_ia5(bytes: &[u8]) -> Result<String, DecodeError> {
    if !bytes.is_ascii() {
        return Err(DecodeError::malformed("non-ASCII IA5String"));
    }
    let mut s = allocate(bytes.len())?;
    s.extend(bytes.iter().map(|&b| char::from(b)));
    if s.ends_with('\0') {
        s.pop();
    }
    Ok(s)
}

/// Decode a directory string of any of the usual string types.
///
/// Returns `None` for non-string values.
pub(crate) fn decode_directory_string(value: AnyRef<'_>) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::VisibleString => {
            core::str::from_utf8(value.value()).ok().map(str::to_owned)
        }
        // T.61 is read as Latin-1.
        Tag::TeletexString => {
            let mut s = allocate(value.value().len()).ok()?;
            s.extend(value.value().iter().map(|&b| char::from(b)));
            Some(s)
        }
        Tag::Ia5String => decode_ia5(value.value()).ok(),
        Tag::BmpString => decode_bmp(value.value()).ok(),
        _ => None,
    }
}
