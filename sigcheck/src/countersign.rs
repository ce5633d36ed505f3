// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::attributes::{AttributeSet, KnownAttribute};
use crate::time::FileTime;
use crate::{DecodeError, SignerInfo};
use chrono::NaiveDateTime;
use der::Decode;
use x509_cert::time::Time;

/// Find and decode the counter-signer of a primary signer.
///
/// Only the unauthenticated attributes are searched, since a
/// counter-signature is added after the primary signature. A missing
/// attribute is the common case for binaries without a timestamp; a
/// payload that does not decode is logged and treated the same way.
pub fn resolve_counter_signer(
    unauthenticated_attributes: &AttributeSet,
) -> Option<SignerInfo> {
    let attr =
        unauthenticated_attributes.find_known(KnownAttribute::CounterSignature)?;
    let decoded = attr
        .first_value()
        .ok_or(DecodeError::malformed("attribute has no value"))
        .and_then(SignerInfo::from_der);
    match decoded {
        Ok(signer) => Some(signer),
        Err(err) => {
            tracing::warn!(%err, "ignoring undecodable counter-signature");
            None
        }
    }
}

/// Decode a `signingTime` attribute value.
pub fn decode_signing_time(bytes: &[u8]) -> Result<FileTime, DecodeError> {
    let time = Time::from_der(bytes)?;
    FileTime::from_unix_duration(time.to_unix_duration())
        .map_err(|_| DecodeError::malformed("signing time out of range"))
}

/// Signing time of a counter-signer, as local calendar time.
///
/// The counter-signer's authenticated attributes are searched. `None`
/// when the attribute is absent or does not decode, in which case the
/// caller falls back to the header timestamp.
pub fn counter_signing_time(counter_signer: &SignerInfo) -> Option<NaiveDateTime> {
    let attr = counter_signer
        .authenticated_attributes
        .find_known(KnownAttribute::SigningTime)?;
    let decoded = attr
        .first_value()
        .ok_or(DecodeError::malformed("attribute has no value"))
        .and_then(decode_signing_time)
        .and_then(|ft| {
            ft.to_local()
                .map_err(|_| DecodeError::malformed("signing time out of range"))
        });
    match decoded {
        Ok(time) => Some(time),
        Err(err) => {
            tracing::error!(%err, "failed to decode counter-signing time");
            None
        }
    }
}
