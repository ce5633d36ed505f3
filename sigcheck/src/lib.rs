// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Extraction of Authenticode signing metadata from PE images.
//!
//! [`inspect`] reads a file and produces a [`TrustReport`]: the trust
//! verdict, signing time, publisher information from the Opus info
//! attribute, and the signer and counter-signer certificates. Each
//! piece is optional; a file with a damaged or missing signature still
//! produces a complete report.
//!
//! References:
//! * <https://docs.microsoft.com/en-us/windows/win32/debug/pe-format>
//! * Windows Authenticode Portable Executable Signature Format

#![forbid(unsafe_code)]
#![warn(clippy::arithmetic_side_effects)]
#![warn(missing_docs)]

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("sigcheck requires a target with at least 32-bit pointers");

mod attributes;
mod authenticode_digest;
mod container;
mod countersign;
mod error;
mod opus;
mod pe;
mod pe_object;
mod report;
mod signature;
mod signer;
mod store;
mod text;
mod time;
mod trust;
mod win_cert;

pub use attributes::{
    Attribute, AttributeSet, KnownAttribute, COUNTER_SIGNATURE_OBJID,
    SIGNING_TIME_OBJID, SPC_SP_OPUS_INFO_OBJID,
};
pub use authenticode_digest::{authenticode_digest, authenticode_digest_for};
pub use container::{
    ContainerQuery, EmbeddedContainerQuery, QueryError, SignedContainer,
};
pub use countersign::{
    counter_signing_time, decode_signing_time, resolve_counter_signer,
};
pub use error::{DecodeError, MalformedPayload};
pub use opus::{Link, OpusInfo};
pub use pe::{Architecture, PeOffsetError, PeOffsets, PeTrait};
pub use pe_object::parse_pe;
pub use report::{
    inspect, inspect_with, InspectError, ReportAssembler, Stage, TrustReport,
};
pub use signature::{
    AuthenticodeSignature, AuthenticodeSignatureParseError, DigestInfo,
    SpcAttributeTypeAndOptionalValue, SpcIndirectDataContent,
    SPC_INDIRECT_DATA_OBJID,
};
pub use signer::{CertificateIdentity, SignerInfo};
pub use store::{
    simple_display_name, CertificateRecord, CertificateStore, NameKind,
};
pub use time::{
    derive, sentinel, try_derive, FileTime, TimestampConversionError,
    TimestampInfo, TimestampSource, SECONDS_TO_UNIX_EPOCH, TICKS_PER_SECOND,
};
pub use trust::{
    OfflineTrustVerifier, RevocationMode, TrustPolicy, TrustVerdict,
    TrustVerifier,
};
pub use win_cert::{
    AttributeCertificate, AttributeCertificateAuthenticodeError,
    AttributeCertificateError, AttributeCertificateIterator,
    WIN_CERT_REVISION_2_0, WIN_CERT_TYPE_PKCS_SIGNED_DATA,
};

/// Convert a `u32` to a `usize`.
///
/// Lossless on every target this crate builds for.
#[allow(clippy::as_conversions)]
fn usize_from_u32(val: u32) -> usize {
    val as usize
}
