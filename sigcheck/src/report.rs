// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::attributes::KnownAttribute;
use crate::countersign::{counter_signing_time, resolve_counter_signer};
use crate::time::{try_derive, TimestampInfo, TimestampSource};
use crate::{
    parse_pe, Architecture, CertificateRecord, ContainerQuery,
    EmbeddedContainerQuery, OfflineTrustVerifier, OpusInfo, PeTrait,
    SignedContainer, TrustPolicy, TrustVerdict, TrustVerifier,
};
use core::fmt::{self, Display, Formatter};
use serde::Serialize;
use std::path::Path;

/// Everything known about the signature of one file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TrustReport {
    /// Verdict of the trust verifier.
    pub trust_verdict: TrustVerdict,
    /// When the file was signed, or built.
    pub timestamp: TimestampInfo,
    /// Publisher metadata.
    pub opus_info: OpusInfo,
    /// Certificate of the primary signer.
    pub signer_certificate: Option<CertificateRecord>,
    /// Certificate of the counter-signer.
    pub counter_certificate: Option<CertificateRecord>,
    /// Word size of the image.
    pub architecture: Architecture,
}

impl TrustReport {
    /// Signing date as `HH:MM DD/MM/YYYY`.
    pub fn signing_date_display(&self) -> String {
        self.timestamp.display()
    }
}

/// States of [`ReportAssembler::assemble`], in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Nothing done yet.
    Start,
    /// Signer info and certificate store obtained.
    ContainerQueried,
    /// Primary signer certificate looked up.
    SignerResolved,
    /// Opus info decoded.
    OpusDecoded,
    /// Counter-signature looked up.
    CounterSignatureSearched,
    /// Signing time chosen.
    TimestampResolved,
    /// Counter-signer certificate looked up.
    CertificatesResolved,
    /// Report complete.
    Assembled,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::ContainerQueried => "container-queried",
            Self::SignerResolved => "signer-resolved",
            Self::OpusDecoded => "opus-decoded",
            Self::CounterSignatureSearched => "counter-signature-searched",
            Self::TimestampResolved => "timestamp-resolved",
            Self::CertificatesResolved => "certificates-resolved",
            Self::Assembled => "assembled",
        };
        f.write_str(s)
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "report stage");
}

/// Builds a [`TrustReport`] from a PE image.
///
/// No stage after the container query can fail the report: a stage
/// that finds nothing, or fails to decode, leaves its field empty.
pub struct ReportAssembler<'a> {
    verifier: &'a dyn TrustVerifier,
    query: &'a dyn ContainerQuery,
}

impl<'a> ReportAssembler<'a> {
    /// Create an assembler using the given collaborators.
    pub fn new(
        verifier: &'a dyn TrustVerifier,
        query: &'a dyn ContainerQuery,
    ) -> Self {
        Self { verifier, query }
    }

    /// Inspect the image `pe`, read from `path`.
    pub fn assemble(&self, path: &Path, pe: &dyn PeTrait) -> TrustReport {
        enter(Stage::Start);
        let trust_verdict = self.verifier.verify(path, pe);
        let architecture = pe.architecture();

        let container = match self.query.query(pe) {
            Ok(container) => container,
            Err(err) => {
                if err.is_no_signature() {
                    tracing::debug!(path = %path.display(), "no embedded signature");
                } else {
                    tracing::warn!(path = %path.display(), %err, "container query failed");
                }
                enter(Stage::Assembled);
                return TrustReport {
                    trust_verdict,
                    timestamp: TimestampInfo::unavailable(),
                    opus_info: OpusInfo::default(),
                    signer_certificate: None,
                    counter_certificate: None,
                    architecture,
                };
            }
        };
        enter(Stage::ContainerQueried);

        // The store is dropped at the end of this call; the report keeps
        // its own copies of the records.
        let SignedContainer { signer, store } = container;

        let signer_certificate =
            store.find_by_subject(&signer.identity()).cloned();
        enter(Stage::SignerResolved);

        let opus_info = signer
            .authenticated_attributes
            .find_known(KnownAttribute::OpusInfo)
            .map(|attr| {
                OpusInfo::decode(attr).unwrap_or_else(|err| {
                    tracing::error!(%err, "failed to decode opus info");
                    OpusInfo::default()
                })
            })
            .unwrap_or_default();
        enter(Stage::OpusDecoded);

        let counter_signer =
            resolve_counter_signer(&signer.unauthenticated_attributes);
        enter(Stage::CounterSignatureSearched);

        let timestamp = match counter_signer.as_ref().and_then(counter_signing_time)
        {
            Some(value) => TimestampInfo {
                value,
                source: TimestampSource::SecureCounterSignature,
            },
            None => match try_derive(pe.time_date_stamp()) {
                Ok(value) => TimestampInfo {
                    value,
                    source: TimestampSource::HeaderFallback,
                },
                Err(err) => {
                    tracing::warn!(%err, "no usable timestamp");
                    TimestampInfo::unavailable()
                }
            },
        };
        enter(Stage::TimestampResolved);

        let counter_certificate = counter_signer
            .as_ref()
            .and_then(|cs| store.find_by_subject(&cs.identity()))
            .cloned();
        enter(Stage::CertificatesResolved);

        enter(Stage::Assembled);
        TrustReport {
            trust_verdict,
            timestamp,
            opus_info,
            signer_certificate,
            counter_certificate,
            architecture,
        }
    }
}

/// Error returned by [`inspect`].
#[derive(Debug)]
pub enum InspectError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not a PE executable or DLL.
    NotPe(object::read::Error),
}

impl Display for InspectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read file: {err}"),
            Self::NotPe(err) => {
                write!(f, "not an executable or DLL: {err}")
            }
        }
    }
}

impl std::error::Error for InspectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::NotPe(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for InspectError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Inspect the file at `path` with the default [`TrustPolicy`].
pub fn inspect(path: impl AsRef<Path>) -> Result<TrustReport, InspectError> {
    inspect_with(path, &TrustPolicy::default())
}

/// Inspect the file at `path`, verifying trust with `policy`.
pub fn inspect_with(
    path: impl AsRef<Path>,
    policy: &TrustPolicy,
) -> Result<TrustReport, InspectError> {
    let path = path.as_ref();
    let bytes = fs_err::read(path)?;
    let pe = parse_pe(&bytes).map_err(InspectError::NotPe)?;

    let verifier = OfflineTrustVerifier::new(policy.clone());
    let query = EmbeddedContainerQuery;
    Ok(ReportAssembler::new(&verifier, &query).assemble(path, pe.as_ref()))
}
