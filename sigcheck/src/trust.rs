// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::attributes::KnownAttribute;
use crate::authenticode_digest::authenticode_digest_for;
use crate::{
    AttributeCertificateIterator, CertificateRecord, CertificateStore,
    PeTrait, SignerInfo,
};
use core::fmt::{self, Display, Formatter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Platform judgement of whether an image's signature is trusted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum TrustVerdict {
    /// Signed and trusted.
    Signed,
    /// No signature.
    Unsigned,
    /// The signature is of a kind no provider handles.
    UnknownProvider,
    /// The signer is explicitly distrusted.
    Disallowed,
    /// The signer does not chain to a trusted root.
    NotTrusted,
    /// The file is not of a signable type.
    ///
    /// [`OfflineTrustVerifier`] never returns this: a file that does not
    /// parse as a PE image is rejected with [`InspectError::NotPe`]
    /// before any verifier runs. Verifiers backed by a platform service
    /// may report it.
    ///
    /// [`InspectError::NotPe`]: crate::InspectError::NotPe
    UnknownFileType,
    /// The image does not match its signed digest.
    Corrupted,
    /// Trust verification is disabled by policy.
    TrustDisabled,
    /// A certificate of the chain is revoked.
    Revoked,
    /// The signing certificate is expired.
    Expired,
    /// Any other failure.
    Error,
}

impl Display for TrustVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Signed => "signed",
            Self::Unsigned => "unsigned",
            Self::UnknownProvider => "unknown provider",
            Self::Disallowed => "disallowed",
            Self::NotTrusted => "not trusted",
            Self::UnknownFileType => "unknown file type",
            Self::Corrupted => "modified or corrupted file",
            Self::TrustDisabled => "user trust disabled",
            Self::Revoked => "revoked certificate",
            Self::Expired => "expired certificate",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Which certificates are checked for revocation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevocationMode {
    /// No revocation check.
    None,
    /// Only the signing certificate.
    EndCertificate,
    /// Every certificate of the chain.
    #[default]
    WholeChain,
}

/// Configuration of [`OfflineTrustVerifier`].
///
/// Thumbprints are SHA-256 hashes of a certificate's DER encoding and
/// serial numbers are big-endian; both are hex, case-insensitive, and
/// may contain `:` separators.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustPolicy {
    /// When false every image is reported as [`TrustVerdict::TrustDisabled`].
    pub enabled: bool,
    /// Revocation checking mode.
    pub revocation: RevocationMode,
    /// Thumbprints of trusted certificates. Empty means any chain is
    /// accepted once the image digest matches.
    pub trusted_roots: Vec<String>,
    /// Thumbprints of explicitly distrusted signing certificates.
    pub disallowed: Vec<String>,
    /// Serial numbers of revoked certificates.
    pub revoked_serials: Vec<String>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            revocation: RevocationMode::default(),
            trusted_roots: Vec::new(),
            disallowed: Vec::new(),
            revoked_serials: Vec::new(),
        }
    }
}

fn normalize_hex(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ':' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn listed(list: &[String], value: &str) -> bool {
    list.iter().any(|entry| normalize_hex(entry) == value)
}

impl TrustPolicy {
    fn is_disallowed(&self, cert: &CertificateRecord) -> bool {
        cert.sha256_thumbprint()
            .is_some_and(|t| listed(&self.disallowed, &t))
    }

    fn is_revoked(&self, cert: &CertificateRecord) -> bool {
        let serial = cert.serial_hex();
        let serial = serial.trim_start_matches('0');
        self.revoked_serials
            .iter()
            .any(|entry| normalize_hex(entry).trim_start_matches('0') == serial)
    }

    fn is_trusted_root(&self, cert: &CertificateRecord) -> bool {
        cert.sha256_thumbprint()
            .is_some_and(|t| listed(&self.trusted_roots, &t))
    }
}

/// Platform trust verification of a file's signature.
pub trait TrustVerifier {
    /// Classify the signature of the image at `path`.
    fn verify(&self, path: &Path, pe: &dyn PeTrait) -> TrustVerdict;
}

/// Trust verification that needs no platform service.
///
/// The embedded digest is recomputed and compared, and the signing
/// certificate is checked against the [`TrustPolicy`] lists and its
/// validity period. The signature value itself is not verified.
#[derive(Clone, Debug, Default)]
pub struct OfflineTrustVerifier {
    policy: TrustPolicy,
}

impl OfflineTrustVerifier {
    /// Create a verifier applying `policy`.
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    fn classify(&self, pe: &dyn PeTrait) -> TrustVerdict {
        if !self.policy.enabled {
            return TrustVerdict::TrustDisabled;
        }

        let first = match AttributeCertificateIterator::new(pe) {
            Ok(Some(mut iter)) => iter.next(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(%err, "unreadable certificate table");
                return TrustVerdict::Corrupted;
            }
        };
        let Some(first) = first else {
            return TrustVerdict::Unsigned;
        };
        let signature = match first.get_authenticode_signature() {
            Ok(signature) => signature,
            Err(err) if err.is_unknown_provider() => {
                return TrustVerdict::UnknownProvider;
            }
            Err(err) => {
                tracing::warn!(%err, "unparseable signature");
                return TrustVerdict::Error;
            }
        };

        match authenticode_digest_for(pe, signature.digest_algorithm()) {
            Some(Ok(digest)) if digest == signature.digest() => {}
            Some(Ok(_)) => return TrustVerdict::Corrupted,
            Some(Err(err)) => {
                tracing::warn!(%err, "cannot hash image");
                return TrustVerdict::Error;
            }
            None => {
                tracing::warn!(
                    algorithm = %signature.digest_algorithm(),
                    "unsupported digest algorithm"
                );
                return TrustVerdict::Error;
            }
        }

        let Ok(signer) = SignerInfo::try_from(signature.signer_info()) else {
            return TrustVerdict::Error;
        };
        let store = CertificateStore::from_signature(&signature);
        let Some(signing_cert) = store.find_by_subject(&signer.identity())
        else {
            return TrustVerdict::NotTrusted;
        };

        if self.policy.is_disallowed(signing_cert) {
            return TrustVerdict::Disallowed;
        }

        let revoked = match self.policy.revocation {
            RevocationMode::None => false,
            RevocationMode::EndCertificate => {
                self.policy.is_revoked(signing_cert)
            }
            RevocationMode::WholeChain => {
                store.iter().any(|cert| self.policy.is_revoked(cert))
            }
        };
        if revoked {
            return TrustVerdict::Revoked;
        }

        // A counter-signature proves the certificate was valid when
        // the image was signed.
        let timestamped = signer
            .unauthenticated_attributes
            .find(&KnownAttribute::CounterSignature.oid())
            .is_some();
        if !timestamped && !is_currently_valid(signing_cert) {
            return TrustVerdict::Expired;
        }

        if !self.policy.trusted_roots.is_empty()
            && !store.iter().any(|cert| self.policy.is_trusted_root(cert))
        {
            return TrustVerdict::NotTrusted;
        }

        TrustVerdict::Signed
    }
}

fn is_currently_valid(cert: &CertificateRecord) -> bool {
    let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return false;
    };
    let validity = &cert.certificate().tbs_certificate.validity;
    validity.not_before.to_unix_duration() <= now
        && now <= validity.not_after.to_unix_duration()
}

impl TrustVerifier for OfflineTrustVerifier {
    fn verify(&self, path: &Path, pe: &dyn PeTrait) -> TrustVerdict {
        let verdict = self.classify(pe);
        tracing::debug!(path = %path.display(), %verdict, "trust verdict");
        verdict
    }
}
