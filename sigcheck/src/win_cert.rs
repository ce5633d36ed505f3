// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::usize_from_u32;
use crate::PeTrait;
use crate::{AuthenticodeSignature, AuthenticodeSignatureParseError};
use core::fmt::{self, Display, Formatter};

/// Current version of `Win_Certificate` structure.
pub const WIN_CERT_REVISION_2_0: u16 = 0x0200;

/// Certificate contains a PKCS#7 `SignedData` structure.
pub const WIN_CERT_TYPE_PKCS_SIGNED_DATA: u16 = 0x0002;

/// Size of the `dwLength`, `wRevision` and `wCertificateType` fields.
const WIN_CERT_HEADER_SIZE: usize = 8;

fn align_up(size: usize, align: usize) -> Option<usize> {
    Some((size.checked_add(align)?.checked_sub(1)?) & !(align.checked_sub(1)?))
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let end = at.checked_add(2)?;
    Some(u16::from_le_bytes(bytes.get(at..end)?.try_into().ok()?))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let end = at.checked_add(4)?;
    Some(u32::from_le_bytes(bytes.get(at..end)?.try_into().ok()?))
}

/// Split the first entry off `remaining`.
///
/// Returns `Ok(None)` when fewer bytes than a header remain.
fn split_entry(
    remaining: &[u8],
) -> Result<Option<(AttributeCertificate<'_>, &[u8])>, AttributeCertificateError>
{
    if remaining.len() < WIN_CERT_HEADER_SIZE {
        return Ok(None);
    }
    let (Some(size), Some(revision), Some(certificate_type)) = (
        read_u32(remaining, 0),
        read_u16(remaining, 4),
        read_u16(remaining, 6),
    ) else {
        return Ok(None);
    };

    let entry_size = usize_from_u32(size);
    if entry_size < WIN_CERT_HEADER_SIZE {
        return Err(AttributeCertificateError::InvalidCertificateSize { size });
    }
    let data = remaining
        .get(WIN_CERT_HEADER_SIZE..entry_size)
        .ok_or(AttributeCertificateError::InvalidCertificateSize { size })?;

    // Entries are 8-byte aligned. Padding after the last entry may be
    // missing.
    let next = align_up(entry_size, 8)
        .ok_or(AttributeCertificateError::InvalidCertificateSize { size })?;
    let rest = remaining.get(next..).unwrap_or(&[]);

    Ok(Some((
        AttributeCertificate {
            revision,
            certificate_type,
            data,
        },
        rest,
    )))
}

fn validate_table(mut remaining: &[u8]) -> Result<(), AttributeCertificateError> {
    while let Some((_, rest)) = split_entry(remaining)? {
        remaining = rest;
    }
    if remaining.is_empty() {
        Ok(())
    } else {
        Err(AttributeCertificateError::InvalidSize)
    }
}

/// Error returned by [`AttributeCertificateIterator::new`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttributeCertificateError {
    /// The certificate table's range is out of bounds.
    OutOfBounds,

    /// The certificate table's size does not match the sum of the
    /// certificate entry's aligned sizes.
    InvalidSize,

    /// An entry's `dwLength` is smaller than its header or runs past the
    /// end of the table.
    InvalidCertificateSize {
        /// Declared size of the entry.
        size: u32,
    },
}

impl Display for AttributeCertificateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => {
                write!(f, "certificate table range is out of bounds")
            }
            Self::InvalidSize => {
                write!(f, "certificate table size does not match the sum of the certificate entry's aligned sizes")
            }
            Self::InvalidCertificateSize { size } => {
                write!(f, "invalid certificate entry size: {size}")
            }
        }
    }
}

impl std::error::Error for AttributeCertificateError {}

/// Error returned by [`AttributeCertificate::get_authenticode_signature`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttributeCertificateAuthenticodeError {
    /// Attribute certificate revision does not match [`WIN_CERT_REVISION_2_0`].
    InvalidCertificateRevision(u16),

    /// Attribute certificate type does not match [`WIN_CERT_TYPE_PKCS_SIGNED_DATA`].
    InvalidCertificateType(u16),

    /// Attribute certificate data is not a valid [`AuthenticodeSignature`].
    InvalidSignature(AuthenticodeSignatureParseError),
}

impl AttributeCertificateAuthenticodeError {
    /// Whether the entry is of a kind no Authenticode provider handles,
    /// as opposed to a signed-data entry that failed to parse.
    pub fn is_unknown_provider(&self) -> bool {
        matches!(
            self,
            Self::InvalidCertificateRevision(_) | Self::InvalidCertificateType(_)
        )
    }
}

impl Display for AttributeCertificateAuthenticodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCertificateRevision(rev) => {
                write!(f, "invalid attribute certificate revision: {rev:02x}")
            }
            Self::InvalidCertificateType(ctype) => {
                write!(f, "invalid attribute certificate type: {ctype:02x}")
            }
            Self::InvalidSignature(err) => {
                write!(f, "invalid signature: {err}")
            }
        }
    }
}

impl std::error::Error for AttributeCertificateAuthenticodeError {}

/// Raw data for a PE attribute certificate.
///
/// Note that PE attribute certificates are not related to X.509
/// attribute certificates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AttributeCertificate<'a> {
    /// `WIN_CERTIFICATE` version number.
    pub revision: u16,

    /// Certificate type.
    pub certificate_type: u16,

    /// Raw certificate data (not including the header).
    pub data: &'a [u8],
}

impl<'a> AttributeCertificate<'a> {
    /// Get the certificate data as an authenticode signature.
    pub fn get_authenticode_signature(
        &self,
    ) -> Result<AuthenticodeSignature, AttributeCertificateAuthenticodeError>
    {
        if self.revision != WIN_CERT_REVISION_2_0 {
            return Err(AttributeCertificateAuthenticodeError::InvalidCertificateRevision(self.revision));
        }
        if self.certificate_type != WIN_CERT_TYPE_PKCS_SIGNED_DATA {
            return Err(
                AttributeCertificateAuthenticodeError::InvalidCertificateType(
                    self.certificate_type,
                ),
            );
        }

        AuthenticodeSignature::from_bytes(self.data)
            .map_err(AttributeCertificateAuthenticodeError::InvalidSignature)
    }
}

/// Iterator over PE attribute certificates.
pub struct AttributeCertificateIterator<'a> {
    remaining_data: &'a [u8],
}

impl<'a> AttributeCertificateIterator<'a> {
    /// Create a new `AttributeCertificateIterator`.
    ///
    /// If there is no attribute certificate table, this returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeCertificateError::OutOfBounds`] if the table
    /// is not within the PE image bounds.
    ///
    /// Returns [`AttributeCertificateError::InvalidCertificateSize`] if
    /// an entry's declared size is impossible.
    ///
    /// Returns [`AttributeCertificateError::InvalidSize`] if the table
    /// size does not match the sum of the certificate entry's aligned
    /// sizes.
    pub fn new(
        pe: &'a dyn PeTrait,
    ) -> Result<Option<Self>, AttributeCertificateError> {
        let range = match pe.certificate_table_range() {
            Ok(Some(range)) => range,
            Ok(None) => return Ok(None),
            Err(_) => return Err(AttributeCertificateError::OutOfBounds),
        };
        let remaining_data = pe
            .data()
            .get(range)
            .ok_or(AttributeCertificateError::OutOfBounds)?;

        validate_table(remaining_data)?;
        Ok(Some(Self { remaining_data }))
    }
}

impl<'a> Iterator for AttributeCertificateIterator<'a> {
    type Item = AttributeCertificate<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // The table was validated by the constructor.
        let (cert, rest) = split_entry(self.remaining_data).ok().flatten()?;
        self.remaining_data = rest;
        Some(cert)
    }
}
