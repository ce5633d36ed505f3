// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use core::fmt::{self, Display, Formatter};
use core::ops::Range;

/// An offset within the PE is invalid.
///
/// This can occur if an offset is larger than the PE itself, if a
/// section index is out of range, or if arithmetic overflow occurs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PeOffsetError;

impl Display for PeOffsetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "an offset within the PE is invalid")
    }
}

impl std::error::Error for PeOffsetError {}

/// Offsets of the header fields skipped by the authenticode digest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeOffsets {
    /// Offset of the `checksum` field in the optional header.
    pub check_sum: usize,
    /// Offset of the next byte after the `checksum` field.
    pub after_check_sum: usize,

    /// Offset of the security data directory itself (not the data
    /// pointed to by the directory).
    pub security_data_dir: usize,
    /// Offset of the next byte after the security data directory.
    pub after_security_data_dir: usize,

    /// Offset of the next byte after the header.
    pub after_header: usize,
}

/// Machine word size declared by the optional header.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize)]
pub enum Architecture {
    /// PE32 image.
    Bit32,
    /// PE32+ image.
    Bit64,
    /// The optional header magic is not recognised.
    Unknown,
}

impl Architecture {
    /// Map the tri-state `is_64_bit` header query to an architecture.
    pub fn from_is_64_bit(is_64_bit: Option<bool>) -> Self {
        match is_64_bit {
            Some(true) => Self::Bit64,
            Some(false) => Self::Bit32,
            None => Self::Unknown,
        }
    }
}

/// Read access to a PE image.
///
/// Only the pieces needed for signature inspection are exposed: the
/// section and certificate table layout used by the authenticode
/// digest, and the two file header values that end up in a trust
/// report. Bounds checking is always used, so a malformed image can
/// only cause an error to be returned, never a panic.
///
/// [`PeFile`] from the [`object`] crate implements this trait.
///
/// [`PeFile`]: https://docs.rs/object/latest/object/read/pe/struct.PeFile.html
/// [`object`]: https://docs.rs/object/latest/object/
pub trait PeTrait {
    /// Get the raw bytes of the PE file.
    fn data(&self) -> &[u8];

    /// Get the number of sections.
    fn num_sections(&self) -> usize;

    /// Get a section's data range.
    ///
    /// The section `index` starts at 1. The start of the range is
    /// `PointerToRawData`, and the size of the range is `SizeOfRawData`.
    /// An index of zero or above `num_sections()` is an error.
    fn section_data_range(
        &self,
        index: usize,
    ) -> Result<Range<usize>, PeOffsetError>;

    /// Get the certificate table's data range, if present.
    fn certificate_table_range(
        &self,
    ) -> Result<Option<Range<usize>>, PeOffsetError>;

    /// Get various offsets within the PE file needed for authenticode hashing.
    fn offsets(&self) -> Result<PeOffsets, PeOffsetError>;

    /// The `TimeDateStamp` field of the COFF file header.
    ///
    /// This is the build time declared by the linker, in seconds since
    /// the Unix epoch.
    fn time_date_stamp(&self) -> u32;

    /// Whether the image is PE32+ (`Some(true)`), PE32 (`Some(false)`)
    /// or neither (`None`).
    fn is_64_bit(&self) -> Option<bool>;

    /// Architecture derived from [`PeTrait::is_64_bit`].
    fn architecture(&self) -> Architecture {
        Architecture::from_is_64_bit(self.is_64_bit())
    }
}
