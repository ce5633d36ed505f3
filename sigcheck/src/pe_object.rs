// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::pe::{PeOffsetError, PeOffsets, PeTrait};
use crate::usize_from_u32;
use core::mem;
use core::ops::Range;
use object::pe::{
    ImageDataDirectory, IMAGE_DIRECTORY_ENTRY_SECURITY,
    IMAGE_NT_OPTIONAL_HDR32_MAGIC, IMAGE_NT_OPTIONAL_HDR64_MAGIC,
};
use object::read::pe::{ImageNtHeaders, ImageOptionalHeader, PeFile};
use object::{pod, LittleEndian, SectionIndex};

/// Offset of `CheckSum` from the start of the optional header. It is
/// the same in the 32-bit and 64-bit layouts.
const CHECK_SUM_OFFSET: usize = 64;

/// Parse `bytes` as a PE image, trying PE32+ first and then PE32.
pub fn parse_pe(
    bytes: &[u8],
) -> Result<Box<dyn PeTrait + '_>, object::read::Error> {
    if let Ok(pe) = object::read::pe::PeFile64::parse(bytes) {
        Ok(Box::new(pe))
    } else {
        let pe = object::read::pe::PeFile32::parse(bytes)?;
        Ok(Box::new(pe))
    }
}

impl<'data, I> PeTrait for PeFile<'data, I>
where
    I: ImageNtHeaders,
{
    fn data(&self) -> &'data [u8] {
        self.data()
    }

    fn num_sections(&self) -> usize {
        self.section_table().len()
    }

    fn section_data_range(
        &self,
        index: usize,
    ) -> Result<Range<usize>, PeOffsetError> {
        let section = self
            .section_table()
            .section(SectionIndex(index))
            .map_err(|_| PeOffsetError)?;
        let start =
            usize_from_u32(section.pointer_to_raw_data.get(LittleEndian));
        let size = usize_from_u32(section.size_of_raw_data.get(LittleEndian));
        let end = start.checked_add(size).ok_or(PeOffsetError)?;
        Ok(start..end)
    }

    fn certificate_table_range(
        &self,
    ) -> Result<Option<Range<usize>>, PeOffsetError> {
        let Some(dir) = self.data_directory(IMAGE_DIRECTORY_ENTRY_SECURITY)
        else {
            return Ok(None);
        };
        // For the security directory the "virtual address" is a file
        // offset.
        let start = usize_from_u32(dir.virtual_address.get(LittleEndian));
        let size = usize_from_u32(dir.size.get(LittleEndian));
        if size == 0 {
            return Ok(None);
        }
        let end = start.checked_add(size).ok_or(PeOffsetError)?;
        Ok(Some(start..end))
    }

    fn offsets(&self) -> Result<PeOffsets, PeOffsetError> {
        header_offsets(self).ok_or(PeOffsetError)
    }

    fn time_date_stamp(&self) -> u32 {
        self.nt_headers()
            .file_header()
            .time_date_stamp
            .get(LittleEndian)
    }

    fn is_64_bit(&self) -> Option<bool> {
        match self.nt_headers().optional_header().magic() {
            IMAGE_NT_OPTIONAL_HDR64_MAGIC => Some(true),
            IMAGE_NT_OPTIONAL_HDR32_MAGIC => Some(false),
            _ => None,
        }
    }
}

fn header_offsets<I>(pe: &PeFile<I>) -> Option<PeOffsets>
where
    I: ImageNtHeaders,
{
    // Position of a borrowed header relative to the start of the image.
    let offset_in_image = |bytes: &[u8]| -> Option<usize> {
        (bytes.as_ptr() as usize).checked_sub(pe.data().as_ptr() as usize)
    };

    let optional_header = pe.nt_headers().optional_header();
    let optional_header_bytes = pod::bytes_of(optional_header);
    let optional_header_start = offset_in_image(optional_header_bytes)?;
    let check_sum = optional_header_start.checked_add(CHECK_SUM_OFFSET)?;

    // Data directories directly follow the fixed optional header.
    let data_dirs_start =
        optional_header_start.checked_add(optional_header_bytes.len())?;
    let dir_size = mem::size_of::<ImageDataDirectory>();
    let security_data_dir = data_dirs_start
        .checked_add(dir_size.checked_mul(IMAGE_DIRECTORY_ENTRY_SECURITY)?)?;

    Some(PeOffsets {
        check_sum,
        after_check_sum: check_sum.checked_add(mem::size_of::<u32>())?,
        security_data_dir,
        after_security_data_dir: security_data_dir.checked_add(dir_size)?,
        after_header: usize_from_u32(optional_header.size_of_headers()),
    })
}
