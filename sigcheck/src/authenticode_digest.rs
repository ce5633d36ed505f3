// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{PeOffsetError, PeTrait};
use const_oid::db::rfc5912::{ID_SHA_1, ID_SHA_256, ID_SHA_384, ID_SHA_512};
use core::ops::Range;
use der::asn1::ObjectIdentifier;
use digest::{Digest, Update};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

/// File ranges covered by the authenticode digest, in hashing order.
///
/// The checksum, the security data directory entry and the certificate
/// table are excluded. Sections are hashed in file order, followed by
/// any trailing data.
fn hashed_ranges(pe: &dyn PeTrait) -> Option<Vec<Range<usize>>> {
    let offsets = pe.offsets().ok()?;
    let mut ranges = vec![
        0..offsets.check_sum,
        offsets.after_check_sum..offsets.security_data_dir,
        offsets.after_security_data_dir..offsets.after_header,
    ];

    let mut sections = (1..=pe.num_sections())
        .map(|i| pe.section_data_range(i))
        .collect::<Result<Vec<_>, PeOffsetError>>()
        .ok()?;
    sections.sort_unstable_by_key(|r| r.start);

    let mut hashed_len = offsets.after_header;
    for section in sections {
        hashed_len = hashed_len.checked_add(section.len())?;
        ranges.push(section);
    }

    let mut trailing_len = pe.data().len().checked_sub(hashed_len)?;
    if let Some(table) = pe.certificate_table_range().ok()? {
        trailing_len = trailing_len.checked_sub(table.len())?;
    }
    ranges.push(hashed_len..hashed_len.checked_add(trailing_len)?);

    Some(ranges)
}

/// Calculate an authenticode digest.
pub fn authenticode_digest(
    pe: &dyn PeTrait,
    digest: &mut dyn Update,
) -> Result<(), PeOffsetError> {
    let ranges = hashed_ranges(pe).ok_or(PeOffsetError)?;
    for range in ranges {
        digest.update(pe.data().get(range).ok_or(PeOffsetError)?);
    }
    Ok(())
}

fn digest_with<D: Digest + Update>(
    pe: &dyn PeTrait,
) -> Result<Vec<u8>, PeOffsetError> {
    let mut hasher = D::new();
    authenticode_digest(pe, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

/// Calculate the authenticode digest with the algorithm named by
/// `algorithm`.
///
/// Returns `None` if the algorithm is not one of SHA-1, SHA-256,
/// SHA-384 or SHA-512.
pub fn authenticode_digest_for(
    pe: &dyn PeTrait,
    algorithm: &ObjectIdentifier,
) -> Option<Result<Vec<u8>, PeOffsetError>> {
    match *algorithm {
        ID_SHA_1 => Some(digest_with::<Sha1>(pe)),
        ID_SHA_256 => Some(digest_with::<Sha256>(pe)),
        ID_SHA_384 => Some(digest_with::<Sha384>(pe)),
        ID_SHA_512 => Some(digest_with::<Sha512>(pe)),
        _ => None,
    }
}
