// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hand-assembled DER payloads and PE images shared by the tests.

#![allow(dead_code)]

use const_oid::db::rfc5912::ID_SHA_256;
use der::asn1::{GeneralizedTime, ObjectIdentifier, UtcTime};
use der::Encode;
use sigcheck::{
    authenticode_digest_for, parse_pe, ContainerQuery, PeOffsetError,
    PeOffsets, PeTrait, QueryError, SignedContainer, TrustVerdict,
    TrustVerifier, WIN_CERT_REVISION_2_0, WIN_CERT_TYPE_PKCS_SIGNED_DATA,
};
use std::ops::Range;
use std::path::Path;
use std::time::Duration;

pub const OID_DATA: &str = "1.2.840.113549.1.7.1";
pub const OID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
pub const OID_CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
pub const OID_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
pub const OID_SIGNING_TIME: &str = "1.2.840.113549.1.9.5";
pub const OID_COUNTER_SIGNATURE: &str = "1.2.840.113549.1.9.6";
pub const OID_OPUS_INFO: &str = "1.3.6.1.4.1.311.2.1.12";
pub const OID_SPC_INDIRECT_DATA: &str = "1.3.6.1.4.1.311.2.1.4";
pub const OID_SPC_PE_IMAGE_DATA: &str = "1.3.6.1.4.1.311.2.1.15";
pub const OID_SHA256: &str = "2.16.840.1.101.3.4.2.1";
pub const OID_MD5: &str = "1.2.840.113549.2.5";
pub const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const OID_SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
pub const OID_COMMON_NAME: &str = "2.5.4.3";
pub const OID_ORGANIZATIONAL_UNIT: &str = "2.5.4.11";
pub const OID_ORGANIZATION: &str = "2.5.4.10";
pub const OID_COUNTRY: &str = "2.5.4.6";

pub const ROOT_CN: &str = "Example Root CA";
pub const SIGNER_CN: &str = "Example Publisher";
pub const TSA_CN: &str = "Example Timestamping";
pub const ROOT_SERIAL: &[u8] = &[0x01];
pub const SIGNER_SERIAL: &[u8] = &[0x10, 0x01];
pub const TSA_SERIAL: &[u8] = &[0x20, 0x02];

/// 2020-01-01 to 2049-12-31.
pub const VALID: (u64, u64) = (1_577_836_800, 2_524_607_999);
/// 2000-01-01 to 2001-01-01.
pub const EXPIRED: (u64, u64) = (946_684_800, 978_307_200);

pub const SIGNING_TIME: u64 = 1_600_000_000;
pub const BUILD_TIME: u32 = 1_500_000_000;

pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = content.len();
    let mut out = vec![tag];
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend([0x81, len as u8]);
    } else {
        assert!(len <= 0xffff);
        out.extend([0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

pub fn seq(parts: &[&[u8]]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

/// `SET OF` (or an implicitly tagged one) with elements in DER order.
pub fn set_of(tag: u8, items: &[Vec<u8>]) -> Vec<u8> {
    let mut sorted = items.to_vec();
    sorted.sort();
    tlv(tag, &sorted.concat())
}

pub fn explicit(number: u8, inner: &[u8]) -> Vec<u8> {
    tlv(0xa0 | number, inner)
}

pub fn oid(dotted: &str) -> Vec<u8> {
    ObjectIdentifier::new_unwrap(dotted).to_der().unwrap()
}

pub fn integer(bytes: &[u8]) -> Vec<u8> {
    tlv(0x02, bytes)
}

pub fn null() -> Vec<u8> {
    vec![0x05, 0x00]
}

pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
    tlv(0x04, bytes)
}

pub fn utf8_string(s: &str) -> Vec<u8> {
    tlv(0x0c, s.as_bytes())
}

pub fn printable_string(s: &str) -> Vec<u8> {
    tlv(0x13, s.as_bytes())
}

pub fn utf16be(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

pub fn utc_time(unix_secs: u64) -> Vec<u8> {
    UtcTime::from_unix_duration(Duration::from_secs(unix_secs))
        .unwrap()
        .to_der()
        .unwrap()
}

pub fn generalized_time(unix_secs: u64) -> Vec<u8> {
    GeneralizedTime::from_unix_duration(Duration::from_secs(unix_secs))
        .unwrap()
        .to_der()
        .unwrap()
}

pub fn algorithm(dotted: &str) -> Vec<u8> {
    seq(&[&oid(dotted), &null()])
}

/// Distinguished name with one attribute per RDN.
pub fn name(attrs: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let rdns: Vec<Vec<u8>> = attrs
        .iter()
        .map(|(kind, value)| set_of(0x31, &[seq(&[&oid(kind), value])]))
        .collect();
    tlv(0x30, &rdns.concat())
}

pub fn cn_name(cn: &str) -> Vec<u8> {
    name(&[(OID_COMMON_NAME, utf8_string(cn))])
}

pub fn attribute(dotted: &str, values: &[Vec<u8>]) -> Vec<u8> {
    seq(&[&oid(dotted), &set_of(0x31, values)])
}

/// An X.509 v3 certificate with a dummy key and signature.
pub fn certificate(
    issuer: &str,
    subject: &str,
    serial: &[u8],
    validity: (u64, u64),
) -> Vec<u8> {
    let tbs = seq(&[
        &explicit(0, &integer(&[2])),
        &integer(serial),
        &algorithm(OID_SHA256_WITH_RSA),
        &cn_name(issuer),
        &seq(&[&utc_time(validity.0), &utc_time(validity.1)]),
        &cn_name(subject),
        &seq(&[
            &algorithm(OID_RSA_ENCRYPTION),
            &tlv(0x03, &[0x00, 0x30, 0x00]),
        ]),
    ]);
    seq(&[
        &tbs,
        &algorithm(OID_SHA256_WITH_RSA),
        &tlv(0x03, &[0x00, 0xde, 0xad, 0xbe, 0xef]),
    ])
}

pub fn root_certificate() -> Vec<u8> {
    certificate(ROOT_CN, ROOT_CN, ROOT_SERIAL, VALID)
}

pub fn signer_certificate(validity: (u64, u64)) -> Vec<u8> {
    certificate(ROOT_CN, SIGNER_CN, SIGNER_SERIAL, validity)
}

pub fn tsa_certificate() -> Vec<u8> {
    certificate(ROOT_CN, TSA_CN, TSA_SERIAL, VALID)
}

/// A CMS `SignerInfo` identified by issuer and serial number.
pub fn signer_info(
    issuer: &str,
    serial: &[u8],
    signed_attrs: &[Vec<u8>],
    unsigned_attrs: &[Vec<u8>],
) -> Vec<u8> {
    let mut parts = vec![
        integer(&[1]),
        seq(&[&cn_name(issuer), &integer(serial)]),
        algorithm(OID_SHA256),
    ];
    if !signed_attrs.is_empty() {
        parts.push(set_of(0xa0, signed_attrs));
    }
    parts.push(algorithm(OID_RSA_ENCRYPTION));
    parts.push(octet_string(&[0x5a; 16]));
    if !unsigned_attrs.is_empty() {
        parts.push(set_of(0xa1, unsigned_attrs));
    }
    tlv(0x30, &parts.concat())
}

/// Counter-signer info of the timestamp authority.
pub fn counter_signer_info(signing_time: u64) -> Vec<u8> {
    signer_info(
        ROOT_CN,
        TSA_SERIAL,
        &[
            attribute(OID_CONTENT_TYPE, &[oid(OID_DATA)]),
            attribute(OID_SIGNING_TIME, &[utc_time(signing_time)]),
            attribute(OID_MESSAGE_DIGEST, &[octet_string(&[0x22; 32])]),
        ],
        &[],
    )
}

/// `SpcSpOpusInfo` with a BMP program name and a URL publisher link.
pub fn opus_info(program_name: Option<&str>, publisher_url: Option<&str>) -> Vec<u8> {
    let mut fields = Vec::new();
    if let Some(program_name) = program_name {
        fields.push(explicit(0, &tlv(0x80, &utf16be(program_name))));
    }
    if let Some(url) = publisher_url {
        fields.push(explicit(2, &tlv(0x80, url.as_bytes())));
    }
    tlv(0x30, &fields.concat())
}

/// Authenticode `ContentInfo` over a SHA-256 image digest.
pub fn content_info(
    digest_algorithm: &str,
    digest: &[u8],
    certificates: &[Vec<u8>],
    signer_info: Vec<u8>,
) -> Vec<u8> {
    let indirect_data = seq(&[
        &seq(&[&oid(OID_SPC_PE_IMAGE_DATA), &seq(&[&tlv(0x03, &[0x00])])]),
        &seq(&[&algorithm(digest_algorithm), &octet_string(digest)]),
    ]);
    let encap = seq(&[&oid(OID_SPC_INDIRECT_DATA), &explicit(0, &indirect_data)]);

    let mut parts = vec![
        integer(&[1]),
        set_of(0x31, &[algorithm(OID_SHA256)]),
        encap,
    ];
    if !certificates.is_empty() {
        parts.push(set_of(0xa0, certificates));
    }
    parts.push(set_of(0x31, &[signer_info]));
    let signed_data = tlv(0x30, &parts.concat());

    seq(&[&oid(OID_SIGNED_DATA), &explicit(0, &signed_data)])
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bits {
    Pe32,
    Pe64,
}

/// Size of the headers, which is also the size of an unsigned image.
pub const HEADERS_SIZE: usize = 0x200;

const PE_HEADER: usize = 0x40;
const FILE_HEADER: usize = PE_HEADER + 4;
const OPTIONAL_HEADER: usize = FILE_HEADER + 20;

fn put_u16(image: &mut [u8], offset: usize, value: u16) {
    image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(image: &mut [u8], offset: usize, value: u32) {
    image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Offset of the security data directory entry.
pub fn security_dir_offset(bits: Bits) -> usize {
    let fixed = match bits {
        Bits::Pe32 => 96,
        Bits::Pe64 => 112,
    };
    OPTIONAL_HEADER + fixed + 4 * 8
}

/// A section-less image: just the headers.
pub fn minimal_pe(bits: Bits, timestamp: u32) -> Vec<u8> {
    let (machine, optional_size, magic, num_rva_offset) = match bits {
        Bits::Pe32 => (0x014c, 224, 0x010b, 92),
        Bits::Pe64 => (0x8664, 240, 0x020b, 108),
    };

    let mut image = vec![0; HEADERS_SIZE];
    image[..2].copy_from_slice(b"MZ");
    put_u32(&mut image, 0x3c, PE_HEADER as u32);
    image[PE_HEADER..PE_HEADER + 4].copy_from_slice(b"PE\0\0");

    put_u16(&mut image, FILE_HEADER, machine);
    put_u32(&mut image, FILE_HEADER + 4, timestamp);
    put_u16(&mut image, FILE_HEADER + 16, optional_size);
    put_u16(&mut image, FILE_HEADER + 18, 0x0022);

    put_u16(&mut image, OPTIONAL_HEADER, magic);
    put_u32(&mut image, OPTIONAL_HEADER + 32, 0x1000);
    put_u32(&mut image, OPTIONAL_HEADER + 36, 0x200);
    put_u32(&mut image, OPTIONAL_HEADER + 56, 0x1000);
    put_u32(&mut image, OPTIONAL_HEADER + 60, HEADERS_SIZE as u32);
    put_u32(&mut image, OPTIONAL_HEADER + num_rva_offset, 16);
    image
}

/// A `WIN_CERTIFICATE` entry, padded to 8 bytes.
pub fn win_certificate(revision: u16, certificate_type: u16, data: &[u8]) -> Vec<u8> {
    let mut entry = Vec::new();
    entry.extend(((8 + data.len()) as u32).to_le_bytes());
    entry.extend(revision.to_le_bytes());
    entry.extend(certificate_type.to_le_bytes());
    entry.extend_from_slice(data);
    while entry.len() % 8 != 0 {
        entry.push(0);
    }
    entry
}

/// Append `table` and point the security directory at it.
pub fn attach_certificate_table(
    mut image: Vec<u8>,
    bits: Bits,
    table: &[u8],
) -> Vec<u8> {
    let offset = image.len() as u32;
    image.extend_from_slice(table);
    let dir = security_dir_offset(bits);
    put_u32(&mut image, dir, offset);
    put_u32(&mut image, dir + 4, table.len() as u32);
    image
}

pub fn authenticode_sha256(image: &[u8]) -> Vec<u8> {
    let pe = parse_pe(image).unwrap();
    authenticode_digest_for(pe.as_ref(), &ID_SHA_256)
        .unwrap()
        .unwrap()
}

/// Builds a signed image. The default is a PE32+ image signed by
/// [`SIGNER_CN`] with Opus info and a counter-signature.
#[derive(Clone, Debug)]
pub struct ImageBuilder {
    pub bits: Bits,
    pub timestamp: u32,
    pub opus: Option<Vec<u8>>,
    pub counter_signature: Option<Vec<u8>>,
    pub signer_serial: &'static [u8],
    pub signer_validity: (u64, u64),
    pub include_signer_certificate: bool,
    pub digest_algorithm: &'static str,
    pub tamper: bool,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self {
            bits: Bits::Pe64,
            timestamp: BUILD_TIME,
            opus: Some(opus_info(Some("Example App"), Some("https://example.com"))),
            counter_signature: Some(counter_signer_info(SIGNING_TIME)),
            signer_serial: SIGNER_SERIAL,
            signer_validity: VALID,
            include_signer_certificate: true,
            digest_algorithm: OID_SHA256,
            tamper: false,
        }
    }
}

impl ImageBuilder {
    pub fn unsigned(&self) -> Vec<u8> {
        minimal_pe(self.bits, self.timestamp)
    }

    pub fn primary_signer_info(&self) -> Vec<u8> {
        let mut signed_attrs = vec![
            attribute(OID_CONTENT_TYPE, &[oid(OID_SPC_INDIRECT_DATA)]),
            attribute(OID_MESSAGE_DIGEST, &[octet_string(&[0x11; 32])]),
        ];
        if let Some(opus) = &self.opus {
            signed_attrs.push(attribute(OID_OPUS_INFO, &[opus.clone()]));
        }
        let unsigned_attrs: Vec<Vec<u8>> = self
            .counter_signature
            .iter()
            .map(|cs| attribute(OID_COUNTER_SIGNATURE, &[cs.clone()]))
            .collect();
        signer_info(ROOT_CN, self.signer_serial, &signed_attrs, &unsigned_attrs)
    }

    pub fn certificates(&self) -> Vec<Vec<u8>> {
        let mut certs = vec![root_certificate(), tsa_certificate()];
        if self.include_signer_certificate {
            certs.push(certificate(
                ROOT_CN,
                SIGNER_CN,
                self.signer_serial,
                self.signer_validity,
            ));
        }
        certs
    }

    pub fn build(&self) -> Vec<u8> {
        let image = self.unsigned();
        let digest = authenticode_sha256(&image);
        let signature = content_info(
            self.digest_algorithm,
            &digest,
            &self.certificates(),
            self.primary_signer_info(),
        );
        let table = win_certificate(
            WIN_CERT_REVISION_2_0,
            WIN_CERT_TYPE_PKCS_SIGNED_DATA,
            &signature,
        );
        let mut signed = attach_certificate_table(image, self.bits, &table);
        if self.tamper {
            // Header padding is covered by the digest.
            signed[HEADERS_SIZE - 0x10] ^= 0xff;
        }
        signed
    }
}

/// A PE model with no layout, for collaborator tests.
pub struct FakePe {
    pub data: Vec<u8>,
    pub time_date_stamp: u32,
    pub is_64_bit: Option<bool>,
}

impl PeTrait for FakePe {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn num_sections(&self) -> usize {
        0
    }

    fn section_data_range(&self, _index: usize) -> Result<Range<usize>, PeOffsetError> {
        Err(PeOffsetError)
    }

    fn certificate_table_range(&self) -> Result<Option<Range<usize>>, PeOffsetError> {
        Ok(None)
    }

    fn offsets(&self) -> Result<PeOffsets, PeOffsetError> {
        Err(PeOffsetError)
    }

    fn time_date_stamp(&self) -> u32 {
        self.time_date_stamp
    }

    fn is_64_bit(&self) -> Option<bool> {
        self.is_64_bit
    }
}

pub struct FixedVerifier(pub TrustVerdict);

impl TrustVerifier for FixedVerifier {
    fn verify(&self, _path: &Path, _pe: &dyn PeTrait) -> TrustVerdict {
        self.0
    }
}

pub struct FailingQuery(pub QueryError);

impl ContainerQuery for FailingQuery {
    fn query(&self, _pe: &dyn PeTrait) -> Result<SignedContainer, QueryError> {
        Err(self.0)
    }
}

pub struct FixedQuery(pub SignedContainer);

impl ContainerQuery for FixedQuery {
    fn query(&self, _pe: &dyn PeTrait) -> Result<SignedContainer, QueryError> {
        Ok(self.0.clone())
    }
}
