// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use cms::content_info::CmsVersion;
use der::asn1::ObjectIdentifier;
use sigcheck::{
    parse_pe, AttributeCertificateAuthenticodeError, AttributeCertificateError,
    AuthenticodeSignatureParseError, DecodeError, InspectError,
    MalformedPayload, PeOffsetError, QueryError, TimestampConversionError,
};

// Only check that formatting works and yields something.

fn check<T: std::fmt::Display>(errors: &[T]) {
    for err in errors {
        assert!(!err.to_string().is_empty());
    }
}

fn der_err() -> der::Error {
    der::Error::new(der::ErrorKind::Failed, der::Length::ZERO)
}

#[test]
fn test_attribute_certificate_errors() {
    check(&[
        AttributeCertificateError::InvalidSize,
        AttributeCertificateError::OutOfBounds,
        AttributeCertificateError::InvalidCertificateSize { size: 123 },
    ]);
    check(&[
        AttributeCertificateAuthenticodeError::InvalidCertificateRevision(0),
        AttributeCertificateAuthenticodeError::InvalidCertificateType(0),
        AttributeCertificateAuthenticodeError::InvalidSignature(
            AuthenticodeSignatureParseError::Empty,
        ),
    ]);
}

#[test]
fn test_authenticode_signature_parse_error() {
    use AuthenticodeSignatureParseError as E;

    let oid = ObjectIdentifier::new_unwrap("1.2.3");
    check(&[
        E::Empty,
        E::InvalidContentInfo(der_err()),
        E::InvalidContentType(oid),
        E::InvalidSignedData(der_err()),
        E::InvalidSignedDataVersion(CmsVersion::V3),
        E::InvalidNumDigestAlgorithms(2),
        E::InvalidEncapsulatedContentType(oid),
        E::EmptyEncapsulatedContent,
        E::InvalidSpcIndirectDataContent(der_err()),
        E::InvalidNumSignerInfo(0),
        E::InvalidSignerInfoVersion(CmsVersion::V3),
        E::AlgorithmMismatch,
        E::EmptyAuthenticatedAttributes,
        E::MissingContentTypeAuthenticatedAttribute,
        E::MissingMessageDigestAuthenticatedAttribute,
    ]);
}

#[test]
fn test_decode_and_query_errors() {
    check(&[
        DecodeError::Malformed(MalformedPayload::Der(der_err())),
        DecodeError::Malformed(MalformedPayload::Invalid("bad")),
        DecodeError::OutOfMemory,
        DecodeError::UnsupportedSignerIdentifier,
    ]);
    check(&[
        QueryError::NoSignature,
        QueryError::InvalidCertificateTable(AttributeCertificateError::InvalidSize),
        QueryError::InvalidSignature(
            AttributeCertificateAuthenticodeError::InvalidCertificateType(1),
        ),
        QueryError::InvalidSignerInfo(DecodeError::OutOfMemory),
    ]);

    assert!(QueryError::NoSignature.is_no_signature());
    assert!(!DecodeError::OutOfMemory.is_malformed());
    assert!(DecodeError::from(der_err()).is_malformed());
    assert!(matches!(
        DecodeError::from(der_err()),
        DecodeError::Malformed(MalformedPayload::Der(_))
    ));
}

#[test]
fn test_misc_errors() {
    check(&[PeOffsetError]);
    check(&[TimestampConversionError]);
    check(&[
        InspectError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)),
        InspectError::NotPe(parse_pe(b"not a pe").err().unwrap()),
    ]);
}
