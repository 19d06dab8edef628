//! PKCS#7 domain tests: build a detached `SignedData`, parse it back and
//! check that what the verifier sees is what the signer produced.

mod common;

use std::time::{Duration, SystemTime};

use common::test_identity;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::{X509NameBuilder, X509};
use pdf_remote_signer::{
    domain::{constants, pkcs7::AuthenticatedAttributes},
    services::{
        parse_signed_data, pkcs7_parser::encoded_len, signer_certificate,
        verification::signature_matches, Pkcs7BuilderService,
    },
    HashAlgorithm, LocalKeyIdentity, SigningError, SigningIdentity,
};

fn attributes_over(content: &[u8], algorithm: HashAlgorithm) -> AuthenticatedAttributes {
    AuthenticatedAttributes::new(algorithm.digest(content), SystemTime::now())
        .expect("attributes")
}

fn ec_identity() -> LocalKeyIdentity {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).expect("P-256");
    let key = PKey::from_ec_key(EcKey::generate(&group).expect("EC key")).expect("pkey");

    let mut name = X509NameBuilder::new().expect("name builder");
    name.append_entry_by_nid(Nid::COMMONNAME, "EC Signer")
        .expect("common name");
    let name = name.build();

    let mut serial = BigNum::new().expect("bignum");
    serial
        .rand(64, MsbOption::MAYBE_ZERO, false)
        .expect("serial");

    let mut builder = X509::builder().expect("x509 builder");
    builder.set_version(2).expect("version");
    builder
        .set_serial_number(&serial.to_asn1_integer().expect("serial"))
        .expect("serial");
    builder.set_subject_name(&name).expect("subject");
    builder.set_issuer_name(&name).expect("issuer");
    builder.set_pubkey(&key).expect("pubkey");
    builder
        .set_not_before(&Asn1Time::days_from_now(0).expect("time"))
        .expect("not before");
    builder
        .set_not_after(&Asn1Time::days_from_now(30).expect("time"))
        .expect("not after");
    builder.sign(&key, MessageDigest::sha256()).expect("self-sign");

    LocalKeyIdentity::new(builder.build(), key).expect("identity")
}

#[test]
fn test_rsa_signed_data_round_trip() {
    let identity = test_identity("PKCS7 Signer");
    let cert_der = identity.certificate_der().expect("certificate");
    let attributes = attributes_over(b"covered bytes", HashAlgorithm::Sha256);
    let signature = identity
        .sign_digest(&attributes.digest_to_sign())
        .expect("signature");

    let pkcs7 = Pkcs7BuilderService::new(cert_der.clone(), HashAlgorithm::Sha256)
        .build_signed(&attributes, &signature)
        .expect("build");
    assert_eq!(encoded_len(pkcs7.as_der()).expect("length"), pkcs7.len());

    let view = parse_signed_data(pkcs7.as_der()).expect("parse");
    assert_eq!(view.digest_algorithms, vec![HashAlgorithm::Sha256]);
    assert_eq!(view.certificates, vec![cert_der.clone()]);
    assert_eq!(signer_certificate(&view).expect("signer cert"), &cert_der[..]);
    assert_eq!(view.signer.digest_algorithm, HashAlgorithm::Sha256);
    assert_eq!(view.signer.signature_algorithm, constants::RSA_ENCRYPTION_OID);
    assert_eq!(view.signer.signature, signature);

    let signed_attrs = &view.signer.signed_attributes;
    assert_eq!(signed_attrs.set_der(), &attributes.set_der()[..]);
    assert_eq!(
        signed_attrs.message_digest().expect("messageDigest"),
        attributes.message_digest().as_slice()
    );
    assert!(signed_attrs.signing_time().is_some());
}

#[test]
fn test_signing_time_survives_round_trip() {
    let identity = test_identity("Clock");
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let attributes =
        AuthenticatedAttributes::new(HashAlgorithm::Sha256.digest(b"x"), when).expect("attrs");
    let signature = identity
        .sign_digest(&attributes.digest_to_sign())
        .expect("signature");

    let pkcs7 = Pkcs7BuilderService::new(identity.certificate_der().expect("cert"), HashAlgorithm::Sha256)
        .build_signed(&attributes, &signature)
        .expect("build");
    let view = parse_signed_data(pkcs7.as_der()).expect("parse");

    assert_eq!(view.signer.signed_attributes.signing_time(), Some(when));
}

#[test]
fn test_signature_verifies_over_embedded_attribute_bytes() {
    let identity = test_identity("Attr Check");
    let attributes = attributes_over(b"document", HashAlgorithm::Sha384);
    let signature = identity
        .sign_digest(&attributes.digest_to_sign())
        .expect("signature");

    let pkcs7 = Pkcs7BuilderService::new(identity.certificate_der().expect("cert"), HashAlgorithm::Sha384)
        .build_signed(&attributes, &signature)
        .expect("build");
    let view = parse_signed_data(pkcs7.as_der()).expect("parse");
    let key = identity.certificate().public_key().expect("public key");

    assert!(signature_matches(
        &key,
        HashAlgorithm::Sha384,
        view.signer.signed_attributes.set_der(),
        &view.signer.signature
    ));
    assert!(!signature_matches(
        &key,
        HashAlgorithm::Sha384,
        b"some other bytes",
        &view.signer.signature
    ));
}

#[test]
fn test_ec_key_uses_ecdsa_signature_algorithm() {
    let identity = ec_identity();
    let attributes = attributes_over(b"ec content", HashAlgorithm::Sha256);
    let signature = identity
        .sign_digest(&attributes.digest_to_sign())
        .expect("signature");

    let pkcs7 = Pkcs7BuilderService::new(identity.certificate_der().expect("cert"), HashAlgorithm::Sha256)
        .build_signed(&attributes, &signature)
        .expect("build");
    let view = parse_signed_data(pkcs7.as_der()).expect("parse");

    assert_eq!(view.signer.signature_algorithm, constants::ECDSA_WITH_SHA256_OID);
    let key = identity.certificate().public_key().expect("public key");
    assert!(signature_matches(
        &key,
        HashAlgorithm::Sha256,
        view.signer.signed_attributes.set_der(),
        &view.signer.signature
    ));
}

#[test]
fn test_additional_certificates_follow_signer() {
    let signer = test_identity("Leaf");
    let intermediate = test_identity("Intermediate");
    let attributes = attributes_over(b"chain", HashAlgorithm::Sha256);
    let signature = signer
        .sign_digest(&attributes.digest_to_sign())
        .expect("signature");

    let leaf_der = signer.certificate_der().expect("leaf");
    let extra_der = intermediate.certificate_der().expect("intermediate");
    let pkcs7 = Pkcs7BuilderService::new(leaf_der.clone(), HashAlgorithm::Sha256)
        .with_additional_certs(vec![extra_der.clone()])
        .build_signed(&attributes, &signature)
        .expect("build");
    let view = parse_signed_data(pkcs7.as_der()).expect("parse");

    assert_eq!(view.certificates, vec![leaf_der.clone(), extra_der]);
    assert_eq!(signer_certificate(&view).expect("signer cert"), &leaf_der[..]);
}

#[test]
fn test_empty_signature_is_rejected() {
    let identity = test_identity("Empty");
    let attributes = attributes_over(b"x", HashAlgorithm::Sha256);
    let result = Pkcs7BuilderService::new(identity.certificate_der().expect("cert"), HashAlgorithm::Sha256)
        .build_signed(&attributes, &[]);
    assert!(matches!(result, Err(SigningError::InvalidInput(_))));
}

#[test]
fn test_parser_rejects_trailing_bytes_and_wrong_content_type() {
    let identity = test_identity("Strict Parser");
    let attributes = attributes_over(b"x", HashAlgorithm::Sha256);
    let signature = identity
        .sign_digest(&attributes.digest_to_sign())
        .expect("signature");
    let pkcs7 = Pkcs7BuilderService::new(identity.certificate_der().expect("cert"), HashAlgorithm::Sha256)
        .build_signed(&attributes, &signature)
        .expect("build");

    let mut trailing = pkcs7.as_der().to_vec();
    trailing.push(0x00);
    assert!(matches!(
        parse_signed_data(&trailing),
        Err(SigningError::MalformedPkcs7(_))
    ));

    // ContentInfo { data } instead of signedData
    let data_only = [
        0x30, 0x0b, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01,
    ];
    assert!(matches!(
        parse_signed_data(&data_only),
        Err(SigningError::MalformedPkcs7(_))
    ));
}
