//! Centralized constants for commonly repeated DER/OID bytes, tags and PDF markers.
//! Keep this intentionally small; only broadly reused literals should live here.

// === ASN.1 DER Constants ===

/// ASN.1 NULL value (tag + length + null)
pub const ASN1_NULL: &[u8] = &[0x05, 0x00];

/// ASN.1 INTEGER tag
pub const ASN1_INTEGER_TAG: u8 = 0x02;

/// ASN.1 OCTET STRING tag
pub const ASN1_OCTET_STRING_TAG: u8 = 0x04;

/// ASN.1 OBJECT IDENTIFIER tag
pub const ASN1_OID_TAG: u8 = 0x06;

/// ASN.1 SEQUENCE tag
pub const ASN1_SEQUENCE_TAG: u8 = 0x30;

/// ASN.1 SET tag
pub const ASN1_SET_TAG: u8 = 0x31;

/// Context-specific constructed tag [0] (EXPLICIT or IMPLICIT SET)
pub const ASN1_CONTEXT_0_TAG: u8 = 0xA0;

/// Context-specific constructed tag [1]
pub const ASN1_CONTEXT_1_TAG: u8 = 0xA1;

/// INTEGER 1, used for `SignedData` and `SignerInfo` versions
pub const PKCS7_VERSION_1: &[u8] = &[0x02, 0x01, 0x01];

// === PKCS#7/CMS OID Constants (content octets, no tag/length) ===

/// PKCS#7 `SignedData` (1.2.840.113549.1.7.2)
pub const PKCS7_SIGNED_DATA_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];

/// PKCS#7 data (1.2.840.113549.1.7.1)
pub const PKCS7_DATA_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];

/// PKCS#9 contentType (1.2.840.113549.1.9.3)
pub const PKCS9_CONTENT_TYPE_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x03];

/// PKCS#9 messageDigest (1.2.840.113549.1.9.4)
pub const PKCS9_MESSAGE_DIGEST_OID: &[u8] =
    &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x04];

/// PKCS#9 signingTime (1.2.840.113549.1.9.5)
pub const PKCS9_SIGNING_TIME_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x05];

/// SHA-256 (2.16.840.1.101.3.4.2.1)
pub const SHA256_ALGORITHM_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

/// SHA-384 (2.16.840.1.101.3.4.2.2)
pub const SHA384_ALGORITHM_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02];

/// SHA-512 (2.16.840.1.101.3.4.2.3)
pub const SHA512_ALGORITHM_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03];

/// rsaEncryption (1.2.840.113549.1.1.1)
pub const RSA_ENCRYPTION_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];

/// id-ecPublicKey (1.2.840.10045.2.1)
pub const EC_PUBLIC_KEY_OID: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];

/// ecdsa-with-SHA256 (1.2.840.10045.4.3.2)
pub const ECDSA_WITH_SHA256_OID: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];

/// ecdsa-with-SHA384 (1.2.840.10045.4.3.3)
pub const ECDSA_WITH_SHA384_OID: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x03];

/// ecdsa-with-SHA512 (1.2.840.10045.4.3.4)
pub const ECDSA_WITH_SHA512_OID: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x04];

// === PDF signature markers ===

/// Name token written in place of each unknown ByteRange integer.
pub const BYTE_RANGE_SENTINEL: &[u8] = b"/**********";

/// The two spellings of the ByteRange key that may precede its array.
pub const BYTE_RANGE_MARKERS: [&[u8]; 2] = [b"/ByteRange[", b"/ByteRange ["];

/// Dictionary key holding the hex signature placeholder.
pub const CONTENTS_KEY: &[u8] = b"/Contents";

/// `/SubFilter` for detached PKCS#7 signatures.
pub const SUBFILTER_PKCS7_DETACHED: &[u8] = b"adbe.pkcs7.detached";
