//! Authenticated (signed) attributes.
//!
//! The signer signs the DER `SET OF Attribute` built here; the same bytes are
//! re-tagged `[0] IMPLICIT` when embedded in the `SignerInfo`.

use std::fmt;
use std::time::SystemTime;

use der::asn1::UtcTime;
use der::Encode;

use super::encoding::{oid, tlv, tlv_concat};
use crate::domain::constants;
use crate::domain::crypto::DigestBytes;
use crate::SigningResult;

#[derive(Clone)]
pub struct SignedAttributeLogical {
    pub oid: &'static [u8], // OID content octets
    pub der: Vec<u8>,       // Complete Attribute SEQUENCE bytes
}

impl SignedAttributeLogical {
    /// `Attribute ::= SEQUENCE { attrType OID, attrValues SET OF ANY }` with one value.
    #[must_use]
    pub fn single(oid_content: &'static [u8], value_der: &[u8]) -> Self {
        let values = tlv(constants::ASN1_SET_TAG, value_der);
        Self {
            oid: oid_content,
            der: tlv_concat(constants::ASN1_SEQUENCE_TAG, &[&oid(oid_content), &values]),
        }
    }
}

impl fmt::Debug for SignedAttributeLogical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignedAttributeLogical(oid={}, len={})",
            hex::encode(self.oid),
            self.der.len()
        )
    }
}

/// Canonically ordered, concatenated DER of all attributes (without outer SET tag).
pub struct SignedAttributesCanonical {
    ordered: Vec<SignedAttributeLogical>,
    concatenated_der: Vec<u8>,
}

impl SignedAttributesCanonical {
    #[must_use]
    pub fn new(mut attrs: Vec<SignedAttributeLogical>) -> Self {
        attrs.sort_by(|a, b| a.der.cmp(&b.der)); // DER SET ordering
        let concatenated_der = attrs.iter().flat_map(|a| a.der.iter().copied()).collect();
        Self {
            ordered: attrs,
            concatenated_der,
        }
    }
    #[must_use]
    pub fn concatenated_der(&self) -> &[u8] {
        &self.concatenated_der
    }
    #[must_use]
    pub fn ordered(&self) -> &[SignedAttributeLogical] {
        &self.ordered
    }
}

impl fmt::Debug for SignedAttributesCanonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignedAttributesCanonical(count={}, total_len={})",
            self.ordered.len(),
            self.concatenated_der.len()
        )
    }
}

/// contentType, messageDigest and signingTime for one signature.
#[derive(Debug)]
pub struct AuthenticatedAttributes {
    canonical: SignedAttributesCanonical,
    message_digest: DigestBytes,
    signing_time: SystemTime,
}

impl AuthenticatedAttributes {
    /// Build the attribute set over a content digest.
    pub fn new(message_digest: DigestBytes, signing_time: SystemTime) -> SigningResult<Self> {
        let content_type = SignedAttributeLogical::single(
            constants::PKCS9_CONTENT_TYPE_OID,
            &oid(constants::PKCS7_DATA_OID),
        );
        let digest = SignedAttributeLogical::single(
            constants::PKCS9_MESSAGE_DIGEST_OID,
            &tlv(constants::ASN1_OCTET_STRING_TAG, message_digest.as_slice()),
        );
        let time = SignedAttributeLogical::single(
            constants::PKCS9_SIGNING_TIME_OID,
            &UtcTime::from_system_time(signing_time)?.to_der()?,
        );

        Ok(Self {
            canonical: SignedAttributesCanonical::new(vec![content_type, digest, time]),
            message_digest,
            signing_time,
        })
    }

    /// `SET OF Attribute`, the exact bytes the signature covers.
    #[must_use]
    pub fn set_der(&self) -> Vec<u8> {
        tlv(constants::ASN1_SET_TAG, self.canonical.concatenated_der())
    }

    /// `[0] IMPLICIT` form embedded in the `SignerInfo`.
    #[must_use]
    pub fn implicit_der(&self) -> Vec<u8> {
        tlv(constants::ASN1_CONTEXT_0_TAG, self.canonical.concatenated_der())
    }

    /// Digest of [`Self::set_der`] under the content digest's algorithm.
    #[must_use]
    pub fn digest_to_sign(&self) -> DigestBytes {
        self.message_digest.algorithm().digest(&self.set_der())
    }

    #[must_use]
    pub fn message_digest(&self) -> &DigestBytes {
        &self.message_digest
    }

    #[must_use]
    pub fn signing_time(&self) -> SystemTime {
        self.signing_time
    }

    #[must_use]
    pub fn canonical(&self) -> &SignedAttributesCanonical {
        &self.canonical
    }
}
