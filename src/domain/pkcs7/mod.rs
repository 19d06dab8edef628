//! PKCS#7 `SignedData` domain types.
//!
//! [`Pkcs7SignedData`] wraps encoded bytes on the way out; [`SignedDataView`]
//! is the typed result of decoding an embedded blob on the way in.

use std::fmt;
use std::time::SystemTime;

use der::asn1::UtcTime;
use der::Decode;

use crate::domain::constants;
use crate::domain::crypto::HashAlgorithm;
use crate::{SigningError, SigningResult};

pub mod attributes;
pub mod encoding;

use self::encoding::Tlv;

pub struct Pkcs7SignedData {
    der: Vec<u8>,
}

impl Pkcs7SignedData {
    #[must_use]
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
    #[must_use]
    pub fn into_der(self) -> Vec<u8> {
        self.der
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.der.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }
}

impl fmt::Debug for Pkcs7SignedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pkcs7SignedData(len={})", self.der.len())
    }
}

/// One decoded attribute: type OID content octets plus raw value TLVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttribute {
    pub oid: Vec<u8>,
    pub values: Vec<Vec<u8>>,
}

/// Authenticated attributes as found in a `SignerInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttributeSet {
    set_der: Vec<u8>,
    attributes: Vec<DecodedAttribute>,
}

impl SignedAttributeSet {
    /// Decode from the `[0] IMPLICIT` element, keeping its byte order intact.
    pub fn from_implicit(element: &Tlv<'_>) -> SigningResult<Self> {
        let mut set_der = element.raw.to_vec();
        set_der[0] = constants::ASN1_SET_TAG;

        let mut attributes = Vec::new();
        for attribute in element.children() {
            let attribute = attribute?;
            let (attr_type, rest) =
                Tlv::expect(attribute.value, constants::ASN1_OID_TAG, "attribute type")?;
            let (values, _) = Tlv::expect(rest, constants::ASN1_SET_TAG, "attribute values")?;
            let values = values
                .children()
                .map(|value| value.map(|v| v.raw.to_vec()))
                .collect::<SigningResult<Vec<_>>>()?;
            attributes.push(DecodedAttribute {
                oid: attr_type.value.to_vec(),
                values,
            });
        }

        Ok(Self {
            set_der,
            attributes,
        })
    }

    /// The attribute set re-tagged as `SET OF`, exactly as it was signed.
    #[must_use]
    pub fn set_der(&self) -> &[u8] {
        &self.set_der
    }

    #[must_use]
    pub fn attributes(&self) -> &[DecodedAttribute] {
        &self.attributes
    }

    fn single_value(&self, oid: &[u8]) -> Option<&[u8]> {
        self.attributes
            .iter()
            .find(|a| a.oid == oid)
            .and_then(|a| a.values.first())
            .map(Vec::as_slice)
    }

    /// Content of the messageDigest OCTET STRING.
    pub fn message_digest(&self) -> SigningResult<&[u8]> {
        let value = self
            .single_value(constants::PKCS9_MESSAGE_DIGEST_OID)
            .ok_or_else(|| {
                SigningError::MalformedPkcs7("messageDigest attribute not found".to_string())
            })?;
        let (octets, _) = Tlv::expect(value, constants::ASN1_OCTET_STRING_TAG, "messageDigest")?;
        Ok(octets.value)
    }

    /// signingTime, when present and encoded as UTCTime.
    #[must_use]
    pub fn signing_time(&self) -> Option<SystemTime> {
        self.single_value(constants::PKCS9_SIGNING_TIME_OID)
            .and_then(|value| UtcTime::from_der(value).ok())
            .map(|time| time.to_system_time())
    }
}

/// The single `SignerInfo` of a detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfoView {
    /// Full `IssuerAndSerialNumber` encoding.
    pub issuer_and_serial: Vec<u8>,
    pub digest_algorithm: HashAlgorithm,
    pub signed_attributes: SignedAttributeSet,
    /// Signature algorithm OID content octets.
    pub signature_algorithm: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Decoded PKCS#7 `SignedData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDataView {
    pub digest_algorithms: Vec<HashAlgorithm>,
    /// DER certificates carried in the blob, in order.
    pub certificates: Vec<Vec<u8>>,
    pub signer: SignerInfoView,
}

pub use attributes::{AuthenticatedAttributes, SignedAttributeLogical, SignedAttributesCanonical};
