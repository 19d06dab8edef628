//! PKCS#7 builder service with inline component assembly.
//! Implements detached PKCS#7 `SignedData` construction for PDF signatures.
//!
//! Assembles the final CMS container that includes certificates, signed
//! attributes and signature data. Detached means the encapsulated content is
//! just the `data` content type with no content; the covered bytes live in
//! the PDF itself.

use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::{
    domain::{
        constants,
        crypto::HashAlgorithm,
        pkcs7::{
            encoding::{algorithm_identifier, oid, tlv, tlv_concat},
            AuthenticatedAttributes, Pkcs7SignedData,
        },
    },
    SigningError, SigningResult,
};

pub struct Pkcs7BuilderService {
    cert_der: Vec<u8>,
    additional_certs: Vec<Vec<u8>>,
    hash_algorithm: HashAlgorithm,
}

impl Pkcs7BuilderService {
    /// create service from raw certificate DER & chosen hash algorithm.
    #[must_use]
    pub fn new(cert_der: Vec<u8>, hash_algorithm: HashAlgorithm) -> Self {
        Self {
            cert_der,
            additional_certs: Vec::new(),
            hash_algorithm,
        }
    }

    /// Set additional certificates (typically intermediate CAs) to carry
    /// alongside the signing certificate.
    #[must_use]
    pub fn with_additional_certs(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.additional_certs = certs;
        self
    }

    /// Build the full `ContentInfo` from signed attributes + raw signature.
    pub fn build_signed(
        &self,
        attributes: &AuthenticatedAttributes,
        signature: &[u8],
    ) -> SigningResult<Pkcs7SignedData> {
        if signature.is_empty() {
            return Err(SigningError::InvalidInput("empty signature".to_string()));
        }

        let cert = Certificate::from_der(&self.cert_der).map_err(|e| {
            SigningError::CertificateError(format!("Failed to parse certificate: {e}"))
        })?;

        let signed_data = tlv_concat(
            constants::ASN1_SEQUENCE_TAG,
            &[
                constants::PKCS7_VERSION_1,
                &self.build_digest_algorithms(),
                &Self::build_encap_content_info(),
                &self.build_certificates(),
                &self.build_signer_infos(&cert, attributes, signature)?,
            ],
        );

        let content_info = tlv_concat(
            constants::ASN1_SEQUENCE_TAG,
            &[
                &oid(constants::PKCS7_SIGNED_DATA_OID),
                &tlv(constants::ASN1_CONTEXT_0_TAG, &signed_data), // [0] EXPLICIT
            ],
        );

        log::debug!("Assembled PKCS#7 SignedData of {} bytes", content_info.len());
        Ok(Pkcs7SignedData::from_der(content_info))
    }

    /// digestAlgorithms (SET of one).
    fn build_digest_algorithms(&self) -> Vec<u8> {
        tlv(
            constants::ASN1_SET_TAG,
            &algorithm_identifier(self.hash_algorithm.oid_bytes(), true),
        )
    }

    /// encapContentInfo with content type `data` and no content.
    fn build_encap_content_info() -> Vec<u8> {
        tlv(constants::ASN1_SEQUENCE_TAG, &oid(constants::PKCS7_DATA_OID))
    }

    /// certificates [0] IMPLICIT, signer first.
    fn build_certificates(&self) -> Vec<u8> {
        let mut body = self.cert_der.clone();
        for extra in &self.additional_certs {
            body.extend_from_slice(extra);
        }
        tlv(constants::ASN1_CONTEXT_0_TAG, &body)
    }

    /// signatureAlgorithm derived from the certificate's key type.
    fn signature_algorithm(&self, cert: &Certificate) -> SigningResult<Vec<u8>> {
        let key_oid = cert
            .tbs_certificate
            .subject_public_key_info
            .algorithm
            .oid;
        match key_oid.as_bytes() {
            k if k == constants::RSA_ENCRYPTION_OID => {
                Ok(algorithm_identifier(constants::RSA_ENCRYPTION_OID, true))
            }
            k if k == constants::EC_PUBLIC_KEY_OID => Ok(algorithm_identifier(
                self.hash_algorithm.ecdsa_signature_oid(),
                false,
            )),
            _ => Err(SigningError::CertificateError(format!(
                "Unsupported public key algorithm {key_oid}"
            ))),
        }
    }

    /// signerInfos (single `SignerInfo`).
    fn build_signer_infos(
        &self,
        cert: &Certificate,
        attributes: &AuthenticatedAttributes,
        signature: &[u8],
    ) -> SigningResult<Vec<u8>> {
        let issuer_and_serial = tlv_concat(
            constants::ASN1_SEQUENCE_TAG,
            &[
                &cert.tbs_certificate.issuer.to_der()?,
                &cert.tbs_certificate.serial_number.to_der()?,
            ],
        );

        let signer_info = tlv_concat(
            constants::ASN1_SEQUENCE_TAG,
            &[
                constants::PKCS7_VERSION_1,
                &issuer_and_serial,
                &algorithm_identifier(self.hash_algorithm.oid_bytes(), true),
                &attributes.implicit_der(),
                &self.signature_algorithm(cert)?,
                &tlv(constants::ASN1_OCTET_STRING_TAG, signature),
            ],
        );

        Ok(tlv(constants::ASN1_SET_TAG, &signer_info))
    }
}
