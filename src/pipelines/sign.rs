//! `SignWorkflow` orchestrates the signing steps.
//!
//! Signing is split in two phases so the key can live elsewhere:
//! [`SignWorkflow::prepare`] allocates and resolves the placeholder and builds
//! the authenticated attributes, [`PendingSignature::complete`] takes the
//! certificate and raw signature and embeds the PKCS#7 blob. Local signing
//! simply runs both phases back to back.

use std::time::SystemTime;

use openssl::x509::X509;

use crate::{
    adapters::identity::SigningIdentity,
    domain::{
        crypto::{DigestBytes, HashAlgorithm},
        pdf::{ByteRange, SignaturePlacement},
        pkcs7::AuthenticatedAttributes,
    },
    infra::config::SigningConfiguration,
    services::{
        embedder::PdfSignatureEmbedderService,
        pkcs7_builder::Pkcs7BuilderService,
        placeholder::{PlaceholderAllocator, PlaceholderOptions, SignatureAppearance},
        resolver::{ByteRangeResolver, PreparedDocument},
        verification::signature_matches,
    },
    SigningError, SigningResult,
};

pub struct SignWorkflow {
    hash_algorithm: HashAlgorithm,
    allocator: PlaceholderAllocator,
    resolver: ByteRangeResolver,
}

impl Default for SignWorkflow {
    fn default() -> Self {
        Self::new(HashAlgorithm::default(), PlaceholderOptions::default())
    }
}

impl SignWorkflow {
    #[must_use]
    pub fn new(hash_algorithm: HashAlgorithm, options: PlaceholderOptions) -> Self {
        Self {
            hash_algorithm,
            allocator: PlaceholderAllocator::new(options),
            resolver: ByteRangeResolver::new(),
        }
    }

    pub fn from_config(config: &SigningConfiguration) -> SigningResult<Self> {
        config.validate()?;
        Ok(Self::new(
            config.hash_algorithm()?,
            PlaceholderOptions::from(config),
        ))
    }

    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    #[must_use]
    pub fn placeholder_options(&self) -> &PlaceholderOptions {
        self.allocator.options()
    }

    /// Phase one: placeholder, ByteRange and authenticated attributes.
    pub fn prepare(
        &self,
        pdf: &[u8],
        placement: &SignaturePlacement,
        signer_label: &str,
    ) -> SigningResult<PendingSignature> {
        let signing_time = SystemTime::now();
        let appearance = SignatureAppearance {
            signer_label: signer_label.to_string(),
            signing_time,
        };

        let placeholdered = self.allocator.allocate(pdf, placement, &appearance)?;
        let prepared = self.resolver.resolve(placeholdered)?;
        let content_digest = prepared.content_digest(self.hash_algorithm);
        log::debug!(
            "Content digest ({}): {}",
            self.hash_algorithm,
            content_digest.to_hex()
        );
        let attributes = AuthenticatedAttributes::new(content_digest, signing_time)?;

        Ok(PendingSignature {
            prepared,
            attributes,
            hash_algorithm: self.hash_algorithm,
        })
    }

    /// Both phases with a key available in-process.
    pub fn sign_with_identity(
        &self,
        pdf: &[u8],
        placement: &SignaturePlacement,
        signer_label: &str,
        identity: &dyn SigningIdentity,
    ) -> SigningResult<Vec<u8>> {
        let pending = self.prepare(pdf, placement, signer_label)?;
        let signature = identity.sign_digest(&pending.digest_to_sign())?;
        pending.complete(&identity.certificate_der()?, &signature)
    }
}

/// A resolved document waiting for its signature.
#[derive(Debug)]
pub struct PendingSignature {
    prepared: PreparedDocument,
    attributes: AuthenticatedAttributes,
    hash_algorithm: HashAlgorithm,
}

impl PendingSignature {
    /// Hash of the DER attribute SET; the value the key holder signs.
    #[must_use]
    pub fn digest_to_sign(&self) -> DigestBytes {
        self.attributes.digest_to_sign()
    }

    /// Hash of the ByteRange-covered bytes, carried as `messageDigest`.
    #[must_use]
    pub fn content_digest(&self) -> &DigestBytes {
        self.attributes.message_digest()
    }

    #[must_use]
    pub fn byte_range(&self) -> ByteRange {
        self.prepared.byte_range()
    }

    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    /// Phase two: check the signature, assemble PKCS#7 and embed it.
    ///
    /// A signature that does not verify against the certificate is rejected
    /// here, so a bad reply never produces a "signed" document.
    pub fn complete(self, cert_der: &[u8], signature: &[u8]) -> SigningResult<Vec<u8>> {
        let cert = X509::from_der(cert_der).map_err(|e| {
            SigningError::CertificateError(format!("Failed to parse signer certificate: {e}"))
        })?;
        let key = cert.public_key().map_err(|e| {
            SigningError::CertificateError(format!("Signer certificate has no usable key: {e}"))
        })?;

        if !signature_matches(
            &key,
            self.hash_algorithm,
            &self.attributes.set_der(),
            signature,
        ) {
            return Err(SigningError::InvalidAuthenticatedAttributes(
                "signature does not verify against the signer certificate".to_string(),
            ));
        }

        let pkcs7 = Pkcs7BuilderService::new(cert_der.to_vec(), self.hash_algorithm)
            .build_signed(&self.attributes, signature)?;
        PdfSignatureEmbedderService::new().embed(self.prepared, &pkcs7)
    }
}
