//! Signing identities: a certificate plus whatever can sign a digest with
//! its private key.
//!
//! The remote key holder is one such identity reached through the
//! coordinator; [`LocalKeyIdentity`] keeps the key in-process via OpenSSL.

use std::path::Path;

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, Private};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::{Padding, Rsa};
use openssl::x509::{X509Builder, X509NameBuilder, X509};

use crate::{
    domain::crypto::DigestBytes,
    services::verification::common_name,
    SigningError, SigningResult,
};

/// Anything able to produce a raw signature over a precomputed digest.
pub trait SigningIdentity: Send + Sync {
    /// DER-encoded signer certificate.
    fn certificate_der(&self) -> SigningResult<Vec<u8>>;

    /// Sign `digest` (PKCS#1 v1.5 for RSA keys, DER ECDSA for EC keys).
    ///
    /// # Errors
    ///
    /// Returns error if the key cannot sign with the digest's algorithm.
    fn sign_digest(&self, digest: &DigestBytes) -> SigningResult<Vec<u8>>;
}

/// Certificate and private key held in memory.
pub struct LocalKeyIdentity {
    certificate: X509,
    key: PKey<Private>,
}

impl LocalKeyIdentity {
    /// Pair a certificate with its key, refusing mismatched pairs.
    pub fn new(certificate: X509, key: PKey<Private>) -> SigningResult<Self> {
        let public = certificate.public_key().map_err(|e| {
            SigningError::CertificateError(format!("certificate has no usable public key: {e}"))
        })?;
        if !public.public_eq(&key) {
            return Err(SigningError::CertificateError(
                "private key does not match the certificate".to_string(),
            ));
        }
        Ok(Self { certificate, key })
    }

    /// Load a PEM certificate and PEM private key.
    pub fn from_pem(certificate_pem: &[u8], key_pem: &[u8]) -> SigningResult<Self> {
        let certificate = X509::from_pem(certificate_pem)
            .map_err(|e| SigningError::CertificateError(format!("invalid certificate PEM: {e}")))?;
        let key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| SigningError::CertificateError(format!("invalid private key PEM: {e}")))?;
        Self::new(certificate, key)
    }

    /// Read both PEM files from disk.
    pub fn from_pem_files<P: AsRef<Path>>(certificate: P, key: P) -> SigningResult<Self> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|e| {
                SigningError::IoError(format!("Failed to read {}: {e}", path.display()))
            })
        };
        Self::from_pem(&read(certificate.as_ref())?, &read(key.as_ref())?)
    }

    /// Throwaway self-signed RSA identity, valid for one year.
    pub fn generate_self_signed(common_name: &str, bits: u32) -> SigningResult<Self> {
        let cert_err = |what: &str, e: openssl::error::ErrorStack| {
            SigningError::CertificateError(format!("{what}: {e}"))
        };

        let rsa = Rsa::generate(bits).map_err(|e| cert_err("RSA key generation failed", e))?;
        let key = PKey::from_rsa(rsa).map_err(|e| cert_err("PKey failed", e))?;

        let mut name = X509NameBuilder::new().map_err(|e| cert_err("Name builder", e))?;
        name.append_entry_by_text("CN", common_name)
            .map_err(|e| cert_err("Name entry", e))?;
        let name = name.build();

        let mut serial = BigNum::new().map_err(|e| cert_err("BigNum", e))?;
        serial
            .rand(64, MsbOption::MAYBE_ZERO, false)
            .map_err(|e| cert_err("Serial", e))?;
        let serial = serial
            .to_asn1_integer()
            .map_err(|e| cert_err("ASN1 int", e))?;

        let not_before = Asn1Time::days_from_now(0).map_err(|e| cert_err("not_before", e))?;
        let not_after = Asn1Time::days_from_now(365).map_err(|e| cert_err("not_after", e))?;

        let mut builder = X509Builder::new().map_err(|e| cert_err("X509 builder", e))?;
        builder.set_version(2).map_err(|e| cert_err("Set version", e))?;
        builder
            .set_serial_number(&serial)
            .map_err(|e| cert_err("Set serial", e))?;
        builder
            .set_subject_name(&name)
            .map_err(|e| cert_err("Set subject", e))?;
        builder
            .set_issuer_name(&name)
            .map_err(|e| cert_err("Set issuer", e))?;
        builder
            .set_not_before(&not_before)
            .map_err(|e| cert_err("Set not_before", e))?;
        builder
            .set_not_after(&not_after)
            .map_err(|e| cert_err("Set not_after", e))?;
        builder.set_pubkey(&key).map_err(|e| cert_err("Set pubkey", e))?;
        builder
            .sign(&key, MessageDigest::sha256())
            .map_err(|e| cert_err("Self-sign", e))?;

        log::debug!("Generated self-signed {bits}-bit RSA identity '{common_name}'");
        Ok(Self {
            certificate: builder.build(),
            key,
        })
    }

    #[must_use]
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// PEM form of the certificate, as the remote key holder sends it.
    pub fn certificate_pem(&self) -> SigningResult<Vec<u8>> {
        Ok(self.certificate.to_pem()?)
    }

    #[must_use]
    pub fn common_name(&self) -> Option<String> {
        common_name(&self.certificate)
    }
}

impl SigningIdentity for LocalKeyIdentity {
    fn certificate_der(&self) -> SigningResult<Vec<u8>> {
        Ok(self.certificate.to_der()?)
    }

    fn sign_digest(&self, digest: &DigestBytes) -> SigningResult<Vec<u8>> {
        let mut ctx = PkeyCtx::new(&self.key)?;
        ctx.sign_init()?;
        if self.key.id() == Id::RSA {
            ctx.set_rsa_padding(Padding::PKCS1)?;
        }
        ctx.set_signature_md(digest.algorithm().md())?;

        let mut signature = Vec::new();
        ctx.sign_to_vec(digest.as_slice(), &mut signature)?;
        log::debug!(
            "Signed {} digest locally ({} byte signature)",
            digest.algorithm(),
            signature.len()
        );
        Ok(signature)
    }
}

/// Decode a PEM certificate into DER.
pub fn certificate_pem_to_der(pem: &[u8]) -> SigningResult<Vec<u8>> {
    let certificate = X509::from_pem(pem)
        .map_err(|e| SigningError::CertificateError(format!("invalid certificate PEM: {e}")))?;
    Ok(certificate.to_der()?)
}
