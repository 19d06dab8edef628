//! Protocol definitions for remote PDF signing.
//!
//! Defines the JSON messages exchanged over the relay: browser clients talk
//! to `/client`, the remote key holder talks to `/signer`. Every message
//! carries an `action` discriminator.

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{
    adapters::identity::certificate_pem_to_der,
    domain::{
        crypto::{DigestBytes, HashAlgorithm},
        pdf::{SelectionRect, SignaturePlacement},
        verification::VerificationReport,
    },
    SigningError, SigningResult,
};

fn decode_b64(field: &str, value: &str) -> SigningResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| SigningError::ProtocolError(format!("{field} is not valid base64: {e}")))
}

fn encode_b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Correlates a signer request with its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Fresh random identifier (128 bits, hex).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::fill(&mut bytes);
        Self(hex::encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Messages a browser client sends to `/client`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum ClientRequest {
    Sign(SignRequestData),
    Verify(VerifyRequestData),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequestData {
    /// Base64 PDF bytes.
    pub pdf_buffer: String,
    /// Zero-based page index.
    pub page_index: usize,
    pub selection_coords: SelectionRect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_name: Option<String>,
}

impl SignRequestData {
    pub fn decode_pdf(&self) -> SigningResult<Vec<u8>> {
        decode_b64("pdfBuffer", &self.pdf_buffer)
    }

    #[must_use]
    pub fn placement(&self) -> SignaturePlacement {
        SignaturePlacement::new(self.page_index, self.selection_coords)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequestData {
    /// Base64 PDF bytes.
    pub pdf_buffer: String,
}

impl VerifyRequestData {
    pub fn decode_pdf(&self) -> SigningResult<Vec<u8>> {
        decode_b64("pdfBuffer", &self.pdf_buffer)
    }
}

/// Replies sent back on `/client`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientReply {
    /// Base64 signed PDF.
    Signed { data: String },
    Verified {
        verified: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signer: Option<String>,
    },
    Error { code: String, message: String },
}

impl ClientReply {
    #[must_use]
    pub fn signed(pdf: &[u8]) -> Self {
        Self::Signed {
            data: encode_b64(pdf),
        }
    }

    #[must_use]
    pub fn verified(report: &VerificationReport) -> Self {
        Self::Verified {
            verified: report.success(),
            reason: report.failure.map(|f| f.as_str().to_string()),
            signer: report
                .details
                .as_ref()
                .and_then(|d| d.signer_common_name.clone()),
        }
    }

    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_error(error: &SigningError) -> Self {
        Self::error(error.code(), error.to_string())
    }

    /// Decode a `signed` reply back into PDF bytes.
    pub fn decode_signed(&self) -> SigningResult<Vec<u8>> {
        match self {
            Self::Signed { data } => decode_b64("data", data),
            other => Err(SigningError::ProtocolError(format!(
                "expected a signed reply, got {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Signer side
// ---------------------------------------------------------------------------

/// Messages the relay sends to the remote key holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SignerRequest {
    GetCertAndSign(CertAndSignRequest),
}

impl SignerRequest {
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::GetCertAndSign(request) => &request.request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertAndSignRequest {
    pub request_id: RequestId,
    /// Hex digest to sign: the hash of the DER authenticated-attribute SET.
    pub digest: String,
    /// Hex SHA-256 of the document as uploaded, for the signer's audit trail.
    pub document_digest: String,
    pub hash_algorithm: HashAlgorithm,
}

impl CertAndSignRequest {
    #[must_use]
    pub fn new(request_id: RequestId, digest: &DigestBytes, document_digest: &DigestBytes) -> Self {
        Self {
            request_id,
            digest: digest.to_hex(),
            document_digest: document_digest.to_hex(),
            hash_algorithm: digest.algorithm(),
        }
    }

    /// Digest bytes, checked against the announced algorithm.
    pub fn decode_digest(&self) -> SigningResult<DigestBytes> {
        let bytes = hex::decode(&self.digest)
            .map_err(|e| SigningError::ProtocolError(format!("digest is not valid hex: {e}")))?;
        DigestBytes::new(self.hash_algorithm, bytes)
            .map_err(|e| SigningError::ProtocolError(e.to_string()))
    }
}

/// Messages the remote key holder sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SignerMessage {
    CertAndSignResponse(CertAndSignResponse),
    SignError(SignErrorMessage),
}

impl SignerMessage {
    /// Correlation id, absent for the legacy single-slot protocol.
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::CertAndSignResponse(response) => response.request_id.as_ref(),
            Self::SignError(error) => error.request_id.as_ref(),
        }
    }
}

/// Signed reply from the key holder.
///
/// Older browser extensions wrap the payload as
/// `{"action": "certAndSignResponse", "data": {"cert", "signedHash"}}` and
/// carry no request id; both shapes decode to this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CertAndSignWire")]
pub struct CertAndSignResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// PEM certificate.
    pub certificate: String,
    /// Base64 raw signature.
    pub signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertAndSignWire {
    #[serde(default)]
    request_id: Option<RequestId>,
    #[serde(default, alias = "cert")]
    certificate: Option<String>,
    #[serde(default, alias = "signedHash")]
    signature: Option<String>,
    #[serde(default)]
    data: Option<ExtensionPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionPayload {
    cert: String,
    signed_hash: String,
}

impl TryFrom<CertAndSignWire> for CertAndSignResponse {
    type Error = String;

    fn try_from(wire: CertAndSignWire) -> Result<Self, Self::Error> {
        match (wire.certificate, wire.signature, wire.data) {
            (Some(certificate), Some(signature), _) => Ok(Self {
                request_id: wire.request_id,
                certificate,
                signature,
            }),
            (None, None, Some(data)) => Ok(Self {
                request_id: wire.request_id,
                certificate: data.cert,
                signature: data.signed_hash,
            }),
            _ => Err("certAndSignResponse needs a certificate and a signature".to_string()),
        }
    }
}

impl CertAndSignResponse {
    #[must_use]
    pub fn new(request_id: Option<RequestId>, certificate_pem: &[u8], signature: &[u8]) -> Self {
        Self {
            request_id,
            certificate: String::from_utf8_lossy(certificate_pem).into_owned(),
            signature: encode_b64(signature),
        }
    }

    /// DER of the PEM certificate; a bad PEM is a protocol fault of the signer.
    pub fn certificate_der(&self) -> SigningResult<Vec<u8>> {
        certificate_pem_to_der(self.certificate.as_bytes()).map_err(|e| match e {
            SigningError::CertificateError(message) => SigningError::ProtocolError(message),
            other => other,
        })
    }

    pub fn decode_signature(&self) -> SigningResult<Vec<u8>> {
        let signature = decode_b64("signature", &self.signature)?;
        if signature.is_empty() {
            return Err(SigningError::ProtocolError("signature is empty".to_string()));
        }
        Ok(signature)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignErrorMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    pub message: String,
}

/// Error codes the relay emits that do not come from [`SigningError::code`].
pub mod error_codes {
    /// Authentication failed (bad token).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    /// Malformed request or unknown action.
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    /// A background job of the relay panicked.
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_sign_request_parses_browser_shape() {
        let raw = json!({
            "action": "sign",
            "data": {
                "pdfBuffer": "JVBERi0=",
                "pageIndex": 1,
                "selectionCoords": {"startX": 100, "startY": 200, "endX": 300, "endY": 250}
            }
        });
        let ClientRequest::Sign(data) = serde_json::from_value(raw).unwrap() else {
            panic!("expected a sign request");
        };
        assert_eq!(data.decode_pdf().unwrap(), b"%PDF-");
        assert_eq!(data.placement().page_index, 1);
        assert_eq!(data.selection_coords.end_y, 250.0);
        assert!(data.signer_name.is_none());
    }

    #[test]
    fn client_replies_use_action_tag() {
        let reply = serde_json::to_value(ClientReply::error("SIGNER_BUSY", "busy")).unwrap();
        assert_eq!(reply, json!({"action": "error", "code": "SIGNER_BUSY", "message": "busy"}));

        let reply = serde_json::to_value(ClientReply::Verified {
            verified: true,
            reason: None,
            signer: None,
        })
        .unwrap();
        assert_eq!(reply, json!({"action": "verified", "verified": true}));
    }

    #[test]
    fn signer_request_wire_format() {
        let digest = HashAlgorithm::Sha256.digest(b"attrs");
        let doc = HashAlgorithm::Sha256.digest(b"doc");
        let request = SignerRequest::GetCertAndSign(CertAndSignRequest::new(
            RequestId::from("abc"),
            &digest,
            &doc,
        ));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["action"], "getCertAndSign");
        assert_eq!(value["requestId"], "abc");
        assert_eq!(value["digest"], digest.to_hex());
        assert_eq!(value["documentDigest"], doc.to_hex());
        assert_eq!(value["hashAlgorithm"], "sha256");

        let SignerRequest::GetCertAndSign(parsed) = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.decode_digest().unwrap(), digest);
    }

    #[test]
    fn signer_response_accepts_flat_shape_without_id() {
        let raw = r#"{"action":"certAndSignResponse","cert":"-----BEGIN CERTIFICATE-----","signature":"AQID"}"#;
        let message: SignerMessage = serde_json::from_str(raw).unwrap();
        assert!(message.request_id().is_none());
        let SignerMessage::CertAndSignResponse(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(response.decode_signature().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn signer_response_accepts_extension_envelope() {
        let raw = r#"{"action":"certAndSignResponse","data":{"cert":"PEM","signedHash":"AQID"}}"#;
        let message: SignerMessage = serde_json::from_str(raw).unwrap();
        assert!(message.request_id().is_none());
        let SignerMessage::CertAndSignResponse(response) = message else {
            panic!("expected a response");
        };
        assert_eq!(response.certificate, "PEM");
        assert_eq!(response.decode_signature().unwrap(), vec![1, 2, 3]);

        // Re-encoding uses the current flat shape.
        let value = serde_json::to_value(SignerMessage::CertAndSignResponse(response)).unwrap();
        assert_eq!(value["certificate"], "PEM");
        assert_eq!(value["signature"], "AQID");
    }

    #[test]
    fn signer_response_without_signature_is_rejected() {
        let raw = r#"{"action":"certAndSignResponse","requestId":"r1","certificate":"PEM"}"#;
        assert!(serde_json::from_str::<SignerMessage>(raw).is_err());
        let raw = r#"{"action":"certAndSignResponse","data":{"cert":"PEM"}}"#;
        assert!(serde_json::from_str::<SignerMessage>(raw).is_err());
    }

    #[test]
    fn bad_certificate_pem_is_a_signer_fault() {
        let response = CertAndSignResponse::new(None, b"not a certificate", &[1, 2, 3]);
        let err = response.certificate_der().unwrap_err();
        assert!(matches!(err, SigningError::ProtocolError(_)));
        assert_eq!(err.category(), crate::infra::error::ErrorCategory::Signer);
    }

    #[test]
    fn sign_error_carries_request_id() {
        let raw = r#"{"action":"signError","requestId":"r1","message":"user declined"}"#;
        let message: SignerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.request_id().map(RequestId::as_str), Some("r1"));
    }

    #[test]
    fn request_ids_are_unique_hex() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }
}
