//! WebSocket relay sessions.
//!
//! Browser clients connect to `/client` and submit sign or verify requests;
//! the remote key holder connects to `/signer`. Both kinds of session only
//! exchange messages with the [`CoordinatorHandle`], which owns all state.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use warp::ws::{Message, WebSocket};

use super::coordinator::{CoordinatorHandle, SignIntent};
use super::protocol::{error_codes, ClientReply, ClientRequest, SignerMessage};
use crate::pipelines::verify::VerifyWorkflow;

/// Shared state for the relay handlers.
pub struct RelayState {
    coordinator: CoordinatorHandle,
    verifier: Arc<VerifyWorkflow>,
    /// Expected bearer token for `/signer`, if any.
    signer_token: Option<String>,
}

impl RelayState {
    #[must_use]
    pub fn new(coordinator: CoordinatorHandle, signer_token: Option<String>) -> Self {
        Self {
            coordinator,
            verifier: Arc::new(VerifyWorkflow::new()),
            signer_token: signer_token.filter(|t| !t.is_empty()),
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    #[must_use]
    pub fn requires_signer_token(&self) -> bool {
        self.signer_token.is_some()
    }

    /// Validate the authentication token.
    fn validate_auth(&self, token: &str) -> bool {
        let Some(expected) = &self.signer_token else {
            return true;
        };
        // Constant-time comparison to prevent timing attacks
        let expected = expected.as_bytes();
        let provided = token.as_bytes();
        if expected.len() != provided.len() {
            return false;
        }
        expected
            .iter()
            .zip(provided)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Extract bearer token from Authorization header value.
#[must_use]
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

/// Validate the `Authorization` header of a signer connection.
pub fn validate_signer_auth(state: &RelayState, auth_header: Option<&str>) -> Result<(), ClientReply> {
    if !state.requires_signer_token() {
        return Ok(());
    }
    let token = auth_header.and_then(extract_bearer_token).ok_or_else(|| {
        ClientReply::error(
            error_codes::AUTH_FAILED,
            "Missing or invalid Authorization header",
        )
    })?;
    if !state.validate_auth(token) {
        return Err(ClientReply::error(
            error_codes::AUTH_FAILED,
            "Invalid authentication token",
        ));
    }
    Ok(())
}

/// Turn one client text frame into the reply to send back.
pub async fn handle_client_text(state: &RelayState, text: &str) -> ClientReply {
    let request = match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Malformed client message: {e}");
            return ClientReply::error(error_codes::BAD_REQUEST, format!("Malformed request: {e}"));
        }
    };

    match request {
        ClientRequest::Sign(data) => {
            let pdf = match data.decode_pdf() {
                Ok(pdf) => pdf,
                Err(e) => return ClientReply::from_error(&e),
            };
            log::info!(
                "Client sign request: {} bytes, page {}",
                pdf.len(),
                data.page_index
            );
            let intent = SignIntent {
                pdf,
                placement: data.placement(),
                signer_name: data.signer_name.clone(),
            };
            match state.coordinator.sign(intent).await {
                Ok(signed) => ClientReply::signed(&signed),
                Err(e) => ClientReply::from_error(&e),
            }
        }
        ClientRequest::Verify(data) => match data.decode_pdf() {
            Ok(pdf) => verify_off_thread(state, pdf).await,
            Err(e) => ClientReply::from_error(&e),
        },
    }
}

/// Verification parses the whole document, so it runs on the blocking pool.
async fn verify_off_thread(state: &RelayState, pdf: Vec<u8>) -> ClientReply {
    let verifier = Arc::clone(&state.verifier);
    log::info!("Client verify request: {} bytes", pdf.len());
    match tokio::task::spawn_blocking(move || verifier.run(&pdf)).await {
        Ok(report) => ClientReply::verified(&report),
        Err(e) => {
            log::error!("Verification job failed: {e}");
            ClientReply::error(error_codes::INTERNAL_ERROR, format!("verification failed: {e}"))
        }
    }
}

fn to_frame(reply: &ClientReply) -> Option<Message> {
    match serde_json::to_string(reply) {
        Ok(text) => Some(Message::text(text)),
        Err(e) => {
            log::error!("Failed to serialize reply: {e}");
            None
        }
    }
}

/// Serve one browser client until it disconnects.
pub async fn client_session(socket: WebSocket, state: Arc<RelayState>) {
    let (mut tx, mut rx) = socket.split();
    log::info!("Client connected");

    while let Some(frame) = rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Client socket error: {e}");
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        let Ok(text) = frame.to_str() else {
            continue;
        };

        let reply = handle_client_text(&state, text).await;
        if let Some(frame) = to_frame(&reply) {
            if tx.send(frame).await.is_err() {
                break;
            }
        }
    }
    log::info!("Client disconnected");
}

/// Serve the remote key holder until it disconnects.
pub async fn signer_session(socket: WebSocket, state: Arc<RelayState>) {
    let mut link = match state.coordinator.connect_signer().await {
        Ok(link) => link,
        Err(e) => {
            log::error!("Could not register signer: {e}");
            return;
        }
    };
    let connection = link.id;
    let (mut tx, mut rx) = socket.split();

    let forward = tokio::spawn(async move {
        while let Some(request) = link.requests.recv().await {
            let text = match serde_json::to_string(&request) {
                Ok(text) => text,
                Err(e) => {
                    log::error!("Failed to serialize signer request: {e}");
                    continue;
                }
            };
            log::debug!("-> signer {connection}: {}", request.request_id());
            if tx.send(Message::text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Signer socket error: {e}");
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        let Ok(text) = frame.to_str() else {
            continue;
        };
        match serde_json::from_str::<SignerMessage>(text) {
            Ok(message) => {
                if state.coordinator.submit_response(message).await.is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("Ignoring malformed signer message: {e}"),
        }
    }

    forward.abort();
    let _ = state.coordinator.disconnect_signer(connection).await;
}
