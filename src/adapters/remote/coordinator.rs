//! Remote Signing Coordinator.
//!
//! A single tokio task owns every piece of mutable session state: the
//! connected signer channel and the table of pending requests. Everything
//! else talks to it through a [`CoordinatorHandle`], so there is no shared
//! lock and no ambient global. PDF and OpenSSL work runs on the blocking
//! pool and reports back through the same task, which therefore stays free
//! to answer state queries, disconnects and deadlines.
//!
//! Phases: `Idle -> AwaitingRemoteSigner -> Completed | Failed -> Idle`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::protocol::{CertAndSignRequest, RequestId, SignerMessage, SignerRequest};
use crate::{
    domain::{
        crypto::{DigestBytes, HashAlgorithm},
        pdf::SignaturePlacement,
    },
    infra::config::SigningConfiguration,
    pipelines::sign::{PendingSignature, SignWorkflow},
    SigningError, SigningResult,
};

const MAILBOX_CAPACITY: usize = 64;

/// Coordinator tunables.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub signer_timeout: Duration,
    /// 1 gives strict single-slot semantics.
    pub max_in_flight: usize,
    /// Annotation label when an intent names no signer.
    pub default_signer_label: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&SigningConfiguration::default())
    }
}

impl From<&SigningConfiguration> for CoordinatorConfig {
    fn from(config: &SigningConfiguration) -> Self {
        Self {
            signer_timeout: config.signer_timeout(),
            max_in_flight: config.max_in_flight.max(1),
            default_signer_label: config.default_signer_label.clone(),
        }
    }
}

/// A request to sign one document.
#[derive(Debug, Clone)]
pub struct SignIntent {
    pub pdf: Vec<u8>,
    pub placement: SignaturePlacement,
    pub signer_name: Option<String>,
}

/// What a newly connected signer receives: its id and the request stream.
#[derive(Debug)]
pub struct SignerLink {
    pub id: u64,
    pub requests: mpsc::UnboundedReceiver<SignerRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    AwaitingRemoteSigner,
    Completed,
    Failed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::AwaitingRemoteSigner => "AwaitingRemoteSigner",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of the coordinator, for status reporting and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorState {
    pub phase: SessionPhase,
    pub signer_connected: bool,
    pub in_flight: usize,
}

type SignReply = oneshot::Sender<SigningResult<Vec<u8>>>;

enum Command {
    ConnectSigner {
        reply: oneshot::Sender<SignerLink>,
    },
    DisconnectSigner {
        id: u64,
    },
    Sign {
        intent: SignIntent,
        reply: SignReply,
    },
    SignerResponse(SignerMessage),
    State {
        reply: oneshot::Sender<CoordinatorState>,
    },
}

/// Results of the lopdf and OpenSSL work run on the blocking pool.
enum JobOutcome {
    Prepared {
        request_id: RequestId,
        result: SigningResult<(PendingSignature, DigestBytes)>,
    },
    Completed {
        request_id: RequestId,
        result: SigningResult<Vec<u8>>,
    },
}

/// Cloneable front door to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    async fn send(&self, command: Command) -> SigningResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SigningError::SignerUnavailable)
    }

    /// Register a remote signer, replacing any previous one.
    pub async fn connect_signer(&self) -> SigningResult<SignerLink> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ConnectSigner { reply }).await?;
        rx.await.map_err(|_| SigningError::SignerUnavailable)
    }

    /// Report that signer connection `id` went away.
    pub async fn disconnect_signer(&self, id: u64) -> SigningResult<()> {
        self.send(Command::DisconnectSigner { id }).await
    }

    /// Hand a message from the remote signer to the coordinator.
    pub async fn submit_response(&self, message: SignerMessage) -> SigningResult<()> {
        self.send(Command::SignerResponse(message)).await
    }

    /// Sign a document through the connected remote signer.
    ///
    /// Dropping the returned future gives the request's slot back.
    pub async fn sign(&self, intent: SignIntent) -> SigningResult<Vec<u8>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Sign { intent, reply }).await?;
        rx.await.map_err(|_| SigningError::SignerDisconnected)?
    }

    pub async fn state(&self) -> SigningResult<CoordinatorState> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::State { reply }).await?;
        rx.await.map_err(|_| SigningError::SignerUnavailable)
    }
}

struct ConnectedSigner {
    id: u64,
    tx: mpsc::UnboundedSender<SignerRequest>,
}

enum Stage {
    /// Placeholder allocation running on the blocking pool.
    Preparing,
    AwaitingSigner {
        signature: PendingSignature,
        deadline: Instant,
    },
    /// Response received; signature check and embedding in progress.
    Completing,
}

struct PendingRequest {
    stage: Stage,
    connection: u64,
    reply: SignReply,
}

impl PendingRequest {
    fn deadline(&self) -> Option<Instant> {
        match self.stage {
            Stage::AwaitingSigner { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    fn is_awaiting_signer(&self) -> bool {
        matches!(self.stage, Stage::AwaitingSigner { .. })
    }
}

/// The actor. Construct with [`SigningCoordinator::spawn`].
pub struct SigningCoordinator {
    workflow: Arc<SignWorkflow>,
    config: CoordinatorConfig,
    rx: mpsc::Receiver<Command>,
    jobs_tx: mpsc::UnboundedSender<JobOutcome>,
    jobs_rx: mpsc::UnboundedReceiver<JobOutcome>,
    signer: Option<ConnectedSigner>,
    pending: HashMap<RequestId, PendingRequest>,
    next_connection: u64,
    phase: SessionPhase,
}

impl SigningCoordinator {
    /// Start the coordinator task on the current tokio runtime.
    ///
    /// The task exits once every handle is dropped; callers still waiting
    /// then observe `SignerDisconnected`.
    #[must_use]
    pub fn spawn(workflow: SignWorkflow, config: CoordinatorConfig) -> CoordinatorHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            workflow: Arc::new(workflow),
            config,
            rx,
            jobs_tx,
            jobs_rx,
            signer: None,
            pending: HashMap::new(),
            next_connection: 1,
            phase: SessionPhase::Idle,
        };
        tokio::spawn(coordinator.run());
        CoordinatorHandle { tx }
    }

    async fn run(mut self) {
        log::debug!(
            "Signing coordinator started (timeout {:?}, max in flight {})",
            self.config.signer_timeout,
            self.config.max_in_flight
        );
        loop {
            self.release_abandoned();
            let next_deadline = self.pending.values().filter_map(PendingRequest::deadline).min();
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(outcome) = self.jobs_rx.recv() => self.finish_job(outcome),
                () = sleep_until(next_deadline) => self.expire(Instant::now()),
            }
        }
        log::debug!(
            "Signing coordinator stopped with {} request(s) pending",
            self.pending.len()
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::ConnectSigner { reply } => {
                let link = self.connect_signer();
                let _ = reply.send(link);
            }
            Command::DisconnectSigner { id } => self.disconnect_signer(id),
            Command::Sign { intent, reply } => self.start_sign(intent, reply),
            Command::SignerResponse(message) => self.complete(message),
            Command::State { reply } => {
                let _ = reply.send(CoordinatorState {
                    phase: self.phase,
                    signer_connected: self.signer.is_some(),
                    in_flight: self.pending.len(),
                });
            }
        }
    }

    fn finish_job(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Prepared { request_id, result } => self.dispatch(request_id, result),
            JobOutcome::Completed { request_id, result } => self.finish(request_id, result),
        }
    }

    /// Run `job` on the blocking pool and feed its result back to the mailbox.
    fn spawn_job<T, F, O>(&self, job: F, outcome: O)
    where
        T: Send + 'static,
        F: FnOnce() -> SigningResult<T> + Send + 'static,
        O: FnOnce(SigningResult<T>) -> JobOutcome + Send + 'static,
    {
        let jobs = self.jobs_tx.clone();
        let handle = tokio::task::spawn_blocking(job);
        tokio::spawn(async move {
            let result = handle.await.unwrap_or_else(|e| {
                Err(SigningError::CryptographicError(format!(
                    "signing job failed: {e}"
                )))
            });
            let _ = jobs.send(outcome(result));
        });
    }

    fn transition(&mut self, to: SessionPhase) {
        if self.phase != to {
            log::info!("Coordinator: {} -> {}", self.phase, to);
            self.phase = to;
        }
    }

    /// After a request finished, land in `Idle` or stay awaiting.
    fn settle(&mut self, outcome: SessionPhase) {
        self.transition(outcome);
        if self.pending.is_empty() {
            self.transition(SessionPhase::Idle);
        } else {
            self.transition(SessionPhase::AwaitingRemoteSigner);
        }
    }

    fn connect_signer(&mut self) -> SignerLink {
        let id = self.next_connection;
        self.next_connection += 1;

        if let Some(previous) = self.signer.take() {
            log::info!("Signer connection {id} replaces connection {}", previous.id);
            self.fail_connection(previous.id);
        } else {
            log::info!("Signer connection {id} established");
        }

        let (tx, requests) = mpsc::unbounded_channel();
        self.signer = Some(ConnectedSigner { id, tx });
        SignerLink { id, requests }
    }

    fn disconnect_signer(&mut self, id: u64) {
        match &self.signer {
            Some(current) if current.id == id => {
                log::info!("Signer connection {id} closed");
                self.signer = None;
                self.fail_connection(id);
            }
            _ => log::debug!("Ignoring disconnect of stale signer connection {id}"),
        }
    }

    /// Fail every request bound to connection `id` that still needs it.
    fn fail_connection(&mut self, id: u64) {
        let orphaned: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.connection == id && !matches!(p.stage, Stage::Completing))
            .map(|(request_id, _)| request_id.clone())
            .collect();
        if orphaned.is_empty() {
            return;
        }
        for request_id in orphaned {
            if let Some(pending) = self.pending.remove(&request_id) {
                log::warn!("Request {request_id} lost its signer connection");
                let _ = pending.reply.send(Err(SigningError::SignerDisconnected));
            }
        }
        self.settle(SessionPhase::Failed);
    }

    /// Free the slots of callers that stopped waiting.
    fn release_abandoned(&mut self) {
        let before = self.pending.len();
        self.pending.retain(|request_id, pending| {
            let waiting = !pending.reply.is_closed();
            if !waiting {
                log::info!("Request {request_id} abandoned by its caller; releasing slot");
            }
            waiting
        });
        if self.pending.len() != before {
            self.settle(SessionPhase::Failed);
        }
    }

    fn start_sign(&mut self, intent: SignIntent, reply: SignReply) {
        self.release_abandoned();
        let Some(signer) = &self.signer else {
            log::warn!("Sign request rejected: no remote signer connected");
            let _ = reply.send(Err(SigningError::SignerUnavailable));
            return;
        };
        if self.pending.len() >= self.config.max_in_flight {
            log::warn!(
                "Sign request rejected: {} request(s) already in flight",
                self.pending.len()
            );
            let _ = reply.send(Err(SigningError::SignerBusy));
            return;
        }
        let connection = signer.id;
        let label = intent
            .signer_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.config.default_signer_label.clone());

        // The slot is held while the document is prepared.
        let request_id = RequestId::generate();
        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                stage: Stage::Preparing,
                connection,
                reply,
            },
        );
        log::debug!("Request {request_id}: preparing {} bytes", intent.pdf.len());

        let workflow = Arc::clone(&self.workflow);
        self.spawn_job(
            move || {
                let document_digest = HashAlgorithm::Sha256.digest(&intent.pdf);
                let signature = workflow.prepare(&intent.pdf, &intent.placement, &label)?;
                Ok((signature, document_digest))
            },
            move |result| JobOutcome::Prepared { request_id, result },
        );
    }

    /// Send a prepared request to the signer it was admitted for.
    fn dispatch(
        &mut self,
        request_id: RequestId,
        result: SigningResult<(PendingSignature, DigestBytes)>,
    ) {
        let Some(connection) = self.pending.get(&request_id).map(|p| p.connection) else {
            log::debug!("Discarding preparation of request {request_id}: no longer pending");
            return;
        };
        let (signature, document_digest) = match result {
            Ok(prepared) => prepared,
            Err(error) => {
                log::warn!("Could not prepare document for signing: {error}");
                if let Some(pending) = self.pending.remove(&request_id) {
                    let _ = pending.reply.send(Err(error));
                }
                self.settle(SessionPhase::Failed);
                return;
            }
        };

        let request = SignerRequest::GetCertAndSign(CertAndSignRequest::new(
            request_id.clone(),
            &signature.digest_to_sign(),
            &document_digest,
        ));
        let sent = self
            .signer
            .as_ref()
            .filter(|signer| signer.id == connection)
            .is_some_and(|signer| signer.tx.send(request).is_ok());
        if !sent {
            log::warn!("Signer connection {connection} is gone; dropping it");
            if self.signer.as_ref().is_some_and(|s| s.id == connection) {
                self.signer = None;
            }
            self.fail_connection(connection);
            return;
        }

        log::info!(
            "Request {request_id} sent to signer {connection} (document {})",
            document_digest.to_hex()
        );
        if let Some(pending) = self.pending.get_mut(&request_id) {
            pending.stage = Stage::AwaitingSigner {
                signature,
                deadline: Instant::now() + self.config.signer_timeout,
            };
        }
        self.transition(SessionPhase::AwaitingRemoteSigner);
    }

    /// Pick the pending request a signer message answers.
    fn claim(&mut self, message: &SignerMessage) -> Option<(RequestId, PendingSignature)> {
        let request_id = match message.request_id() {
            Some(id) => id.clone(),
            None => {
                let awaiting: Vec<&RequestId> = self
                    .pending
                    .iter()
                    .filter(|(_, p)| p.is_awaiting_signer())
                    .map(|(request_id, _)| request_id)
                    .collect();
                match awaiting.as_slice() {
                    [only] => (*only).clone(),
                    _ => {
                        log::warn!(
                            "Dropping uncorrelated signer response: {} requests awaiting",
                            awaiting.len()
                        );
                        return None;
                    }
                }
            }
        };
        let Some(pending) = self.pending.get_mut(&request_id) else {
            log::warn!("Dropping stray signer response for unknown request {request_id}");
            return None;
        };
        match std::mem::replace(&mut pending.stage, Stage::Completing) {
            Stage::AwaitingSigner { signature, .. } => Some((request_id, signature)),
            other => {
                pending.stage = other;
                log::warn!("Dropping signer response for request {request_id}: not awaiting one");
                None
            }
        }
    }

    fn complete(&mut self, message: SignerMessage) {
        let Some((request_id, signature)) = self.claim(&message) else {
            return;
        };

        match message {
            SignerMessage::CertAndSignResponse(response) => self.spawn_job(
                move || {
                    let certificate = response.certificate_der()?;
                    let raw = response.decode_signature()?;
                    signature
                        .complete(&certificate, &raw)
                        .map_err(signer_certificate_fault)
                },
                move |result| JobOutcome::Completed { request_id, result },
            ),
            SignerMessage::SignError(error) => {
                self.finish(request_id, Err(SigningError::RemoteSignerRejected(error.message)));
            }
        }
    }

    fn finish(&mut self, request_id: RequestId, result: SigningResult<Vec<u8>>) {
        let Some(pending) = self.pending.remove(&request_id) else {
            log::debug!("Request {request_id} finished with no caller left");
            return;
        };
        let outcome = match &result {
            Ok(signed) => {
                log::info!("Request {request_id} completed ({} bytes)", signed.len());
                SessionPhase::Completed
            }
            Err(error) => {
                log::warn!("Request {request_id} failed: {error}");
                SessionPhase::Failed
            }
        };
        let _ = pending.reply.send(result);
        self.settle(outcome);
    }

    fn expire(&mut self, now: Instant) {
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline().is_some_and(|deadline| deadline <= now))
            .map(|(request_id, _)| request_id.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        for request_id in expired {
            if let Some(pending) = self.pending.remove(&request_id) {
                log::warn!(
                    "Request {request_id} timed out after {:?}",
                    self.config.signer_timeout
                );
                let _ = pending
                    .reply
                    .send(Err(SigningError::SignerTimeout(self.config.signer_timeout)));
            }
        }
        self.settle(SessionPhase::Failed);
    }
}

/// A certificate the remote signer sent is its fault, not ours.
fn signer_certificate_fault(error: SigningError) -> SigningError {
    match error {
        SigningError::CertificateError(message) => SigningError::ProtocolError(message),
        other => other,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pdf::SelectionRect;

    fn intent() -> SignIntent {
        SignIntent {
            pdf: b"%PDF-1.7\n%%EOF\n".to_vec(),
            placement: SignaturePlacement::new(0, SelectionRect::new(10.0, 10.0, 60.0, 40.0)),
            signer_name: None,
        }
    }

    #[tokio::test]
    async fn starts_idle_without_signer() {
        let handle = SigningCoordinator::spawn(SignWorkflow::default(), CoordinatorConfig::default());
        let state = handle.state().await.unwrap();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(!state.signer_connected);
        assert_eq!(state.in_flight, 0);
    }

    #[tokio::test]
    async fn sign_without_signer_is_unavailable() {
        let handle = SigningCoordinator::spawn(SignWorkflow::default(), CoordinatorConfig::default());
        let err = handle.sign(intent()).await.unwrap_err();
        assert!(matches!(err, SigningError::SignerUnavailable));
    }

    #[tokio::test]
    async fn unparsable_document_fails_before_dispatch() {
        let handle = SigningCoordinator::spawn(SignWorkflow::default(), CoordinatorConfig::default());
        let mut link = handle.connect_signer().await.unwrap();
        let err = handle.sign(intent()).await.unwrap_err();
        assert!(matches!(err, SigningError::PdfError(_)));
        assert!(link.requests.try_recv().is_err());
        assert_eq!(handle.state().await.unwrap().phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn stale_disconnect_is_ignored() {
        let handle = SigningCoordinator::spawn(SignWorkflow::default(), CoordinatorConfig::default());
        let first = handle.connect_signer().await.unwrap();
        let second = handle.connect_signer().await.unwrap();
        assert_ne!(first.id, second.id);

        handle.disconnect_signer(first.id).await.unwrap();
        assert!(handle.state().await.unwrap().signer_connected);

        handle.disconnect_signer(second.id).await.unwrap();
        assert!(!handle.state().await.unwrap().signer_connected);
    }
}
