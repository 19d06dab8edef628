//! Remote signing: the key holder lives outside this process.
//!
//! The coordinator owns the session state machine, the protocol module
//! defines the JSON messages and the server module runs the WebSocket
//! sessions of the relay.

pub mod coordinator;
pub mod protocol;
pub mod server;

pub use coordinator::{
    CoordinatorConfig, CoordinatorHandle, CoordinatorState, SessionPhase, SignIntent, SignerLink,
    SigningCoordinator,
};
