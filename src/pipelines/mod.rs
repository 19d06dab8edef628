//! Workflow pipelines orchestrating stateless services.

pub mod sign;
pub mod verify;

pub use sign::{PendingSignature, SignWorkflow};
pub use verify::VerifyWorkflow;
