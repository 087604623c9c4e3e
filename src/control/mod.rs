//! Sampling control loop.
//!
//! This module contains:
//! - The poll/log/trigger loop and its batch restart logic
//! - The trigger policy evaluated on every sample
//! - A cancellation token for operator-initiated shutdown

pub mod cancel;
pub mod policy;
pub mod session;

pub use cancel::CancelToken;
pub use policy::TriggerPolicy;
pub use session::{
    run_session, ControlLoop, LoopConfig, LoopError, LoopOutcome, OPEN_FAILURE_ESCALATION,
};
