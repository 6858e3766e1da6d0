//! Core types for the stageweld library.
//!
//! This module contains the handoff channel every worker communicates
//! through, the run context carrying cancellation, and the shared traits.

pub mod channel;
pub mod context;
pub mod traits;

// Re-export core items
pub use channel::{channel, Delivery, Receiver, Sender};
pub use context::Context;
pub use traits::{Reporter, Signal};
pub use tokio_util::sync::CancellationToken;
