//! Stream combinators: relay, fan-in and tee.
//!
//! Every combinator spawns its workers on the [`Context`](crate::core::Context)
//! it is given, observes the context's cancellation at each blocking point, and
//! closes its outputs by dropping their senders when its worker exits.

pub mod merge;
pub mod relay;
pub mod split;

pub use merge::merge;
pub use relay::relay;
pub use split::split;
