//! Cancellation scopes, loop contexts and completion signals.
//!
//! ## Contents
//! - [`Scope`] cancellation token with a recorded end reason
//! - [`Context`] abortable, counting handle for repeating work (plus frozen snapshots)
//! - [`Done`] / [`ResultFuture`] completion futures returned by the run helpers

mod context;
mod done;
mod scope;

pub use context::Context;
pub use done::{Done, DoneSignal, ResultFuture};
pub use scope::Scope;
