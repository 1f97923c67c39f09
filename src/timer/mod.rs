//! Keyed delayed and cyclic timers.
//!
//! ## Contents
//! - [`TimerExecutor`] control loop over a hashed time wheel
//! - [`TimerBuilder`] optional drain handler and request capacity

mod executor;
mod wheel;

pub use executor::{TimerBuilder, TimerExecutor};
