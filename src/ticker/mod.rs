//! Count- and time-triggered batching.
//!
//! ## Contents
//! - [`TickerOption`] trigger thresholds
//! - [`Ticker`] fires on `max_count` or on a periodic tick past `min_count`/`min_delay`
//! - [`TickerExecutor`] buffers items and flushes them whenever its ticker fires

mod executor;
mod option;
#[allow(clippy::module_inception)]
mod ticker;

pub use executor::TickerExecutor;
pub use option::TickerOption;
pub use ticker::Ticker;
