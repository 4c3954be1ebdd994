//! Coordination store connecting the scoring master to its detached workers.
//!
//! The contract is deliberately small: one broadcast channel carrying a
//! [`Signal`], a handful of keys holding the current check timeout and the
//! serialized roster, and one result queue per team. All scheduling logic
//! stays on the master; this layer only moves bytes.
//!
//! [`CoordStore`] is the trait seam — the scheduler and worker are written
//! against it so they can run on an in-memory store in tests. The production
//! backend is Redis ([`RedisCoordStore`]).

pub mod error;
pub mod keys;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod redis_store;
pub mod signal;
pub mod store;

pub use error::CoordError;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryCoordStore;
pub use redis_store::RedisCoordStore;
pub use signal::Signal;
pub use store::{CoordStore, SignalSubscription};
