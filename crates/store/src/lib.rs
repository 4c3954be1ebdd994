//! Relational store access for the scorebox scheduler.
//!
//! The scheduler needs exactly three operations from Postgres — load the
//! blue-team roster, load the monitored services, persist a tick's result
//! batch — plus a LISTEN/NOTIFY subscription that fires when administrators
//! edit teams or services mid-event. [`ScoreStore`] is the trait seam the
//! scheduler is written against; [`PgScoreStore`] is the production
//! implementation.

pub mod db;
pub mod error;
pub mod listen;
pub mod retry;
pub mod store;

pub use db::init_pg_pool;
pub use error::StoreError;
pub use listen::{ChangeSubscription, PgChangeListener, CONFIG_CHANNEL};
pub use retry::with_quadratic_retry;
pub use store::{PgScoreStore, ScoreStore};
