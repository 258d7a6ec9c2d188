//! SQLite persistence for briefs, venues, zone mappings, schedule entries,
//! approval tokens, and follow-ups.

pub mod models;
mod schema;
mod store;

pub use models::*;
pub use store::{ApprovalFinalization, Database, MAX_ASSIGN_RETRIES};
