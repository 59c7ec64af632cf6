//! Conversation lifecycle, trust scoring, and access auditing for a
//! lost-and-found service.
//!
//! Item CRUD, identity, and presentation live elsewhere; this crate
//! owns the chat state machine (one conversation per item/reporter/
//! finder triple, ordered delivery, synthetic verification verdicts)
//! and the windowed aggregation of the access event log.

pub mod audit;
pub mod chat;
pub mod db;
pub mod models;
mod util;
