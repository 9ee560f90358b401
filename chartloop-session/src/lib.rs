//! # chartloop-session
//!
//! Per-session storage for diagram generation runs.
//!
//! A session owns one directory. Everything written into it is either
//! append-only (`events.jsonl`, one complete JSON document per line, flushed
//! after every write) or replaced atomically (`session.json`, attempt files).
//! A process killed mid-run therefore leaves a directory that can still be
//! read back with [`read_events`] and inspected by hand.
//!
//! The crate is deliberately ignorant of diagrams: payloads are any
//! `serde::Serialize` value.

mod error;
mod event;
mod store;

pub use error::SessionError;
pub use event::{EVENT_SCHEMA_VERSION, EventRecord, read_events};
pub use store::{EVENTS_FILE, MANIFEST_FILE, SessionStore, new_session_id, publish_file};
