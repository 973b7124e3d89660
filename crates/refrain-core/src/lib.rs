//! Core domain model for refrain.
//!
//! This crate defines the catalogue records (songs and their fingerprint
//! hashes), the [`FingerprintStore`] contract the engine writes to and
//! queries, and two stores implementing it: a SQLite-backed
//! [`schema::Database`] and an in-process [`MemoryStore`].

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod memory;
pub mod model;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use model::{Fingerprint, HashMatch, SongId, SongRecord};
pub use store::FingerprintStore;
