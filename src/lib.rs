//! Music library consolidation engine.
//!
//! - [`model`] and [`matcher`]: entities and fuzzy identity
//! - [`collection`]: the deduplicated library
//! - [`library`]: catalog lookups behind a persistent cache
//! - [`storage`]: JSON documents and archives
//! - [`download`]: bounded-concurrency download pipeline
//! - [`providers`] and [`sync`]: getting data in and out

pub mod cli;
pub mod collection;
pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod library;
pub mod matcher;
pub mod metadata;
pub mod model;
pub mod providers;
pub mod storage;
pub mod sync;
#[cfg(test)]
pub mod test_utils;
