//! OpenSearch implementation of the storage interfaces.
//!
//! This module provides `OpenSearchClient`, which implements every storage
//! interface against one OpenSearch cluster: it reads engine records from the
//! exporter's indices and owns the importer's document, cursor and metadata
//! indices.

mod admin;
mod client;
mod cursor_store;
pub mod index_config;
mod queries;
mod record_source;

pub use client::OpenSearchClient;
