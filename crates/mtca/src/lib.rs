// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # MTCA - MTConnect Agent Core
//!
//! The data plane of an MTConnect agent: ingests SHDR (Simple Hierarchical
//! Data Representation) telemetry lines from shop-floor adapters, maintains a
//! bounded in-memory observation history with a globally monotonic sequence,
//! and assembles MTConnect XML response documents for `probe`, `current`,
//! `sample` and `asset` queries.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mtca::{Agent, AgentSettings};
//! use mtca::schema::DeviceSchema;
//!
//! # fn load_schema() -> DeviceSchema { unimplemented!() }
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut agent = Agent::new(AgentSettings::default());
//!     agent.register_device(load_schema())?;
//!
//!     // Adapter side: one SHDR line at a time
//!     agent.ingest_line("000", "2014-08-11T08:32:54.028533Z|avail|AVAILABLE");
//!
//!     // Client side: assemble a response document
//!     let doc = agent.current(Default::default()).unwrap_or_else(|e| agent.error_document(&e));
//!     println!("{}", doc.to_document_string()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                         Service Layer                              |
//! |        adapter TCP clients  ->  Agent  <-  HTTP handlers           |
//! +--------------------------------------------------------------------+
//! |                          Agent Facade                              |
//! |      ingest_line -> shdr parse -> store / asset routing            |
//! |      probe/current/sample/asset -> response assembly               |
//! +--------------------------------------------------------------------+
//! |                           Data Plane                               |
//! |  SchemaIndex | DataStore (ring + current/last) | AssetStore        |
//! +--------------------------------------------------------------------+
//! |                          Document Layer                            |
//! |        XmlElement tree  |  quick-xml serialization                 |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Agent`] | Owns the schema index and both stores, entry point for ingest and queries |
//! | [`schema::SchemaIndex`] | Read-mostly device/data-item registry |
//! | [`store::DataStore`] | Bounded circular observation buffer with monotonic sequencing |
//! | [`asset::AssetStore`] | Bounded asset buffer plus current-asset map |
//! | [`assembler::Assembler`] | Projects the stores into MTConnect document trees |
//!
//! ## Ordering Guarantees
//!
//! Sequence numbers are globally monotonic across all devices and data items.
//! Ingest is single-writer; a reader observing `lastSequence = L` sees every
//! observation with sequence `<= L` applied to the current-value maps and
//! condition lists.

/// Agent facade tying the schema index, data store and asset store together.
pub mod agent;
/// Response assembly: MTConnectDevices/Streams/Assets/Error document trees.
pub mod assembler;
/// Bounded asset buffer and current-asset map with SHDR asset command semantics.
pub mod asset;
/// MTConnect query error taxonomy (NO_DEVICE, OUT_OF_RANGE, ...).
pub mod error;
/// Device schema tree, schema index and the restricted XPath filter.
pub mod schema;
/// SHDR line parser (observations and asset commands).
pub mod shdr;
/// Circular sample buffer, current/last maps and condition lists.
pub mod store;
/// Owned XML document tree with quick-xml parse/serialize.
pub mod xml;

pub use agent::{Agent, AgentSettings, CurrentQuery, SampleQuery};
pub use error::QueryError;
pub use xml::XmlElement;
