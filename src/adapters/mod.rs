//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                 Ports (Traits): GraphQlExecutor             │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                      NerdGraphClient                        │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use newrelic_exporter::adapters::{NerdGraphClient, NerdGraphConfig};
//! use newrelic_exporter::domain::GraphQlExecutor;
//!
//! let client = NerdGraphClient::new(NerdGraphConfig::new(api_key))?;
//! let data = client.execute(&query::entity_search(None)).await?;
//! ```

mod nerdgraph;

pub use nerdgraph::{classify_body, NerdGraphClient, NerdGraphConfig, DEFAULT_ENDPOINT};
