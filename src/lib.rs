//! Companies House Retrieval Library
//!
//! Retrieves company records from the Companies House data API, flattens them into
//! relational tables and writes them to CSV. Used by the HTTP service and the
//! `ch-export` command-line tool.
//!
//! # Modules
//!
//! - `api`: API-layer namespace.
//! - `core`: Domain-layer namespace.
//! - `integrations`: External service namespace.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `extractors`: Pure mapping from raw payloads to records.
//! - `handlers`: HTTP request handlers.
//! - `links`: Relative link resolution.
//! - `models`: Record types and table layouts.
//! - `officer_id`: Officer identity and name parsing.
//! - `registry_client`: Companies House API client.
//! - `retrieval`: Per-company retrieval pipeline.
//! - `search`: Keyword search and batch runs.
//! - `sink`: Output tables (CSV and in-memory).

pub mod api;
pub mod core;
pub mod integrations;

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod links;
pub mod models;
pub mod officer_id;
pub mod registry_client;
pub mod retrieval;
pub mod search;
pub mod sink;
