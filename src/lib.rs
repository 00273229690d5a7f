//! entity-auditlog - Field-level audit trail for tracked records
//!
//! This library instruments create, update and delete mutations of tracked
//! records and produces an immutable, attributable audit trail: who changed
//! what, from where, and which fields moved from which value to which value.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `audit`: Registry, diff engine, context propagation and recorder
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `display`: Terminal formatting of audit records
//! - `cli`: Commands of the `auditlog` viewer binary
//!
//! # Example
//!
//! ```rust,ignore
//! use auditlog::config::{paths::AuditPaths, settings::Settings};
//!
//! let paths = AuditPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let sink = settings.build_sink(&paths)?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;

pub use error::{AuditError, AuditResult};
