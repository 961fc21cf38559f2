//! Core library for GenStudio, a multi-provider generation backend.
//!
//! The modules map onto the request path:
//! - [`api`] exposes the HTTP routes served by the `genstudio` binary.
//! - [`dispatcher`] walks a provider fallback chain for each request.
//! - [`providers`] holds the upstream adapters and their static catalogue.
//! - [`records`] persists generation records in memory or SQLite.
//! - [`db`] initialises the SQLite database and applies migrations.
//! - [`media`] stores generated audio served under `/uploads`.
//! - [`logging`] reports dispatch events to logs and the event log table.
//! - [`errors`] keeps the central error catalogue with human friendly metadata.

pub mod api;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod errors;
pub mod logging;
pub mod media;
pub mod providers;
pub mod records;
pub mod voices;
