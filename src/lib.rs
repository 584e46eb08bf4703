//! Gangway is a registry-driven dynamic reverse proxy.
//!
//! It exposes every application instance known to a registry under a
//! configurable path prefix (`/api/applications/{id}/...` by default),
//! strips the prefix, and forwards the request to the instance's backend
//! over a pooled HTTP client. The route table is an immutable snapshot
//! rebuilt on demand: topology-change notifications mark it stale and the
//! next lookup (or an eager policy) swaps in a fresh one.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Configuration loading and validation with SHA-256
//!   content versioning.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`admin`] -- `GET /admin/routes` read-only route table dump.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`registry`] -- The [`Registry`](registry::Registry) trait and its
//!   file-backed and in-memory implementations.
//! - [`route`] -- Route table snapshots, the registry-driven locator, and
//!   the refresh controller.
//! - [`proxy`] -- The request pipeline: decoration, header injection, and
//!   host forwarding.
//! - [`server`] -- Axum server setup, shared application state, HTTP client,
//!   and graceful shutdown.

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod admin;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod route;
pub mod server;
