//! # mountkit-common
//!
//! Shared error taxonomy, configuration model, and constants used across
//! the mountkit workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and carries the vocabulary the manager and the CLI share.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
