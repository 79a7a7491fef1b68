//! CLI module for Field Ops
//!
//! Commands share one [`context::Context`]: configuration, the REST backend
//! and the engine services built on it.

pub mod account;
pub mod admin;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod findings;
pub mod output;
