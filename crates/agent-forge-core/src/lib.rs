//! Core types, config, errors, and agent storage for Agent Forge.

pub mod agent_store;
pub mod config;
pub mod error;
pub mod types;
