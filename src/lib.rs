//! aimeta: preference-driven LM Studio helpers and image sidecar metadata.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod llm;
pub mod logging;
pub mod prefs;
pub mod scanner;
pub mod sidecar;
