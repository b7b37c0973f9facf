//! Infrastructure layer
//!
//! Contains adapters and implementations for the ports declared in
//! `domain::ports`:
//! - `database` — SQLite-backed goal store (C6) and workflow repository (C8)
//! - `kv` — in-process key/value store standing in for the external C1 collaborator
//! - `event_bus` — in-process broadcast bus standing in for the external C2 collaborator
//! - `llm` — HTTP and mock LLM providers (C3's transport dependency)
//! - `config` — hierarchical configuration loading
//! - `logging` — structured logging, rotation, secret scrubbing
//! - `tools` — in-process tool registry and sandbox runner (C5's collaborators)

pub mod config;
pub mod database;
pub mod event_bus;
pub mod kv;
pub mod llm;
pub mod logging;
pub mod tools;
