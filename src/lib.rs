//! Cognitive orchestration core: a priority-gated LLM call queue, a unified
//! goal pipeline (store → poller/dispatcher → workflow engine), and the
//! autonomy/coherence/learning loop that keeps the system's own goal
//! generation in check.
//!
//! Layered as `domain` (models, ports, errors — no concrete adapter
//! dependencies) → `infrastructure` (adapters: SQLite, in-process KV/event
//! bus, HTTP and mock LLM providers, tool registry/sandbox) → `services`
//! (the components wired against those ports: C3-C11).

pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{CoreError, CoreResult};
