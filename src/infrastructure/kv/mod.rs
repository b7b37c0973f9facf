//! In-process `KvStore` adapter (spec §6.1). The real KV store is an
//! external collaborator (spec §1); this in-memory implementation backs a
//! single process and is deliberately simple — a `Mutex`-guarded map per
//! data type — satisfying the port's multi-key-transaction requirement
//! trivially (the whole store is serialized behind one lock, so
//! `transaction` needs no extra bookkeeping).

pub mod memory_store;

pub use memory_store::InMemoryKvStore;
