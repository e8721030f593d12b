//! # Repository Module
//!
//! SQL access for the SQLite backend, kept apart from pool management.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Database (KeyValueStore impl)                                          │
//! │       │                                                                 │
//! │       │  db.kv().set("@GoMarketplace", "[...]")                         │
//! │       ▼                                                                 │
//! │  KvRepository                                                          │
//! │  ├── get(&self, key)                                                   │
//! │  ├── set(&self, key, value)      ← upsert                              │
//! │  └── remove(&self, key)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  kv_store table                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod kv;
