/// Shared key-value store abstraction and its backends.
pub mod kv_store;
/// Distributed lock built on the key-value store.
pub mod lock;
/// Persisted records other than sessions.
pub mod models;
/// Prize pool persistence.
pub mod prize;
/// Generated question set persistence.
pub mod question;
/// Session persistence.
pub mod session;
/// Storage abstraction layer for database operations.
pub mod storage;
