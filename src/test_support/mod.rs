//! Shared fixtures for unit tests

pub mod http;
pub mod memory;

pub use memory::{Call, MemoryStore, Op, TEST_BASE_URL};
