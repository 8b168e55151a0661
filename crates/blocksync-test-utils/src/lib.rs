//! Shared test utilities for the blocksync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`environment`]: [`FakeEnvironment`], an in-memory external environment
//! - [`root`]: [`TestRoot`], a temporary output root with assertions

pub mod environment;
pub mod root;

pub use environment::{FakeEnvironment, FakeWrite, open_session};
pub use root::TestRoot;
