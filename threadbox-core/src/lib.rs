//! ThreadBox core: a versioned virtual filesystem and tool dispatcher used
//! to sandbox AI agent artefacts.
//!
//! The storage engine ([`engine::Engine`]) owns an append-only inode graph
//! and version log behind a single SQLite connection ([`db::Database`]).
//! Virtual paths are normalised through [`path`] before ever reaching
//! storage. The [`dispatcher::Dispatcher`] maps named JSON tool calls onto
//! engine operations for a transport this crate does not implement.

pub mod archive;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ids;
pub mod path;

pub use config::DataPathConfig;
pub use dispatcher::{Dispatcher, ToolDefinition, ToolResult};
pub use engine::{DirectoryListing, Engine, FileVersion, NodeSummary, NodeType, VirtualEntry};
pub use error::{StorageError, StorageResult};
