//! Append-only stores for device updates
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio actors
//! - **Single writer**: Only the storage actor ever holds the backend
//!
//! ## Backends
//!
//! - **JSON lines** (default): One JSON object per line in a history file
//! - **In-Memory**: No persistence, for testing and dry runs
//!
//! ## Usage
//!
//! ```no_run
//! use smart_home_sim::storage::{StorageBackend, jsonl::JsonLinesBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = JsonLinesBackend::open("./history.log").await?;
//!     // Use with StorageActor
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod schema;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use schema::UpdateRecord;
