//! JSON-RPC front end for the face embedding index.
//!
//! Speaks line-delimited JSON-RPC 2.0: one request object per input line,
//! one response object per output line. Logs never go to stdout.
//!
//! ```rust,no_run
//! use face_index_core::FaceIndex;
//! use face_index_rpc::IndexServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let index = FaceIndex::new(512)?;
//!     IndexServer::new(index).run_stdio().await
//! }
//! ```
//!
//! ## Methods
//!
//! - `add_vector` (`insert`) - Enroll an embedding under a profile id
//! - `search_similar` (`search`) - k nearest enrolled faces
//! - `check_duplicate` (`checkDuplicate`) - High-confidence duplicate test
//! - `remove_vector` (`remove`) - Drop a profile from the index
//! - `rebuild_from_database` (`rebuildAll`) - Replace the index wholesale
//! - `get_stats` (`stats`) - Count, dimension, thresholds
//! - `describe` - Method list with params schemas

mod error;
mod methods;
mod protocol;
mod server;
mod types;

pub use error::RpcError;
pub use methods::MethodExecutor;
pub use protocol::{RpcErrorBody, RpcRequest, RpcResponse, INTERNAL_ERROR, METHOD_NOT_FOUND, PARSE_ERROR};
pub use server::{IndexServer, Method};
pub use types::*;
