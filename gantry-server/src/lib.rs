//! The Gantry gateway server
//!
//! Presents a fleet of upstream MCP servers as a single virtual MCP server:
//! JSON-RPC front end, tool/resource/prompt aggregation with `__`
//! namespacing, broadcast fan-out, OAuth2 bearer enforcement with discovery
//! metadata, policy gating, and audit logging.

pub mod aggregator;
pub mod app;
pub mod discovery;
pub mod error;
pub mod rest;
pub mod rpc;
pub mod state;

pub use app::{router, serve};
pub use error::{ApiError, RpcFailure};
pub use state::{AppState, ServerContext};
