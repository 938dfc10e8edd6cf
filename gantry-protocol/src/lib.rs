//! JSON-RPC 2.0 and MCP wire types shared across the Gantry workspace
//!
//! The gateway speaks the Model Context Protocol on both sides: it terminates
//! client sessions and opens upstream sessions. Both directions share the
//! envelope and message types defined here.

pub mod jsonrpc;
pub mod messages;

pub use jsonrpc::{JsonRpcError, JsonRpcErrorCode, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
pub use messages::{
    InitializeResult, Prompt, PromptArgument, PromptMessage, PromptsGetResult, PromptsListResult,
    Resource, ResourceContent, ResourcesListResult, ResourcesReadResult, ServerCapabilities,
    ServerInfo, Tool, ToolContent, ToolsCallParams, ToolsCallResult, ToolsListResult,
    MCP_PROTOCOL_VERSION,
};
