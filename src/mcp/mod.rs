//! MCP (Model Context Protocol) server side: JSON-RPC framing, method
//! routing, tool schemas and the static resources.

pub mod content;
pub mod handler;
pub mod jsonrpc;
pub mod resources;
pub mod schema;
pub mod warnings;

pub use content::{ErrorCode, StructuredError, ToolContent, ToolResult};
pub use handler::McpHandler;
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use warnings::ServerWarnings;
