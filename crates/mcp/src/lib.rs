// MCP (Model Context Protocol) proxy that puts a content policy in front of
// a wrapped server's tools. Non-tool capabilities are relayed unmodified.

pub mod capabilities;
pub mod downstream;
pub mod error;
pub mod gateway;
pub mod peer;
pub mod protocol;
pub mod proxy;
pub mod relay;
pub mod server;
pub mod tools;

pub use capabilities::{negotiate, HandlerCategory, HandlerSet};
pub use downstream::{Downstream, DownstreamClient, SpawnSpec, StdioDownstream};
pub use error::{GuardPhase, McpError, McpResult};
pub use gateway::{GuardConfig, ToolGateway};
pub use proxy::Proxy;
pub use server::McpServer;
