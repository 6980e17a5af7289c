//! MCP coordination: server registry, JSON-RPC protocol adapter, and the
//! tool cache / dispatch coordinator.

pub mod coordinator;
pub mod protocol;
pub mod registry;

pub use coordinator::McpCoordinator;
pub use protocol::McpClient;
pub use registry::{ServerAuth, ServerDefinition, ServerRegistry};
