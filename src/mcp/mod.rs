//! MCP Server implementation for SAP OData
//!
//! Exposes tools for discovering, querying, and mutating SAP data

pub mod protocol;
mod server;

pub use protocol::*;
pub use server::SapMcpServer;
