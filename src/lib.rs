//! SAP OData MCP Library
//!
//! Model Context Protocol server for SAP OData services with dynamic
//! multi-service discovery: no compile-time schema knowledge required.

pub mod config;
pub mod mcp;
pub mod odata;

pub use config::{Config, RuntimeConfig};
pub use odata::{ODataClient, ODataError, QueryOptions, ServiceInfo};
