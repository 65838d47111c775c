//! Model Context Protocol over stdio: line-delimited JSON-RPC 2.0.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
