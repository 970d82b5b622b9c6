#![forbid(unsafe_code)]

pub mod packager;
pub mod server;
pub mod staging;
pub mod tools;
pub mod wire;

pub use packager::{LibPackager, Packager};
pub use server::McpServer;
pub use tools::{Orchestrator, ToolResponse};
