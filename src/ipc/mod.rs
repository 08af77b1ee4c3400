//! IPC endpoint: Unix-domain request/response socket.

pub mod protocol;
pub mod server;

pub use server::IpcServer;
