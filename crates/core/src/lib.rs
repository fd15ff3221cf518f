// Snapvault Core - Domain Logic & Ports
// NO infrastructure dependencies: wire clients, transfer and credentials come in as ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, ErrorKind, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
