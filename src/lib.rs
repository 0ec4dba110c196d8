pub mod config;
pub mod debugger;
pub mod error;
pub mod executor;
pub mod parser;
pub mod state;

pub use config::SessionConfig;
pub use error::SessionError;
