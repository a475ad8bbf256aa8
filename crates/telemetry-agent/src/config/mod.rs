pub mod cli;
pub mod connection;
pub mod daemon;

pub use cli::*;
pub use connection::*;
pub use daemon::*;
