//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl-C received → broadcast → health monitor and admin API exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
