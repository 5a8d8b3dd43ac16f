//! API route modules.

pub mod artifacts;
pub mod session;
