//! Client-side replica fan-out for blob operations.
//!
//! Provides: the transport seam deployments implement, a coordinator that
//! drives one tracker per operation and feeds responses back into it, and a
//! chaos wrapper for fault-injection testing.

pub mod chaos;
pub mod coordinator;
pub mod transport;
