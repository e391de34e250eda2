//! Command implementations for the Switchyard CLI.

pub mod batch;
pub mod check;
pub mod complete;
pub mod routes;
