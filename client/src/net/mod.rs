//! Networking modules for the report backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` is the raw HTTP seam, `client` layers bearer attachment,
//! single-flight refresh and the one-shot 401 retry on top of it.

pub mod client;
pub mod transport;

#[cfg(test)]
pub mod test_helpers;
