//! SMB2 wire-protocol client
//!
//! A safe, async implementation of the SMB2 binary wire protocol: message
//! framing, header construction, request/response correlation and
//! credit-based flow control over a raw TCP stream. High-level filesystem
//! operations are left to callers; this crate speaks the protocol.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub mod e2e_tests;

pub use client::{ClientConfig, SmbClient};
pub use error::{Error, NtStatus, Result};
