//! Per-command SMB2 request and response shapes
//!
//! Each module holds the fixed wire layouts for one family of commands.
//! The catalog in [`crate::protocol::catalog`] dispatches to these.

pub mod common;
pub mod directory;
pub mod file_ops;
pub mod info;
pub mod ioctl;
pub mod lock;
pub mod misc;
pub mod negotiate;
pub mod session;
pub mod tree;
