//! SMB2 protocol layer: constants, headers and the message catalog

pub mod catalog;
pub mod constants;
pub mod header;
pub mod messages;

pub use catalog::{parse_response, RequestBody, ResponseBody};
pub use constants::Smb2Command;
pub use header::Smb2Header;
