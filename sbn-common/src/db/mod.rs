//! Database access

pub mod frequency_rules;
pub mod init;

pub use frequency_rules::*;
pub use init::*;
