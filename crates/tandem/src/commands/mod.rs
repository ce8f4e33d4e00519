//! Command implementations that are more than a scheduler call.

pub mod init;
