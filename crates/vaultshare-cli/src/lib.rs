//! # Vaultshare CLI
//!
//! Command-line caller for the Vaultshare client SDK.
//!
//! ```text
//! vaultshare --username alice --mfa-code 123456 upload report.pdf
//! vaultshare --username alice --mfa-code 123456 share 7 bob --permission DOWNLOAD --expires-in-hours 24
//! vaultshare --username bob --mfa-code 654321 download 7 --out report.pdf
//! ```
//!
//! Every command except `register` and `mfa-setup` logs in, verifies the MFA
//! code, runs, and logs out again.

pub mod commands;
pub mod config;

pub use commands::{Command, Runner};
pub use config::CliConfig;
