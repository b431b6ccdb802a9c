//! Entry points behind each CLI subcommand.

pub mod add;
pub mod init;
pub mod upgrade;
