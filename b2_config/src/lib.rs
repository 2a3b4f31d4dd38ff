mod b2_config;
pub mod groups;
pub mod macros;
mod parse;

pub use parse::ParsableConfigValue;

pub use crate::b2_config::{b2_config, B2Config};

pub type ClientConfig = groups::client::ConfigValues;
pub type TransferConfig = groups::transfer::ConfigValues;
