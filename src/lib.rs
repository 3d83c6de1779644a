pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod table;
pub mod workflow;
