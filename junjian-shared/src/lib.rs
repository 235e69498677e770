#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Wire models and configuration shared by the Junjian client crates.

pub mod config;
pub mod models;
