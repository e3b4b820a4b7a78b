#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod lora;
pub mod protocol;
pub mod tasks;
pub mod telemetry;
