//! # uazdash-core
//!
//! Core types, traits, configuration, and error handling for the UAZ
//! operator console.

pub mod config;
pub mod delay;
pub mod error;
pub mod instance;
pub mod job;
pub mod message;
pub mod notify;
pub mod traits;
pub mod validate;

pub use config::shellexpand;
