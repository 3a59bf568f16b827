//! # uazdash-client
//!
//! HTTP client for the UAZ REST backend and pairing QR rendering.

pub mod qr;
pub mod uaz;

pub use uaz::UazClient;
