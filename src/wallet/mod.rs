// src/wallet/mod.rs
//! Key material: credential persistence and nonce signing.

pub mod credential_storage;
pub mod key_management;
