// src/device/mod.rs
//! Client side of the device's local HTTPS API.

pub mod client;
pub mod transport;

pub use client::{DeviceApi, DeviceClient, ProgressCallback};
