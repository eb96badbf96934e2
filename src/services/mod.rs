// src/services/mod.rs
//! Business logic built on top of the device client.

pub mod filename;
pub mod upload_workflow;
