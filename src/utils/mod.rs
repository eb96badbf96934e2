// src/utils/mod.rs
//! Helper functions shared by the device client and the workflow.

pub mod crypto;
pub mod serialization;
