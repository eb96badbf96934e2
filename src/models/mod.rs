// src/models/mod.rs
//! Data structures shared across the client.

pub mod credential;
pub mod document;
