// src/models/mod.rs
pub mod entity;
pub mod entry;
pub mod snapshot;
