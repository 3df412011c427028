// src/ingest/providers/mod.rs
pub mod newsnow;

pub use newsnow::NewsNowProvider;
