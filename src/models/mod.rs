// src/models/mod.rs

pub mod document;
pub mod document_types;
pub mod user;
pub mod verification_log;
