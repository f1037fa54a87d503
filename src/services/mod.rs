// src/services/mod.rs

pub mod ai_ml;
pub mod processor;
pub mod scoring;
pub mod storage;
