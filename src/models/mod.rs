// src/models/mod.rs

pub mod attempt;
pub mod question_bank;
pub mod snapshot;
