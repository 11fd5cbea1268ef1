// src/quiz/mod.rs

pub mod attempts;
pub mod capture;
pub mod scoring;
pub mod selection;
