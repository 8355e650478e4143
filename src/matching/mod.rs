// src/matching/mod.rs

pub mod cascade;
pub mod index;
pub mod merge;
pub mod normalize;
