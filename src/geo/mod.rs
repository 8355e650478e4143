// src/geo/mod.rs

pub mod license;
pub mod polygon;
pub mod projection;
