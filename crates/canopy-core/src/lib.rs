//! Canopy Core: domain models, error taxonomy and repository traits
//! shared by every Canopy crate.

pub mod error;
pub mod models;
pub mod repository;
