//! Domain models for Canopy.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod binding;
pub mod permission;
pub mod resource;
pub mod role;
pub mod tenant;
pub mod user;
