//! Deployed applications and their per-application upgrade plans.

pub mod application;
#[cfg(test)]
pub mod fixtures;
pub mod upgrade;

pub use application::Application;
pub use upgrade::Generation;
