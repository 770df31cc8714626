//! ARA core library.
//!
//! This library matches test step errors to known problems through problem
//! patterns, and migrates legacy scenarios and their execution history into
//! versioned scenarios.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
