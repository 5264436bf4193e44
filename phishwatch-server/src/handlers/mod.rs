//! HTTP handlers

pub mod alerts;
pub mod domains;
pub mod health;
pub mod monitor;
pub mod records;
