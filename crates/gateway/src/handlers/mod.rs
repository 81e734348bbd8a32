//! HTTP handlers

pub mod documents;
pub mod health;
pub mod preview;
pub mod questions;
