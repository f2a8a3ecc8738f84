//! Core type definitions used across the ChatHub workspace.

pub mod id;

pub use id::*;
