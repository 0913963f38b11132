//! Apiary Core
//!
//! Core library for a declarative hypervisor management tool: typed
//! resource records, diffing, and the apply engine.

pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod manifest;
pub mod plan;
pub mod provider;
pub mod resource;
