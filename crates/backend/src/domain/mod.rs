//! Domain types - core scheduling entities
//!
//! This module contains the canonical types shared by the registry, the task
//! queue and the dispatch actor. They carry no behavior beyond identity,
//! ordering and equality, and are independent of persistence or scheduling
//! concerns.

pub mod config;
pub mod dependency;
pub mod file_path;
pub mod pch;
pub mod project_part;
pub mod sorted;
