#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for corpus-harvest
//!
//! This library builds a curated corpus of source repositories for one language
//! ecosystem. It discovers candidate repositories through the GitHub REST API, scores
//! and filters them against quality criteria, and acquires their contents with
//! concurrent, rate-limited shallow `git` clones.
//!
//! # Module Organization
//!
//! - [`harvest`]: Rate limiting, discovery, scoring, cloning, and persistence
//! - [`commands`]: Command-line interface and orchestration

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod harvest;

pub use crate::commands::{Host, run};
