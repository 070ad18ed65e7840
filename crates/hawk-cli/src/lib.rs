//! # hawkctl
//!
//! Operator tooling around the repository's permission policies: list the
//! effective table, check a hypothetical caller against one operation, and
//! print the validated configuration.

#![forbid(unsafe_code)]

pub mod commands;
