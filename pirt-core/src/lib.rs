//! Core data models and alignment classification for pirt.
//!
//! This crate holds the pieces every other pirt crate builds on:
//!
//! - **Models** ([`models`]): decoded alignment records, annotation features,
//!   generic half-open intervals, and the per-run reference-sequence table.
//! - **Classification** ([`classify`]): the sequence quality/identity
//!   classifier and the 5′-signature (primary/secondary) tests applied to
//!   every alignment before it is tallied.
//! - **Errors** ([`errors`]): configuration and annotation error types shared
//!   across the workspace.
//!
//! Decoding of on-disk formats does not live here — callers hand this crate
//! already-decoded [`models::AlignmentRecord`] and [`models::AnnotationRecord`]
//! values and consume plain Rust structures back.

pub mod classify;
pub mod errors;
pub mod models;
