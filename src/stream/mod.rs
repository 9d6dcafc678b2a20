//! Streams of ready paths
//!
//! A path owns at most one [`Stream`] at a time: it exists while the path is
//! ready and is closed as soon as the source goes away.
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so all readers share the same
//! memory allocation. The broadcast channel clones the [`Unit`], but the
//! inner `Bytes` data is only reference-counted, not copied.

pub mod description;
pub mod handle;

pub use description::{Media, MediaDescription, MediaKind};
pub use handle::{Stream, Unit};
