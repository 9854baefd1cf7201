//! Augmented interval indexing for pirt.
//!
//! This crate provides the interval machinery every pirt analysis shares:
//!
//! - [`IntervalIndex`]: a per-reference-sequence augmented interval tree
//!   supporting insertion, deletion, deferred augmentation rebuilds, and
//!   predicate queries. The same tree answers "does this read overlap this
//!   annotation" and "does a longer read properly contain this one" — only
//!   the query predicate differs ([`QueryMode`]).
//! - [`Denester`]: deduplication of alignment loci and removal of alignments
//!   fully encompassed by a longer alignment, used to approximate the set of
//!   distinct originating molecules.
//! - [`ClassFilter`]: per-reference overlap indexes over annotation features
//!   restricted to a selected set of classes.
//!
//! ## Quick Start
//!
//! ```rust
//! use pirt_core::models::Interval;
//! use pirt_overlaps::{Adjust, IntervalIndex, QueryMode};
//!
//! let mut index: IntervalIndex<u32, &str> = IntervalIndex::new();
//! index.insert(Interval { start: 100, end: 200, val: "a" }, Adjust::Immediate);
//! index.insert(Interval { start: 150, end: 300, val: "b" }, Adjust::Immediate);
//! index.insert(Interval { start: 400, end: 500, val: "c" }, Adjust::Immediate);
//!
//! let hits = index.query(180, 250, QueryMode::Overlap).unwrap();
//! assert_eq!(hits.len(), 2); // "a" and "b"
//! ```

pub mod denest;
pub mod filter;
pub mod tree;

// re-exports
pub use self::denest::{CanonicalLocus, Denester, LocusKey};
pub use self::filter::ClassFilter;
pub use self::tree::{Adjust, Entry, EntryId, IntervalIndex, QueryMode, TreeError};
