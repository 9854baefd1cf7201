//! Binned piRNA expression tallies and end-offset correlation.
//!
//! This crate is the aggregation layer of pirt. It consumes already-decoded,
//! classified alignment records and produces:
//!
//! - per-genomic-bin tallies of read counts by length and input pool, with a
//!   duplication-robust "support" count of distinct 5′ ends ([`bins`],
//!   [`scan`]);
//! - distributions of 5′/3′ end offsets between a long and a short alignment
//!   pool ([`ends`]).
//!
//! Scanning runs one worker per input pool with no shared mutable state;
//! workers report private bin maps over a channel and the collector merges
//! them sequentially. The merge is associative and commutative, so results
//! do not depend on worker completion order.

pub mod bins;
pub mod ends;
pub mod errors;
pub mod scan;

// re-exports
pub use self::bins::{BinConfig, BinKey, BinKind, BinMap, BinRecord, POOLS};
pub use self::ends::{EndOffsetCorrelator, EndsConfig, LabeledOffsets, OffsetHistograms, SearchMode};
pub use self::errors::ScanError;
pub use self::scan::{scan_pools, ScanConfig};
