use std::io::{self, Write};

use fxhash::FxHashMap;

use pirt_core::classify::{PiwiFilter, QualityThresholds, ReadGate};
use pirt_core::errors::{ConfigError, InputError};
use pirt_core::models::{AlignmentRecord, Interval, Strand};
use pirt_overlaps::{Adjust, Denester, IntervalIndex, LocusKey, QueryMode};

use crate::errors::ScanError;

/// How short alignments are matched against the long-pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Any one-base overlap matches.
    Overlap,
    /// Only long alignments completely containing the short alignment match.
    Containment,
}

impl From<SearchMode> for QueryMode {
    fn from(mode: SearchMode) -> QueryMode {
        match mode {
            SearchMode::Overlap => QueryMode::Overlap,
            SearchMode::Containment => QueryMode::ProperContainment,
        }
    }
}

/// Configuration of one end-offset correlation.
#[derive(Debug, Clone)]
pub struct EndsConfig {
    pub thresholds: QualityThresholds,
    pub piwi: PiwiFilter,
    /// Minimum mapping score, in [0, 254].
    pub min_map_score: u8,
    /// Inclusive length range of the long pool.
    pub long_range: (usize, usize),
    /// Inclusive length range of the short pool; must not overlap the long
    /// range.
    pub short_range: (usize, usize),
    pub mode: SearchMode,
    /// Remove long alignments nested within another long alignment.
    pub denest: bool,
    /// Whether the short pool must also satisfy the piwi-type filter.
    pub care: bool,
}

impl EndsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.long_gate().validate()?;
        self.short_gate().validate()?;
        let (long_min, long_max) = self.long_range;
        let (short_min, short_max) = self.short_range;
        if long_min <= short_max && short_min <= long_max {
            return Err(ConfigError::OverlappingPools {
                long_min,
                long_max,
                short_min,
                short_max,
            });
        }
        Ok(())
    }

    /// The largest read length either pool can contain; biases histogram
    /// indices.
    pub fn max_length(&self) -> usize {
        self.long_range.1.max(self.short_range.1)
    }

    fn long_gate(&self) -> ReadGate {
        ReadGate {
            min_map_score: self.min_map_score,
            min_length: self.long_range.0,
            max_length: self.long_range.1,
        }
    }

    fn short_gate(&self) -> ReadGate {
        ReadGate {
            min_map_score: self.min_map_score,
            min_length: self.short_range.0,
            max_length: self.short_range.1,
        }
    }
}

/// Histograms of signed 5′ and 3′ end offsets.
///
/// Offsets are indexed at `offset + max_length`; both arrays span
/// `[-max_length, max_length)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetHistograms {
    max_length: usize,
    five_prime: Vec<u64>,
    three_prime: Vec<u64>,
}

impl OffsetHistograms {
    fn new(max_length: usize) -> Self {
        OffsetHistograms {
            max_length,
            five_prime: vec![0; 2 * max_length],
            three_prime: vec![0; 2 * max_length],
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn five_prime(&self) -> &[u64] {
        &self.five_prime
    }

    pub fn three_prime(&self) -> &[u64] {
        &self.three_prime
    }

    /// Count recorded at a signed 5′ offset.
    pub fn five_at(&self, offset: i64) -> u64 {
        self.five_prime[(offset + self.max_length as i64) as usize]
    }

    /// Count recorded at a signed 3′ offset.
    pub fn three_at(&self, offset: i64) -> u64 {
        self.three_prime[(offset + self.max_length as i64) as usize]
    }

    fn record(&mut self, five: i64, three: i64) {
        // both pools are length-gated, so any overlapping pair's offsets lie
        // strictly within (-max_length, max_length)
        let bias = self.max_length as i64;
        self.five_prime[(five + bias) as usize] += 1;
        self.three_prime[(three + bias) as usize] += 1;
    }
}

/// Signed end offsets of a matched (long, short) alignment pair.
///
/// Offsets are oriented by strand so a positive value always reads
/// "lengthened relative to the short alignment" at that end, and a negative
/// value "truncated".
fn end_offsets(
    long_start: u32,
    long_end: u32,
    short_start: u32,
    short_end: u32,
    strand: Strand,
) -> (i64, i64) {
    let (ls, le) = (i64::from(long_start), i64::from(long_end));
    let (ss, se) = (i64::from(short_start), i64::from(short_end));
    match strand {
        Strand::Forward => (ls - ss, le - se),
        Strand::Reverse => (se - le, ss - ls),
    }
}

/// Correlates the end positions of a short alignment pool against an index
/// of deduplicated (optionally denested) long alignments.
#[derive(Debug)]
pub struct EndOffsetCorrelator {
    cfg: EndsConfig,
    forest: FxHashMap<(usize, Strand), IntervalIndex<u32, ()>>,
}

impl EndOffsetCorrelator {
    /// Index the long pool.
    ///
    /// One instance of each unique long alignment locus is kept; with
    /// denesting enabled, loci fully encompassed by a strictly longer locus
    /// on the same reference and strand are dropped as well.
    pub fn build<I>(cfg: EndsConfig, long: I) -> Result<Self, ScanError>
    where
        I: Iterator<Item = Result<AlignmentRecord, InputError>>,
    {
        cfg.validate()?;
        let gate = cfg.long_gate();
        let mut denester = Denester::new(cfg.denest);
        for rec in long {
            let rec = rec?;
            if rec.unmapped {
                continue;
            }
            if !gate.accepts(&rec) {
                continue;
            }
            if !cfg.thresholds.passes(&rec) {
                continue;
            }
            if !cfg.piwi.accepts(&rec) {
                continue;
            }
            denester.observe(LocusKey::from(&rec));
        }

        let mut forest: FxHashMap<(usize, Strand), IntervalIndex<u32, ()>> =
            FxHashMap::default();
        for locus in denester.finish() {
            forest
                .entry((locus.ref_id, locus.strand))
                .or_default()
                .insert(Interval { start: locus.start, end: locus.end, val: () }, Adjust::Defer);
        }
        for tree in forest.values_mut() {
            tree.adjust_ranges();
        }

        Ok(EndOffsetCorrelator { cfg, forest })
    }

    /// Number of long loci indexed.
    pub fn indexed(&self) -> usize {
        self.forest.values().map(IntervalIndex::len).sum()
    }

    /// Scan the short pool and histogram the end offsets of every matched
    /// (long, short) pair.
    pub fn correlate<I>(&self, short: I) -> Result<OffsetHistograms, ScanError>
    where
        I: Iterator<Item = Result<AlignmentRecord, InputError>>,
    {
        let gate = self.cfg.short_gate();
        let mode = QueryMode::from(self.cfg.mode);
        let mut hist = OffsetHistograms::new(self.cfg.max_length());

        for rec in short {
            let rec = rec?;
            if rec.unmapped {
                continue;
            }
            if !gate.accepts(&rec) {
                continue;
            }
            if !self.cfg.thresholds.passes(&rec) {
                continue;
            }
            if self.cfg.care && !self.cfg.piwi.accepts(&rec) {
                continue;
            }
            let Some(tree) = self.forest.get(&(rec.ref_id, rec.strand)) else {
                continue;
            };
            for hit in tree.query(rec.start, rec.end(), mode)? {
                let (five, three) = end_offsets(
                    hit.interval.start,
                    hit.interval.end,
                    rec.start,
                    rec.end(),
                    rec.strand,
                );
                hist.record(five, three);
            }
        }

        Ok(hist)
    }
}

/// One correlated pair of inputs, labeled for serialization.
#[derive(Debug, Clone)]
pub struct LabeledOffsets {
    pub long: String,
    pub short: String,
    pub hist: OffsetHistograms,
}

/// Write the offset histograms of one or more correlated pairs as CSV.
///
/// The header row carries the unbiased offsets; each pair contributes one
/// `FivePrime` and one `ThreePrime` row.
pub fn write_offsets_csv<W: Write>(mut w: W, sets: &[LabeledOffsets]) -> io::Result<()> {
    let Some(first) = sets.first() else {
        return Ok(());
    };
    write!(w, "End,Long,Short")?;
    let bias = first.hist.max_length() as i64;
    for i in 0..first.hist.five_prime().len() as i64 {
        write!(w, ",{}", i - bias)?;
    }
    writeln!(w)?;

    for set in sets {
        write!(w, "FivePrime,{},{}", set.long, set.short)?;
        for v in set.hist.five_prime() {
            write!(w, ",{v}")?;
        }
        writeln!(w)?;
        write!(w, "ThreePrime,{},{}", set.long, set.short)?;
        for v in set.hist.three_prime() {
            write!(w, ",{v}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}
