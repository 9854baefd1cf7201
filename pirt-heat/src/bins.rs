use std::collections::hash_map::Entry;

use fxhash::{FxHashMap, FxHashSet};
use serde::Serialize;

use pirt_core::errors::ConfigError;
use pirt_core::models::ReferenceTable;

use crate::errors::ScanError;

/// Number of input pools per run.
pub const POOLS: usize = 2;

/// Identity of one genomic bin: a reference sequence and a bin index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinKey {
    pub ref_id: usize,
    pub bin: u32,
}

/// Binning parameters shared by every bin map of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinConfig {
    /// Bin width in bases.
    pub bin_length: u32,
    /// Inclusive read-length range; lengths index the per-bin histogram.
    pub min_length: usize,
    pub max_length: usize,
}

impl BinConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_length == 0 {
            return Err(ConfigError::ZeroBinLength);
        }
        if self.min_length > self.max_length {
            return Err(ConfigError::InvertedLengthRange {
                min: self.min_length,
                max: self.max_length,
            });
        }
        Ok(())
    }

    /// Number of length buckets in each bin's histogram.
    pub fn buckets(&self) -> usize {
        self.max_length - self.min_length + 1
    }

    /// The bin index covering a start coordinate.
    pub fn bin_of(&self, start: u32) -> u32 {
        start / self.bin_length
    }
}

/// The tally of one bin: a per-length, per-pool read count histogram and
/// per-pool sets of distinct strand-signed 5′-end coordinates.
#[derive(Debug, Clone)]
struct BinTally {
    counts: Vec<[u64; POOLS]>,
    support: [FxHashSet<i64>; POOLS],
}

impl BinTally {
    fn new(buckets: usize) -> Self {
        BinTally {
            counts: vec![[0; POOLS]; buckets],
            support: Default::default(),
        }
    }

    fn merge_from(&mut self, other: BinTally) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts) {
            for pool in 0..POOLS {
                mine[pool] += theirs[pool];
            }
        }
        for (mine, theirs) in self.support.iter_mut().zip(other.support) {
            mine.extend(theirs);
        }
    }
}

/// Per-bin tallies for one run (or one worker's private share of it).
///
/// Bins are created lazily by the first contributing alignment.
/// [`merge`](BinMap::merge) is associative and commutative:
/// counts and totals sum, support sets union, so the merged result is
/// independent of the order workers complete in.
#[derive(Debug, Clone)]
pub struct BinMap {
    cfg: BinConfig,
    bins: FxHashMap<BinKey, BinTally>,
    totals: [u64; POOLS],
}

impl BinMap {
    pub fn new(cfg: BinConfig) -> Self {
        BinMap { cfg, bins: FxHashMap::default(), totals: [0; POOLS] }
    }

    pub fn config(&self) -> &BinConfig {
        &self.cfg
    }

    /// Number of bins created so far.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Count one quality-passing read toward a pool's total.
    pub fn add_total(&mut self, pool: usize) {
        self.totals[pool] += 1;
    }

    /// Per-pool totals of quality-passing reads.
    pub fn totals(&self) -> [u64; POOLS] {
        self.totals
    }

    /// Tally one accepted alignment.
    ///
    /// `length` must already be gated into the configured length range.
    /// When `support` carries the strand-signed 5′-end coordinate it joins
    /// the bin's support set; scans that denest pass `None` here and add
    /// support in the fixup pass instead.
    pub fn record(&mut self, pool: usize, ref_id: usize, start: u32, length: usize, support: Option<i64>) {
        let key = BinKey { ref_id, bin: self.cfg.bin_of(start) };
        let buckets = self.cfg.buckets();
        let tally = self.bins.entry(key).or_insert_with(|| BinTally::new(buckets));
        tally.counts[length - self.cfg.min_length][pool] += 1;
        if let Some(coord) = support {
            tally.support[pool].insert(coord);
        }
    }

    /// Add a support coordinate to a bin the scan already created.
    ///
    /// The denesting fixup only revisits loci the main scan tallied, so a
    /// missing bin is an engine inconsistency, not bad data.
    pub fn add_support_checked(
        &mut self,
        pool: usize,
        ref_id: usize,
        start: u32,
        coord: i64,
    ) -> Result<(), ScanError> {
        let key = BinKey { ref_id, bin: self.cfg.bin_of(start) };
        match self.bins.get_mut(&key) {
            Some(tally) => {
                tally.support[pool].insert(coord);
                Ok(())
            }
            None => Err(ScanError::Inconsistency(format!(
                "denesting fixup touched bin {}:{} that the scan never created",
                ref_id, key.bin
            ))),
        }
    }

    /// Union another bin map into this one.
    pub fn merge(mut self, other: BinMap) -> BinMap {
        for (key, tally) in other.bins {
            match self.bins.entry(key) {
                Entry::Occupied(mut occupied) => occupied.get_mut().merge_from(tally),
                Entry::Vacant(vacant) => {
                    vacant.insert(tally);
                }
            }
        }
        for pool in 0..POOLS {
            self.totals[pool] += other.totals[pool];
        }
        self
    }

    /// Produce the run's output records, sorted by (reference, bin).
    ///
    /// Bins that received reads become `delta` records; every other bin
    /// across each reference sequence's full extent is materialized as an
    /// all-zero `missing` record, so consumers see spatially complete
    /// coverage.
    pub fn finalize(self, refs: &ReferenceTable) -> Result<Vec<BinRecord>, ScanError> {
        let BinMap { cfg, mut bins, .. } = self;
        let buckets = cfg.buckets();

        let mut keys: Vec<BinKey> = bins.keys().copied().collect();
        for (ref_id, seq) in refs.iter().enumerate() {
            let n_bins = seq.length.div_ceil(cfg.bin_length);
            for bin in 0..n_bins {
                let key = BinKey { ref_id, bin };
                if !bins.contains_key(&key) {
                    keys.push(key);
                }
            }
        }
        keys.sort_unstable();

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let seq = refs.get(key.ref_id).ok_or_else(|| {
                ScanError::Inconsistency(format!(
                    "bin references sequence {} outside the reference table",
                    key.ref_id
                ))
            })?;
            let start = key.bin * cfg.bin_length;
            let end = (u64::from(key.bin) + 1) * u64::from(cfg.bin_length);
            let end = end.min(u64::from(seq.length)) as u32;
            let record = match bins.remove(&key) {
                Some(tally) => {
                    let mut counts: [Vec<u64>; POOLS] =
                        [vec![0; buckets], vec![0; buckets]];
                    for (bucket, pools) in tally.counts.iter().enumerate() {
                        for pool in 0..POOLS {
                            counts[pool][bucket] = pools[pool];
                        }
                    }
                    BinRecord {
                        chr: seq.name.clone(),
                        start,
                        end,
                        kind: BinKind::Delta,
                        support: [tally.support[0].len(), tally.support[1].len()],
                        counts,
                    }
                }
                None => BinRecord {
                    chr: seq.name.clone(),
                    start,
                    end,
                    kind: BinKind::Missing,
                    counts: [vec![0; buckets], vec![0; buckets]],
                    support: [0; POOLS],
                },
            };
            out.push(record);
        }
        Ok(out)
    }
}

/// Classification of an output bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinKind {
    /// Received at least one read.
    Delta,
    /// Materialized by the fill pass with all-zero tallies.
    Missing,
}

/// One per-bin output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinRecord {
    pub chr: String,
    pub start: u32,
    pub end: u32,
    #[serde(rename = "type")]
    pub kind: BinKind,
    /// Read counts indexed `[pool][length - min_length]`.
    pub counts: [Vec<u64>; POOLS],
    /// Distinct 5′-end counts per pool.
    pub support: [usize; POOLS],
}

#[cfg(test)]
mod tests {
    use super::*;
    use pirt_core::models::ReferenceSequence;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    fn cfg() -> BinConfig {
        BinConfig { bin_length: 1_000, min_length: 20, max_length: 35 }
    }

    #[fixture]
    fn refs() -> ReferenceTable {
        ReferenceTable::new(vec![
            ReferenceSequence { name: "chr1".to_string(), length: 2_500 },
            ReferenceSequence { name: "chr2".to_string(), length: 1_000 },
        ])
        .unwrap()
    }

    #[test]
    fn test_bin_assignment() {
        let c = cfg();
        assert_eq!(c.bin_of(0), 0);
        assert_eq!(c.bin_of(999), 0);
        assert_eq!(c.bin_of(1_500), 1);
        assert_eq!(c.buckets(), 16);
    }

    #[test]
    fn test_validate() {
        assert!(cfg().validate().is_ok());
        let zero = BinConfig { bin_length: 0, ..cfg() };
        assert_eq!(zero.validate().unwrap_err(), ConfigError::ZeroBinLength);
        let inverted = BinConfig { min_length: 36, ..cfg() };
        assert_eq!(
            inverted.validate().unwrap_err(),
            ConfigError::InvertedLengthRange { min: 36, max: 35 }
        );
    }

    #[rstest]
    fn test_record_and_finalize(refs: ReferenceTable) {
        let mut map = BinMap::new(cfg());
        // alignment at start=1500, length 25 lands in bin 1 of chr1
        map.record(0, 0, 1_500, 25, Some(1_500));
        map.add_total(0);

        let records = map.finalize(&refs).unwrap();
        // chr1 spans 3 bins, chr2 spans 1
        assert_eq!(records.len(), 4);

        let hit = &records[1];
        assert_eq!(hit.chr, "chr1");
        assert_eq!(hit.start, 1_000);
        assert_eq!(hit.end, 2_000);
        assert_eq!(hit.kind, BinKind::Delta);
        assert_eq!(hit.counts[0][5], 1); // length 25 in bucket 25 - 20
        assert_eq!(hit.counts[1][5], 0);
        assert_eq!(hit.support, [1, 0]);

        // the final chr1 bin is clamped to the sequence length
        assert_eq!(records[2].start, 2_000);
        assert_eq!(records[2].end, 2_500);
        assert_eq!(records[2].kind, BinKind::Missing);

        assert_eq!(records[3].chr, "chr2");
        assert_eq!(records[3].kind, BinKind::Missing);
    }

    #[rstest]
    fn test_support_deduplicates_within_pool_only(refs: ReferenceTable) {
        let mut map = BinMap::new(cfg());
        map.record(0, 0, 100, 25, Some(100));
        map.record(0, 0, 100, 25, Some(100)); // same coordinate, no new support
        map.record(1, 0, 100, 25, Some(100)); // other pool keeps its own set
        map.record(0, 0, 120, 25, Some(-145)); // reverse-strand coordinate

        let records = map.finalize(&refs).unwrap();
        assert_eq!(records[0].support, [2, 1]);
        assert_eq!(records[0].counts[0][5], 3);
        assert_eq!(records[0].counts[1][5], 1);
    }

    #[test]
    fn test_support_fixup_requires_existing_bin() {
        let mut map = BinMap::new(cfg());
        map.record(0, 0, 100, 25, None);
        assert!(map.add_support_checked(0, 0, 150, 100).is_ok());
        let err = map.add_support_checked(0, 0, 5_000, 5_000).unwrap_err();
        assert!(matches!(err, ScanError::Inconsistency(_)));
    }

    fn sample_map(seed: &[(usize, usize, u32, i64)]) -> BinMap {
        let mut map = BinMap::new(cfg());
        for &(pool, ref_id, start, coord) in seed {
            map.record(pool, ref_id, start, 25, Some(coord));
            map.add_total(pool);
        }
        map
    }

    #[rstest]
    fn test_merge_commutative(refs: ReferenceTable) {
        let a = || sample_map(&[(0, 0, 100, 100), (0, 0, 1_200, 1_200)]);
        let b = || sample_map(&[(1, 0, 150, -175), (0, 1, 10, 10)]);
        let ab = a().merge(b()).finalize(&refs).unwrap();
        let ba = b().merge(a()).finalize(&refs).unwrap();
        assert_eq!(ab, ba);
    }

    #[rstest]
    fn test_merge_associative(refs: ReferenceTable) {
        let a = || sample_map(&[(0, 0, 100, 100)]);
        let b = || sample_map(&[(1, 0, 100, -125), (0, 0, 2_100, 2_100)]);
        let c = || sample_map(&[(1, 1, 10, 10), (0, 0, 100, 100)]);
        let left = a().merge(b()).merge(c()).finalize(&refs).unwrap();
        let right = a().merge(b().merge(c())).finalize(&refs).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_sums_totals() {
        let a = sample_map(&[(0, 0, 100, 100)]);
        let b = sample_map(&[(1, 0, 100, -125), (1, 0, 200, -225)]);
        assert_eq!(a.merge(b).totals(), [1, 2]);
    }

    #[rstest]
    fn test_merged_support_unions(refs: ReferenceTable) {
        let a = sample_map(&[(0, 0, 100, 100)]);
        let b = sample_map(&[(0, 0, 100, 100), (0, 0, 120, 120)]);
        let records = a.merge(b).finalize(&refs).unwrap();
        // coordinate 100 appears in both maps but counts once
        assert_eq!(records[0].support, [2, 0]);
    }
}
