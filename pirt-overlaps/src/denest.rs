use fxhash::{FxHashMap, FxHashSet};
use rayon::prelude::*;
use std::ops::ControlFlow;

use pirt_core::models::{AlignmentRecord, Interval, Strand};

use crate::tree::{Adjust, IntervalIndex, QueryMode};

/// The identity of one alignment locus, used for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocusKey {
    pub ref_id: usize,
    pub start: u32,
    pub length: u32,
    pub strand: Strand,
}

impl LocusKey {
    pub fn end(&self) -> u32 {
        self.start + self.length
    }
}

impl From<&AlignmentRecord> for LocusKey {
    fn from(rec: &AlignmentRecord) -> Self {
        LocusKey {
            ref_id: rec.ref_id,
            start: rec.start,
            length: rec.len() as u32,
            strand: rec.strand,
        }
    }
}

/// One surviving alignment locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalLocus {
    pub ref_id: usize,
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
}

impl CanonicalLocus {
    /// The strand-signed 5′-end coordinate of this locus.
    pub fn signed_five_end(&self) -> i64 {
        match self.strand {
            Strand::Forward => i64::from(self.start),
            Strand::Reverse => -i64::from(self.end),
        }
    }
}

/// Deduplication and nested-alignment removal over a stream of alignment
/// loci.
///
/// Feed every locus through [`observe`](Denester::observe); the first
/// occurrence of each `(reference, start, length, strand)` key survives,
/// later duplicates are dropped. [`finish`](Denester::finish) then reports
/// the canonical loci: with denesting enabled these are the survivors not
/// fully encompassed by a strictly longer survivor on the same reference and
/// strand, otherwise all survivors. The result is sorted, so it depends only
/// on the set of observed loci, never on their order.
#[derive(Debug, Default)]
pub struct Denester {
    denest: bool,
    seen: FxHashSet<LocusKey>,
    trees: FxHashMap<(usize, Strand), IntervalIndex<u32, ()>>,
}

impl Denester {
    pub fn new(denest: bool) -> Self {
        Denester { denest, ..Denester::default() }
    }

    /// Record one locus; returns whether it is the first of its key.
    pub fn observe(&mut self, key: LocusKey) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        if self.denest {
            self.trees
                .entry((key.ref_id, key.strand))
                .or_default()
                .insert(
                    Interval { start: key.start, end: key.end(), val: () },
                    Adjust::Defer,
                );
        }
        true
    }

    /// Number of distinct loci observed so far.
    pub fn distinct(&self) -> usize {
        self.seen.len()
    }

    /// Resolve the canonical locus set, sorted by (reference, start, end,
    /// strand).
    pub fn finish(self) -> Vec<CanonicalLocus> {
        let mut out: Vec<CanonicalLocus> = if self.denest {
            // each (reference, strand) partition filters independently
            self.trees
                .into_par_iter()
                .flat_map_iter(|((ref_id, strand), mut tree)| {
                    tree.adjust_ranges();
                    let mut kept = Vec::new();
                    // queries on a freshly adjusted tree cannot fail
                    let _ = tree.visit(|entry| {
                        let iv = entry.interval;
                        if !tree.query_any(iv.start, iv.end, QueryMode::ProperContainment)? {
                            kept.push(CanonicalLocus {
                                ref_id,
                                start: iv.start,
                                end: iv.end,
                                strand,
                            });
                        }
                        Ok::<_, crate::tree::TreeError>(ControlFlow::Continue(()))
                    });
                    kept
                })
                .collect()
        } else {
            self.seen
                .into_iter()
                .map(|key| CanonicalLocus {
                    ref_id: key.ref_id,
                    start: key.start,
                    end: key.end(),
                    strand: key.strand,
                })
                .collect()
        };
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(ref_id: usize, start: u32, length: u32, strand: Strand) -> LocusKey {
        LocusKey { ref_id, start, length, strand }
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut d = Denester::new(false);
        assert!(d.observe(key(0, 100, 25, Strand::Forward)));
        assert!(!d.observe(key(0, 100, 25, Strand::Forward)));
        // different strand is a different locus
        assert!(d.observe(key(0, 100, 25, Strand::Reverse)));
        assert_eq!(d.distinct(), 2);

        let out = d.finish();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_containment_leaves_only_encompassing_read() {
        let mut d = Denester::new(true);
        d.observe(key(0, 100, 25, Strand::Forward));
        d.observe(key(0, 100, 25, Strand::Forward)); // duplicate
        d.observe(key(0, 90, 50, Strand::Forward)); // spans [90, 140)

        let out = d.finish();
        assert_eq!(
            out,
            vec![CanonicalLocus { ref_id: 0, start: 90, end: 140, strand: Strand::Forward }]
        );
    }

    #[test]
    fn test_identical_twins_survive_denesting() {
        // two identical loci collapse in dedup; the survivor has no strictly
        // longer container so it stays canonical
        let mut d = Denester::new(true);
        d.observe(key(0, 100, 25, Strand::Forward));
        d.observe(key(0, 100, 25, Strand::Forward));
        let out = d.finish();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_containment_respects_strand_partitions() {
        let mut d = Denester::new(true);
        d.observe(key(0, 100, 25, Strand::Forward));
        d.observe(key(0, 90, 50, Strand::Reverse)); // covers it, other strand

        let out = d.finish();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_shared_edge_still_nested() {
        let mut d = Denester::new(true);
        d.observe(key(0, 100, 25, Strand::Forward)); // [100, 125)
        d.observe(key(0, 100, 30, Strand::Forward)); // [100, 130), same start

        let out = d.finish();
        assert_eq!(
            out,
            vec![CanonicalLocus { ref_id: 0, start: 100, end: 130, strand: Strand::Forward }]
        );
    }

    #[test]
    fn test_canonical_set_is_order_independent() {
        let keys = [
            key(0, 100, 25, Strand::Forward),
            key(0, 90, 50, Strand::Forward),
            key(0, 300, 20, Strand::Forward),
            key(1, 100, 25, Strand::Forward),
            key(0, 95, 30, Strand::Forward),
            key(0, 100, 25, Strand::Reverse),
        ];
        let mut forward = Denester::new(true);
        for k in keys {
            forward.observe(k);
        }
        let mut backward = Denester::new(true);
        for k in keys.iter().rev() {
            backward.observe(*k);
        }
        assert_eq!(forward.finish(), backward.finish());
    }

    #[test]
    fn test_canonical_union_contained_is_full_set() {
        let keys = [
            key(0, 100, 25, Strand::Forward),
            key(0, 90, 50, Strand::Forward),
            key(0, 95, 30, Strand::Forward),
            key(0, 300, 20, Strand::Forward),
        ];
        let mut with = Denester::new(true);
        let mut without = Denester::new(false);
        for k in keys {
            with.observe(k);
            without.observe(k);
        }
        let canonical = with.finish();
        let full = without.finish();
        // every canonical locus is a member of the deduplicated set, and no
        // canonical locus is properly contained by a member of the full set
        for c in &canonical {
            assert!(full.contains(c));
            for f in &full {
                if f.ref_id == c.ref_id && f.strand == c.strand {
                    let covers = f.start <= c.start && f.end >= c.end;
                    let longer = (f.end - f.start) > (c.end - c.start);
                    assert!(!(covers && longer), "{c:?} nested under {f:?}");
                }
            }
        }
        // and everything non-canonical is contained by some member
        for f in &full {
            if !canonical.contains(f) {
                assert!(full.iter().any(|o| {
                    o.ref_id == f.ref_id
                        && o.strand == f.strand
                        && o.start <= f.start
                        && o.end >= f.end
                        && (o.end - o.start) > (f.end - f.start)
                }));
            }
        }
    }
}
