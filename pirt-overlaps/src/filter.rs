use pirt_core::models::{AnnotationRecord, ClassSet, Interval, ReferenceTable};

use crate::tree::{Adjust, IntervalIndex, QueryMode, TreeError};

/// A per-reference overlap index over annotation features restricted to a
/// selected set of classes.
///
/// Built once per run; a read is kept when its span overlaps at least one
/// selected feature on its reference sequence. Annotation records whose
/// attribute fails to parse are skipped and counted rather than aborting the
/// run; [`skipped`](ClassFilter::skipped) reports the count so callers can
/// surface it.
#[derive(Debug)]
pub struct ClassFilter {
    trees: Vec<IntervalIndex<u32, ()>>,
    selected: usize,
    skipped: u64,
}

impl ClassFilter {
    /// Index every record whose effective class is selected.
    ///
    /// Records on reference sequences absent from `refs` are ignored, as are
    /// records of unselected classes.
    pub fn build(
        records: impl IntoIterator<Item = AnnotationRecord>,
        classes: &ClassSet,
        refs: &ReferenceTable,
    ) -> Self {
        let mut trees: Vec<IntervalIndex<u32, ()>> =
            (0..refs.len()).map(|_| IntervalIndex::new()).collect();
        let mut selected = 0;
        let mut skipped = 0;

        for rec in records {
            let class = match rec.effective_class() {
                Ok(class) => class,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            if !classes.matches(&class) {
                continue;
            }
            let Some(ref_id) = refs.index_of(&rec.seqname) else {
                continue;
            };
            trees[ref_id].insert(
                Interval { start: rec.start, end: rec.end, val: () },
                Adjust::Defer,
            );
            selected += 1;
        }
        for tree in &mut trees {
            tree.adjust_ranges();
        }

        ClassFilter { trees, selected, skipped }
    }

    /// Number of features indexed.
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Number of records skipped for malformed attributes.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Whether `[start, end)` on `ref_id` overlaps any selected feature.
    pub fn overlaps(&self, ref_id: usize, start: u32, end: u32) -> Result<bool, TreeError> {
        match self.trees.get(ref_id) {
            Some(tree) => tree.query_any(start, end, QueryMode::Overlap),
            None => Ok(false),
        }
    }
}
