use std::sync::mpsc;
use std::thread;

use pirt_core::classify::{PiwiFilter, QualityThresholds, ReadGate};
use pirt_core::errors::{ConfigError, InputError};
use pirt_core::models::AlignmentRecord;
use pirt_overlaps::{ClassFilter, Denester, LocusKey};

use crate::bins::{BinConfig, BinMap, POOLS};
use crate::errors::ScanError;

/// Configuration of one binned-tally scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub thresholds: QualityThresholds,
    pub piwi: PiwiFilter,
    /// Minimum mapping score, in [0, 254].
    pub min_map_score: u8,
    pub bins: BinConfig,
    /// Count support from denested loci instead of raw 5′ ends.
    pub denest: bool,
}

impl ScanConfig {
    /// The mapping-score/length gate implied by this configuration.
    pub fn gate(&self) -> ReadGate {
        ReadGate {
            min_map_score: self.min_map_score,
            min_length: self.bins.min_length,
            max_length: self.bins.max_length,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bins.validate()?;
        self.gate().validate()
    }
}

/// Scan both input pools and merge their tallies.
///
/// Each pool is consumed by its own worker thread, scanning sequentially
/// with no shared mutable state and reporting its private [`BinMap`] (or
/// failure) over a channel. The collector merges results strictly
/// sequentially; because [`BinMap::merge`] is associative and commutative
/// the outcome does not depend on completion order. The first worker error
/// fails the run; remaining workers finish but their results are dropped.
pub fn scan_pools<I>(
    pools: [I; POOLS],
    cfg: &ScanConfig,
    filter: Option<&ClassFilter>,
) -> Result<BinMap, ScanError>
where
    I: Iterator<Item = Result<AlignmentRecord, InputError>> + Send,
{
    cfg.validate()?;
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for (pool, records) in pools.into_iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                // the receiver outlives every worker; send cannot fail
                let _ = tx.send(scan_pool(pool, records, cfg, filter));
            });
        }
        drop(tx);

        let mut merged = BinMap::new(cfg.bins);
        let mut first_err = None;
        for result in rx {
            match result {
                Ok(map) => merged = merged.merge(map),
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(_) => {}
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(merged),
        }
    })
}

/// Scan one pool into a private bin map.
fn scan_pool<I>(
    pool: usize,
    records: I,
    cfg: &ScanConfig,
    filter: Option<&ClassFilter>,
) -> Result<BinMap, ScanError>
where
    I: Iterator<Item = Result<AlignmentRecord, InputError>>,
{
    let gate = cfg.gate();
    let mut map = BinMap::new(cfg.bins);
    let mut denester = cfg.denest.then(|| Denester::new(true));

    for rec in records {
        let rec = rec?;
        if rec.unmapped {
            continue;
        }
        if !cfg.thresholds.passes(&rec) {
            continue;
        }
        map.add_total(pool);
        if !gate.accepts(&rec) {
            continue;
        }
        if !cfg.piwi.accepts(&rec) {
            continue;
        }
        if let Some(f) = filter {
            if !f.overlaps(rec.ref_id, rec.start, rec.end())? {
                continue;
            }
        }
        match &mut denester {
            Some(d) => {
                map.record(pool, rec.ref_id, rec.start, rec.len(), None);
                d.observe(LocusKey::from(&rec));
            }
            None => {
                map.record(pool, rec.ref_id, rec.start, rec.len(), Some(rec.signed_five_end()));
            }
        }
    }

    if let Some(d) = denester {
        for locus in d.finish() {
            map.add_support_checked(pool, locus.ref_id, locus.start, locus.signed_five_end())?;
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::BinKind;
    use pirt_core::classify::{PiwiClass, SoftClipPolicy};
    use pirt_core::models::{
        AnnotationRecord, CigarOp, CigarOpKind, ClassSet, ReferenceSequence, ReferenceTable,
        Strand,
    };
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    fn read(ref_id: usize, start: u32, seq: &[u8], strand: Strand) -> AlignmentRecord {
        AlignmentRecord {
            ref_id,
            start,
            cigar: vec![CigarOp::new(CigarOpKind::Match, seq.len() as u32)],
            seq: seq.to_vec(),
            qual: vec![40; seq.len()],
            unmapped: false,
            strand,
            map_score: 30,
            edit_distance: None,
        }
    }

    fn ok_stream(records: Vec<AlignmentRecord>) -> impl Iterator<Item = Result<AlignmentRecord, InputError>> + Send {
        records.into_iter().map(Ok)
    }

    #[fixture]
    fn refs() -> ReferenceTable {
        ReferenceTable::new(vec![ReferenceSequence { name: "chr1".to_string(), length: 4_000 }])
            .unwrap()
    }

    fn config(denest: bool) -> ScanConfig {
        ScanConfig {
            thresholds: QualityThresholds {
                min_identity_percent: 90,
                min_base_quality: 20,
                min_average_quality: 30.0,
                soft_clip: SoftClipPolicy::CountQuality,
            },
            piwi: PiwiFilter::default(),
            min_map_score: 0,
            bins: BinConfig { bin_length: 1_000, min_length: 20, max_length: 35 },
            denest,
        }
    }

    #[rstest]
    fn test_two_pool_scan_merges(refs: ReferenceTable) {
        let pool0 = vec![read(0, 100, &[b't'; 25], Strand::Forward)];
        let pool1 = vec![
            read(0, 100, &[b't'; 25], Strand::Forward),
            read(0, 1_500, &[b't'; 30], Strand::Reverse),
        ];
        let map = scan_pools([ok_stream(pool0), ok_stream(pool1)], &config(false), None).unwrap();
        assert_eq!(map.totals(), [1, 2]);

        let records = map.finalize(&refs).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].kind, BinKind::Delta);
        assert_eq!(records[0].counts[0][5], 1);
        assert_eq!(records[0].counts[1][5], 1);
        assert_eq!(records[0].support, [1, 1]);
        assert_eq!(records[1].counts[1][10], 1); // the 30-mer in bin 1
        assert_eq!(records[1].support, [0, 1]);
    }

    #[rstest]
    fn test_unmapped_and_failing_reads_do_not_count(refs: ReferenceTable) {
        let mut unmapped = read(0, 100, &[b't'; 25], Strand::Forward);
        unmapped.unmapped = true;
        let mut low_quality = read(0, 200, &[b't'; 25], Strand::Forward);
        low_quality.qual[3] = 2;
        let mut gated = read(0, 300, &[b't'; 25], Strand::Forward);
        gated.map_score = pirt_core::models::MAP_SCORE_UNAVAILABLE;

        let map = scan_pools(
            [ok_stream(vec![unmapped, low_quality]), ok_stream(vec![gated])],
            &config(false),
            None,
        )
        .unwrap();
        // the gated read still counts toward totals; the others never get
        // that far
        assert_eq!(map.totals(), [0, 1]);
        let records = map.finalize(&refs).unwrap();
        assert!(records.iter().all(|r| r.kind == BinKind::Missing));
    }

    #[rstest]
    fn test_piwi_filter_applies(refs: ReferenceTable) {
        let primary = read(0, 100, b"tgcatgcatgcatgcatgcatgcat", Strand::Forward);
        let other = read(0, 200, b"ggcatgcatgcatgcatgcatgcat", Strand::Forward);
        let mut cfg = config(false);
        cfg.piwi = PiwiFilter { class: PiwiClass::Primary, strict: false };

        let map = scan_pools([ok_stream(vec![primary, other]), ok_stream(vec![])], &cfg, None)
            .unwrap();
        assert_eq!(map.totals(), [2, 0]); // totals precede the filter
        let records = map.finalize(&refs).unwrap();
        assert_eq!(records[0].counts[0][5], 1); // only the primary read tallied
    }

    #[rstest]
    fn test_annotation_filter_applies(refs: ReferenceTable) {
        let inside = read(0, 1_050, &[b't'; 25], Strand::Forward);
        let outside = read(0, 3_000, &[b't'; 25], Strand::Forward);
        let filter = ClassFilter::build(
            vec![AnnotationRecord {
                seqname: "chr1".to_string(),
                start: 1_000,
                end: 1_200,
                strand: Some(Strand::Forward),
                feature_type: "repeat".to_string(),
                attribute: "L1Md_A LINE/L1 1 200".to_string(),
            }],
            &ClassSet::new(["repeat/LINE"]),
            &refs,
        );

        let map = scan_pools(
            [ok_stream(vec![inside, outside]), ok_stream(vec![])],
            &config(false),
            Some(&filter),
        )
        .unwrap();
        let records = map.finalize(&refs).unwrap();
        assert_eq!(records[1].counts[0][5], 1);
        assert_eq!(records[3].kind, BinKind::Missing); // bin 3 got nothing
    }

    #[rstest]
    fn test_denest_support_counts_canonical_loci(refs: ReferenceTable) {
        // two duplicates of a nested read plus its encompassing read: with
        // denesting the bin's support comes from the one canonical locus
        let nested = read(0, 100, &[b't'; 25], Strand::Forward);
        let pool0 = vec![
            nested.clone(),
            nested.clone(),
            read(0, 90, &[b't'; 35], Strand::Forward),
        ];
        let map = scan_pools([ok_stream(pool0), ok_stream(vec![])], &config(true), None).unwrap();
        let records = map.finalize(&refs).unwrap();
        assert_eq!(records[0].support, [1, 0]);
        // counts still see all three reads
        assert_eq!(records[0].counts[0][5], 2);
        assert_eq!(records[0].counts[0][15], 1);
    }

    #[rstest]
    fn test_without_denest_support_counts_distinct_five_ends(refs: ReferenceTable) {
        let nested = read(0, 100, &[b't'; 25], Strand::Forward);
        let pool0 = vec![
            nested.clone(),
            nested.clone(),
            read(0, 90, &[b't'; 35], Strand::Forward),
        ];
        let map = scan_pools([ok_stream(pool0), ok_stream(vec![])], &config(false), None).unwrap();
        let records = map.finalize(&refs).unwrap();
        // 5′ ends at 100 and 90: the nested read still contributes
        assert_eq!(records[0].support, [2, 0]);
    }

    #[test]
    fn test_input_error_fails_run() {
        let bad: Vec<Result<AlignmentRecord, InputError>> =
            vec![Err(InputError::Stream("truncated block".to_string()))];
        let good = vec![Ok(read(0, 100, &[b't'; 25], Strand::Forward))];
        let err = scan_pools(
            [bad.into_iter(), good.into_iter()],
            &config(false),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::Input(_)));
    }

    #[test]
    fn test_invalid_config_rejected_before_scanning() {
        let mut cfg = config(false);
        cfg.min_map_score = 255;
        let err = scan_pools(
            [ok_stream(vec![]), ok_stream(vec![])],
            &cfg,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }
}
