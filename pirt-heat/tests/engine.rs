//! End-to-end engine tests: classification, annotation filtering, denesting,
//! binning and merging driven through the public API the way the CLI drives
//! it.

use pirt_core::classify::{PiwiClass, PiwiFilter, QualityThresholds, SoftClipPolicy};
use pirt_core::errors::InputError;
use pirt_core::models::{
    AlignmentRecord, AnnotationRecord, CigarOp, CigarOpKind, ClassSet, ReferenceSequence,
    ReferenceTable, Strand,
};
use pirt_heat::{scan_pools, BinConfig, BinKind, ScanConfig};
use pirt_overlaps::ClassFilter;
use pretty_assertions::assert_eq;

fn read(ref_id: usize, start: u32, len: usize, strand: Strand) -> AlignmentRecord {
    AlignmentRecord {
        ref_id,
        start,
        cigar: vec![CigarOp::new(CigarOpKind::Match, len as u32)],
        seq: vec![b't'; len],
        qual: vec![40; len],
        unmapped: false,
        strand,
        map_score: 30,
        edit_distance: None,
    }
}

fn stream(
    records: Vec<AlignmentRecord>,
) -> impl Iterator<Item = Result<AlignmentRecord, InputError>> + Send {
    records.into_iter().map(Ok)
}

fn config() -> ScanConfig {
    ScanConfig {
        thresholds: QualityThresholds {
            min_identity_percent: 90,
            min_base_quality: 20,
            min_average_quality: 30.0,
            soft_clip: SoftClipPolicy::CountQuality,
        },
        piwi: PiwiFilter { class: PiwiClass::All, strict: false },
        min_map_score: 0,
        bins: BinConfig { bin_length: 1_000, min_length: 20, max_length: 35 },
        denest: false,
    }
}

fn refs() -> ReferenceTable {
    ReferenceTable::new(vec![
        ReferenceSequence { name: "chr1".to_string(), length: 3_500 },
        ReferenceSequence { name: "chr2".to_string(), length: 1_200 },
    ])
    .unwrap()
}

#[test]
fn full_run_with_annotation_filter_and_denesting() {
    let refs = refs();

    // one selected LINE feature on chr1, one unselected SINE
    let filter = ClassFilter::build(
        vec![
            AnnotationRecord {
                seqname: "chr1".to_string(),
                start: 0,
                end: 1_200,
                strand: Some(Strand::Forward),
                feature_type: "repeat".to_string(),
                attribute: "L1Md_A LINE/L1 1 1200".to_string(),
            },
            AnnotationRecord {
                seqname: "chr1".to_string(),
                start: 2_000,
                end: 2_300,
                strand: Some(Strand::Forward),
                feature_type: "repeat".to_string(),
                attribute: "B1_Mus SINE/Alu 1 300".to_string(),
            },
        ],
        &ClassSet::new(["repeat/LINE"]),
        &refs,
    );

    let mut cfg = config();
    cfg.denest = true;

    // pool 0: a nested pair plus a duplicate inside the LINE, one read in
    // the unselected SINE (dropped)
    let pool0 = vec![
        read(0, 100, 25, Strand::Forward),
        read(0, 100, 25, Strand::Forward),
        read(0, 95, 35, Strand::Forward),
        read(0, 2_050, 25, Strand::Forward),
    ];
    // pool 1: a reverse-strand read in the LINE and one on chr2 (no
    // annotation there, dropped)
    let pool1 = vec![
        read(0, 400, 30, Strand::Reverse),
        read(1, 100, 25, Strand::Forward),
    ];

    let map = scan_pools([stream(pool0), stream(pool1)], &cfg, Some(&filter)).unwrap();
    assert_eq!(map.totals(), [4, 2]);

    let records = map.finalize(&refs).unwrap();
    // chr1 spans 4 bins, chr2 spans 2
    assert_eq!(records.len(), 6);

    let bin0 = &records[0];
    assert_eq!(bin0.kind, BinKind::Delta);
    assert_eq!(bin0.counts[0][5], 2); // the 25-mers
    assert_eq!(bin0.counts[0][15], 1); // the encompassing 35-mer
    assert_eq!(bin0.counts[1][10], 1); // pool 1's 30-mer
    // pool 0 support: only the canonical [95, 130) locus; pool 1: the
    // reverse read
    assert_eq!(bin0.support, [1, 1]);

    // the SINE read and the chr2 read were filtered, their bins are holes
    assert_eq!(records[2].kind, BinKind::Missing); // chr1 bin 2
    assert!(records[4..].iter().all(|r| r.kind == BinKind::Missing)); // chr2
}

#[test]
fn merge_of_disjoint_pools_equals_single_scan() {
    let refs = refs();
    let cfg = config();

    let all = vec![
        read(0, 100, 25, Strand::Forward),
        read(0, 1_100, 30, Strand::Reverse),
        read(1, 50, 22, Strand::Forward),
    ];

    // pool assignment does not change per-pool-0 results when pool 1 is
    // empty, regardless of which worker carried the reads
    let a = scan_pools([stream(all.clone()), stream(vec![])], &cfg, None).unwrap();
    let b = scan_pools([stream(vec![]), stream(all)], &cfg, None).unwrap();

    let a_records = a.finalize(&refs).unwrap();
    let b_records = b.finalize(&refs).unwrap();
    assert_eq!(a_records.len(), b_records.len());
    for (ra, rb) in a_records.iter().zip(&b_records) {
        // pool axes swap, bins and coverage agree
        assert_eq!(ra.chr, rb.chr);
        assert_eq!(ra.start, rb.start);
        assert_eq!(ra.kind, rb.kind);
        assert_eq!(ra.counts[0], rb.counts[1]);
        assert_eq!(ra.support[0], rb.support[1]);
    }
}

#[test]
fn json_output_shape() {
    let refs = ReferenceTable::new(vec![ReferenceSequence {
        name: "chr1".to_string(),
        length: 900,
    }])
    .unwrap();
    let cfg = config();
    let map = scan_pools(
        [stream(vec![read(0, 100, 25, Strand::Forward)]), stream(vec![])],
        &cfg,
        None,
    )
    .unwrap();
    let records = map.finalize(&refs).unwrap();
    let value = serde_json::to_value(&records).unwrap();

    let first = &value[0];
    assert_eq!(first["chr"], "chr1");
    assert_eq!(first["start"], 0);
    assert_eq!(first["end"], 900);
    assert_eq!(first["type"], "delta");
    assert_eq!(first["support"][0], 1);
    assert_eq!(first["counts"][0][5], 1);
    assert_eq!(first["counts"][1].as_array().unwrap().len(), 16);
}
