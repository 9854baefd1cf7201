use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use serde_json::json;

use pirt_core::classify::{PiwiClass, PiwiFilter, QualityThresholds, SoftClipPolicy};
use pirt_core::models::ClassSet;
use pirt_heat::{scan_pools, BinConfig, ScanConfig};
use pirt_overlaps::ClassFilter;

use crate::bam::BamSource;
use crate::gff;
use crate::output::{basename, decorated_path, record_spinner, with_progress};

pub fn parse_piwi_class(name: &str) -> Result<PiwiClass> {
    match name {
        "all" => Ok(PiwiClass::All),
        "primary" => Ok(PiwiClass::Primary),
        "secondary" => Ok(PiwiClass::Secondary),
        other => bail!("unknown piwi filter: {other} (expected all, primary or secondary)"),
    }
}

pub fn run_heat(matches: &ArgMatches) -> Result<()> {
    let pool_a = PathBuf::from(matches.get_one::<String>("POOL_A").unwrap());
    let pool_b = PathBuf::from(matches.get_one::<String>("POOL_B").unwrap());
    let out = matches.get_one::<String>("out").unwrap();

    let piwi_class = parse_piwi_class(matches.get_one::<String>("filter").unwrap())?;
    let classes: Vec<String> = matches
        .get_one::<String>("class")
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    let annot = matches.get_one::<String>("annot");
    if annot.is_some() != !classes.is_empty() {
        bail!("--annot and --class must be given together");
    }

    let bin_length = *matches.get_one::<u32>("bin").unwrap();
    let min_length = *matches.get_one::<usize>("min").unwrap();
    let max_length = *matches.get_one::<usize>("max").unwrap();
    let min_id = *matches.get_one::<u32>("minid").unwrap();
    let min_q = *matches.get_one::<u8>("minq").unwrap();
    let min_av_q = *matches.get_one::<f64>("minavq").unwrap();
    let map_q = *matches.get_one::<u8>("mapq").unwrap();

    let cfg = ScanConfig {
        thresholds: QualityThresholds {
            min_identity_percent: min_id,
            min_base_quality: min_q,
            min_average_quality: min_av_q,
            soft_clip: if matches.get_flag("ignore-clip-quality") {
                SoftClipPolicy::Ignore
            } else {
                SoftClipPolicy::CountQuality
            },
        },
        piwi: PiwiFilter { class: piwi_class, strict: matches.get_flag("strict") },
        min_map_score: map_q,
        bins: BinConfig { bin_length, min_length, max_length },
        denest: matches.get_flag("denest"),
    };

    let source_a = BamSource::open(&pool_a)?;
    let refs = source_a.reference_table()?;
    let source_b = BamSource::open(&pool_b)?;
    source_b
        .verify_references(&refs)
        .with_context(|| format!("{} and {}", pool_a.display(), pool_b.display()))?;

    let filter = match annot {
        Some(path) => {
            let records = gff::read_annotations(Path::new(path))?;
            let class_set = ClassSet::new(classes.iter().cloned());
            let filter = ClassFilter::build(records, &class_set, &refs);
            if filter.skipped() > 0 {
                eprintln!(
                    "skipped {} annotation records with malformed attributes",
                    filter.skipped()
                );
            }
            if filter.selected() == 0 {
                eprintln!("warning: no annotation features matched the selected classes");
            }
            Some(filter)
        }
        None => None,
    };

    let spinner = record_spinner("scanning alignments");
    let records_a = with_progress(source_a.records(), spinner.clone());
    let records_b = with_progress(source_b.records(), spinner.clone());
    let map = scan_pools([records_a, records_b], &cfg, filter.as_ref())?;
    let totals = map.totals();
    spinner.finish_with_message(format!(
        "scanned {} + {} quality-passing reads",
        totals[0], totals[1]
    ));

    let features = map.finalize(&refs)?;

    let document = json!({
        "pair": [basename(&pool_a), basename(&pool_b)],
        "bin": bin_length,
        "classes": classes,
        "filter": matches.get_one::<String>("filter").unwrap(),
        "min": min_length,
        "max": max_length,
        "min-qual": min_q,
        "min-av-qual": min_av_q,
        "min-id": min_id,
        "map-qual": map_q,
        "totals": totals,
        "features": features,
    });

    let out_path = decorated_path(out, piwi_class, "json");
    let file = File::create(&out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    let mut writer = BufWriter::new(file);
    if matches.get_flag("compact") {
        serde_json::to_writer(&mut writer, &document)?;
    } else {
        serde_json::to_writer_pretty(&mut writer, &document)?;
    }
    println!("wrote {}", out_path.display());

    Ok(())
}
