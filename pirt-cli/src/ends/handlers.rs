use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::ArgMatches;

use pirt_core::classify::{PiwiFilter, QualityThresholds, SoftClipPolicy};
use pirt_heat::ends::write_offsets_csv;
use pirt_heat::{EndOffsetCorrelator, EndsConfig, LabeledOffsets, SearchMode};

use crate::bam::BamSource;
use crate::heat::handlers::parse_piwi_class;
use crate::output::{basename, decorated_path, record_spinner, with_progress};

fn parse_pair(spec: &str) -> Result<(PathBuf, PathBuf)> {
    let parts: Vec<&str> = spec.split(',').collect();
    match parts.as_slice() {
        [single] if !single.is_empty() => Ok((PathBuf::from(single), PathBuf::from(single))),
        [long, short] if !long.is_empty() && !short.is_empty() => {
            Ok((PathBuf::from(long), PathBuf::from(short)))
        }
        _ => bail!("bad pair {spec:?}: expected \"long.bam,short.bam\" or a single file"),
    }
}

pub fn run_ends(matches: &ArgMatches) -> Result<()> {
    let out = matches.get_one::<String>("out").unwrap();
    let piwi_class = parse_piwi_class(matches.get_one::<String>("filter").unwrap())?;

    let cfg = EndsConfig {
        thresholds: QualityThresholds {
            min_identity_percent: *matches.get_one::<u32>("minid").unwrap(),
            min_base_quality: *matches.get_one::<u8>("minq").unwrap(),
            min_average_quality: *matches.get_one::<f64>("minavq").unwrap(),
            soft_clip: if matches.get_flag("ignore-clip-quality") {
                SoftClipPolicy::Ignore
            } else {
                SoftClipPolicy::CountQuality
            },
        },
        piwi: PiwiFilter { class: piwi_class, strict: matches.get_flag("strict") },
        min_map_score: *matches.get_one::<u8>("mapq").unwrap(),
        long_range: (
            *matches.get_one::<usize>("longmin").unwrap(),
            *matches.get_one::<usize>("longmax").unwrap(),
        ),
        short_range: (
            *matches.get_one::<usize>("shortmin").unwrap(),
            *matches.get_one::<usize>("shortmax").unwrap(),
        ),
        mode: if matches.get_flag("contain") {
            SearchMode::Containment
        } else {
            SearchMode::Overlap
        },
        denest: matches.get_flag("denest"),
        care: !matches.get_flag("careless"),
    };

    let mut sets = Vec::new();
    for spec in matches.get_many::<String>("pair").unwrap() {
        let (long, short) = parse_pair(spec)?;

        let long_source = BamSource::open(&long)?;
        let refs = long_source.reference_table()?;
        let short_source = BamSource::open(&short)?;
        short_source
            .verify_references(&refs)
            .with_context(|| format!("{} and {}", long.display(), short.display()))?;

        let spinner = record_spinner(&format!("indexing {}", basename(&long)));
        let correlator =
            EndOffsetCorrelator::build(cfg.clone(), with_progress(long_source.records(), spinner.clone()))?;
        spinner.finish_with_message(format!("indexed {} long loci", correlator.indexed()));

        let spinner = record_spinner(&format!("correlating {}", basename(&short)));
        let hist = correlator.correlate(with_progress(short_source.records(), spinner.clone()))?;
        spinner.finish_with_message(format!("correlated {}", basename(&short)));

        sets.push(LabeledOffsets { long: basename(&long), short: basename(&short), hist });
    }
    if sets.is_empty() {
        bail!("no data");
    }

    let out_path = decorated_path(out, piwi_class, "csv");
    let file = File::create(&out_path)
        .with_context(|| format!("failed to create {}", out_path.display()))?;
    write_offsets_csv(BufWriter::new(file), &sets)?;
    println!("wrote {}", out_path.display());

    Ok(())
}
