//! Annotation text reading (GFF-flavoured tab-delimited records).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;

use pirt_core::models::{AnnotationRecord, Strand};

/// Read annotation records from a tab-delimited file, gzip-compressed or
/// plain.
///
/// Structural problems (too few columns, unparseable coordinates) are fatal;
/// attribute-level problems are left for the class filter to count and skip.
pub fn read_annotations(path: &Path) -> Result<Vec<AnnotationRecord>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open annotation file: {}", path.display()))?;
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed reading {}", path.display()))?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.splitn(9, '\t').collect();
        if fields.len() < 8 {
            bail!(
                "{}:{}: found {} columns, expected at least 8",
                path.display(),
                lineno + 1,
                fields.len()
            );
        }
        let start: u32 = fields[3]
            .parse()
            .with_context(|| format!("{}:{}: bad start", path.display(), lineno + 1))?;
        let end: u32 = fields[4]
            .parse()
            .with_context(|| format!("{}:{}: bad end", path.display(), lineno + 1))?;
        let strand = match fields[6] {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            _ => None,
        };
        records.push(AnnotationRecord {
            seqname: fields[0].to_string(),
            // annotation coordinates are 1-based inclusive
            start: start.saturating_sub(1),
            end,
            strand,
            feature_type: fields[2].to_string(),
            attribute: fields.get(8).map(|s| s.trim().to_string()).unwrap_or_default(),
        });
    }
    Ok(records)
}
