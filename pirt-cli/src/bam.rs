//! BAM decoding into engine alignment records.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use noodles::bam;
use noodles::bgzf;
use noodles::sam;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::RecordBuf;

use pirt_core::errors::InputError;
use pirt_core::models::{
    AlignmentRecord, CigarOp, CigarOpKind, ReferenceSequence, ReferenceTable, Strand,
    MAP_SCORE_UNAVAILABLE,
};

/// One opened BAM input.
pub struct BamSource {
    reader: bam::io::Reader<bgzf::Reader<File>>,
    header: sam::Header,
}

impl BamSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open BAM file: {}", path.display()))?;
        let mut reader = bam::io::reader::Builder::default().build_from_reader(file);
        let header = reader
            .read_header()
            .with_context(|| format!("failed to read BAM header: {}", path.display()))?;
        Ok(BamSource { reader, header })
    }

    /// Build the run's reference table from this input's header.
    pub fn reference_table(&self) -> Result<ReferenceTable> {
        let seqs = self
            .header
            .reference_sequences()
            .iter()
            .map(|(name, map)| ReferenceSequence {
                name: String::from_utf8_lossy(name.as_ref()).into_owned(),
                length: usize::from(map.length()) as u32,
            })
            .collect();
        ReferenceTable::new(seqs).context("invalid reference sequence table")
    }

    /// Check this input's reference names against an established table.
    pub fn verify_references(&self, refs: &ReferenceTable) -> Result<(), InputError> {
        let names: Vec<String> = self
            .header
            .reference_sequences()
            .keys()
            .map(|name| String::from_utf8_lossy(name.as_ref()).into_owned())
            .collect();
        refs.verify_names(names.iter().map(String::as_str))
    }

    /// Consume the source as a stream of decoded alignment records.
    ///
    /// Unmapped or unplaced records are dropped during decoding.
    pub fn records(self) -> impl Iterator<Item = Result<AlignmentRecord, InputError>> + Send {
        RecordIter {
            reader: self.reader,
            header: self.header,
            record: bam::Record::default(),
            done: false,
        }
    }
}

struct RecordIter {
    reader: bam::io::Reader<bgzf::Reader<File>>,
    header: sam::Header,
    record: bam::Record,
    done: bool,
}

impl Iterator for RecordIter {
    type Item = Result<AlignmentRecord, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => match decode(&self.header, &self.record) {
                    Ok(Some(rec)) => return Some(Ok(rec)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                Err(e) => {
                    self.done = true;
                    return Some(Err(InputError::Io(e)));
                }
            }
        }
    }
}

fn decode(header: &sam::Header, record: &bam::Record) -> Result<Option<AlignmentRecord>, InputError> {
    let buf = RecordBuf::try_from_alignment_record(header, record).map_err(InputError::Io)?;

    let flags = buf.flags();
    if flags.is_unmapped() {
        return Ok(None);
    }
    let (Some(ref_id), Some(start)) = (buf.reference_sequence_id(), buf.alignment_start()) else {
        return Ok(None);
    };

    let cigar = buf
        .cigar()
        .as_ref()
        .iter()
        .map(|op| CigarOp::new(cigar_kind(op.kind()), op.len() as u32))
        .collect();

    let edit_distance = buf
        .data()
        .get(&Tag::new(b'N', b'M'))
        .and_then(int_value)
        .and_then(|v| u32::try_from(v).ok());

    Ok(Some(AlignmentRecord {
        ref_id,
        // noodles positions are 1-based
        start: (usize::from(start) - 1) as u32,
        cigar,
        seq: buf.sequence().as_ref().to_vec(),
        qual: buf.quality_scores().as_ref().to_vec(),
        unmapped: false,
        strand: if flags.is_reverse_complemented() {
            Strand::Reverse
        } else {
            Strand::Forward
        },
        map_score: buf
            .mapping_quality()
            .map(|q| q.get())
            .unwrap_or(MAP_SCORE_UNAVAILABLE),
        edit_distance,
    }))
}

fn cigar_kind(kind: Kind) -> CigarOpKind {
    match kind {
        Kind::Match => CigarOpKind::Match,
        Kind::Insertion => CigarOpKind::Insertion,
        Kind::Deletion => CigarOpKind::Deletion,
        Kind::Skip => CigarOpKind::Skip,
        Kind::SoftClip => CigarOpKind::SoftClip,
        Kind::HardClip => CigarOpKind::HardClip,
        Kind::SequenceMatch => CigarOpKind::Equal,
        Kind::SequenceMismatch => CigarOpKind::Mismatch,
        Kind::Pad => CigarOpKind::Padding,
    }
}

fn int_value(value: &Value) -> Option<i64> {
    value.as_int()
}
