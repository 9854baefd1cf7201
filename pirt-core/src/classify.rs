//! Sequence quality/identity classification and piRNA 5′-signature tests.
//!
//! Every alignment entering an analysis is first screened here: a per-base
//! and aggregate quality/identity check ([`QualityThresholds::passes`]), a
//! mapping-score and read-length gate ([`ReadGate`]), and an optional
//! primary/secondary piRNA signature filter ([`PiwiFilter`]). All functions
//! are total: malformed or short records classify as `false`, they never
//! error.

use crate::errors::ConfigError;
use crate::models::{AlignmentRecord, Strand, MAP_SCORE_UNAVAILABLE};

/// Whether soft-clipped bases contribute to the running quality sum.
///
/// Source pipelines disagree on this, so it is configuration rather than a
/// fixed choice. Soft-clipped bases always count toward consumed length and
/// always face the per-base minimum-quality rejection; they are never counted
/// as matched bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftClipPolicy {
    /// Soft-clipped base qualities are added to the quality sum.
    #[default]
    CountQuality,
    /// Soft-clipped bases contribute to neither the match count nor the
    /// quality sum.
    Ignore,
}

/// Thresholds for the quality/identity pass decision.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    /// Minimum percent identity over consumed bases.
    pub min_identity_percent: u32,
    /// Minimum per-base quality; one base below this fails the record.
    pub min_base_quality: u8,
    /// Minimum average per-base quality over consumed bases.
    pub min_average_quality: f64,
    pub soft_clip: SoftClipPolicy,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            min_identity_percent: 90,
            min_base_quality: 20,
            min_average_quality: 30.0,
            soft_clip: SoftClipPolicy::default(),
        }
    }
}

impl QualityThresholds {
    /// Decide whether a record passes the quality/identity screen.
    ///
    /// Walks the CIGAR in order; for every operation consuming read bases the
    /// corresponding quality values are checked against
    /// [`min_base_quality`](Self::min_base_quality) (any failure rejects the
    /// whole record), matched bases are counted and their qualities summed.
    /// The edit-distance attribute is subtracted from the matched count to
    /// approximate identity. A record whose quality array is shorter than its
    /// consumed length fails rather than panicking.
    pub fn passes(&self, rec: &AlignmentRecord) -> bool {
        let mut consumed = 0usize;
        let mut matched = 0i64;
        let mut quality_sum = 0i64;

        for op in &rec.cigar {
            if !op.kind.consumes_query() {
                continue;
            }
            let off = consumed;
            consumed += op.len as usize;
            let Some(quals) = rec.qual.get(off..consumed) else {
                return false;
            };
            for &q in quals {
                if q < self.min_base_quality {
                    return false;
                }
                if op.kind.is_match() {
                    matched += 1;
                    quality_sum += i64::from(q);
                } else if op.kind == crate::models::CigarOpKind::SoftClip
                    && self.soft_clip == SoftClipPolicy::CountQuality
                {
                    quality_sum += i64::from(q);
                }
            }
        }

        matched -= i64::from(rec.edit_distance.unwrap_or(0));

        matched * 100 >= i64::from(self.min_identity_percent) * consumed as i64
            && quality_sum as f64 >= self.min_average_quality * consumed as f64
    }
}

/// Primary piRNA signature: the 5′-most base is a U (sequenced as `t` on the
/// forward strand, `a` on the reverse strand). Case-insensitive.
pub fn is_primary(rec: &AlignmentRecord) -> bool {
    match rec.strand {
        Strand::Forward => rec.seq.first().is_some_and(|b| b.eq_ignore_ascii_case(&b't')),
        Strand::Reverse => rec.seq.last().is_some_and(|b| b.eq_ignore_ascii_case(&b'a')),
    }
}

/// Secondary piRNA signature: an A at the 10th base from the 5′ end
/// (sequenced as `a` on the forward strand, `t` on the reverse strand).
/// Records shorter than 10 bases are never secondary.
pub fn is_secondary(rec: &AlignmentRecord) -> bool {
    let n = rec.seq.len();
    if n < 10 {
        return false;
    }
    match rec.strand {
        Strand::Forward => rec.seq[9].eq_ignore_ascii_case(&b'a'),
        Strand::Reverse => rec.seq[n - 10].eq_ignore_ascii_case(&b't'),
    }
}

/// Which piRNA signature class an analysis is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PiwiClass {
    #[default]
    All,
    Primary,
    Secondary,
}

/// The piRNA-type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PiwiFilter {
    pub class: PiwiClass,
    /// Reject reads that also carry the complementary signature.
    pub strict: bool,
}

impl PiwiFilter {
    pub fn accepts(&self, rec: &AlignmentRecord) -> bool {
        match self.class {
            PiwiClass::All => true,
            PiwiClass::Primary => {
                is_primary(rec) && !(self.strict && is_secondary(rec))
            }
            PiwiClass::Secondary => {
                is_secondary(rec) && !(self.strict && is_primary(rec))
            }
        }
    }
}

/// Mapping-score and read-length gate applied after the quality screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadGate {
    /// Minimum mapping score, in [0, 254].
    pub min_map_score: u8,
    /// Inclusive read-length range.
    pub min_length: usize,
    pub max_length: usize,
}

impl ReadGate {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_map_score == MAP_SCORE_UNAVAILABLE {
            return Err(ConfigError::MappingQualityOutOfRange(u16::from(
                self.min_map_score,
            )));
        }
        if self.min_length > self.max_length {
            return Err(ConfigError::InvertedLengthRange {
                min: self.min_length,
                max: self.max_length,
            });
        }
        Ok(())
    }

    pub fn accepts(&self, rec: &AlignmentRecord) -> bool {
        rec.map_score >= self.min_map_score
            && rec.map_score != MAP_SCORE_UNAVAILABLE
            && (self.min_length..=self.max_length).contains(&rec.len())
    }
}

/// Ephemeral classification of one alignment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub pass: bool,
    pub length: usize,
    pub strand: Strand,
    pub primary: bool,
    pub secondary: bool,
}

/// Classify one record against a set of thresholds.
pub fn classify(rec: &AlignmentRecord, thresholds: &QualityThresholds) -> Classification {
    Classification {
        pass: thresholds.passes(rec),
        length: rec.len(),
        strand: rec.strand,
        primary: is_primary(rec),
        secondary: is_secondary(rec),
    }
}
