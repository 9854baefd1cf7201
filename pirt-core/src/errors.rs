use thiserror::Error;

/// Invalid threshold or flag combinations, rejected before any scan begins.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("mapping quality must be in [0, 254], got {0}")]
    MappingQualityOutOfRange(u16),

    #[error("minimum length {min} exceeds maximum length {max}")]
    InvertedLengthRange { min: usize, max: usize },

    #[error("annotation classes given without an annotation source")]
    ClassesWithoutAnnotation,

    #[error("bin length must be positive")]
    ZeroBinLength,

    #[error(
        "long range [{long_min}, {long_max}] and short range [{short_min}, {short_max}] must be disjoint"
    )]
    OverlappingPools {
        long_min: usize,
        long_max: usize,
        short_min: usize,
        short_max: usize,
    },

    #[error("duplicate reference sequence name: {0}")]
    DuplicateReference(String),

    #[error("expected {expected} input pools, got {got}")]
    PoolCount { expected: usize, got: usize },
}

/// A record stream could not be opened or decoded, or inputs disagree.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("reference name mismatch across inputs")]
    HeaderMismatch,

    #[error("alignment stream: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An annotation attribute field failed to parse as expected.
///
/// These are recoverable: loaders skip the offending record and surface a
/// per-run count of skipped records instead of aborting.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("attribute has {found} fields, expected at least 4: {attribute:?}")]
    TruncatedAttribute { found: usize, attribute: String },

    #[error("repeat coordinate does not parse as an integer: {0:?}")]
    BadRepeatCoordinate(String),
}
