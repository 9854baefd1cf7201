pub mod alignment;
pub mod annotation;
pub mod interval;
pub mod reference;

// re-export for cleaner imports
pub use self::alignment::{AlignmentRecord, CigarOp, CigarOpKind, Strand, MAP_SCORE_UNAVAILABLE};
pub use self::annotation::{AnnotationRecord, ClassSet, RepeatAttributes};
pub use self::interval::Interval;
pub use self::reference::{ReferenceSequence, ReferenceTable};
