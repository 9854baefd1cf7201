use fxhash::FxHashSet;

use super::Strand;
use crate::errors::AnnotationError;

/// One annotation feature as handed over by a format-specific reader.
///
/// Coordinates are 0-based half-open. For repeat annotations the attribute
/// string's whitespace-delimited fields are
/// `[repeat name, repeat class/family, repeat start, repeat end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub seqname: String,
    pub start: u32,
    pub end: u32,
    pub strand: Option<Strand>,
    pub feature_type: String,
    pub attribute: String,
}

/// Parsed repeat attribute fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatAttributes {
    pub name: String,
    pub class_family: String,
    pub repeat_start: u32,
    pub repeat_end: u32,
}

impl RepeatAttributes {
    /// Parse the whitespace-delimited repeat attribute fields.
    pub fn parse(attribute: &str) -> Result<Self, AnnotationError> {
        let fields: Vec<&str> = attribute.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(AnnotationError::TruncatedAttribute {
                found: fields.len(),
                attribute: attribute.to_string(),
            });
        }
        let coord = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| AnnotationError::BadRepeatCoordinate(s.to_string()))
        };
        Ok(RepeatAttributes {
            name: fields[0].to_string(),
            class_family: fields[1].to_string(),
            repeat_start: coord(fields[2])?,
            repeat_end: coord(fields[3])?,
        })
    }
}

impl AnnotationRecord {
    /// The class string this feature is filtered under.
    ///
    /// Repeat features carry their class/family in the attribute, giving
    /// `type/class/family`; features without an attribute are classed by their
    /// bare feature type.
    pub fn effective_class(&self) -> Result<String, AnnotationError> {
        if self.attribute.is_empty() {
            return Ok(self.feature_type.clone());
        }
        let att = RepeatAttributes::parse(&self.attribute)?;
        Ok(format!("{}/{}", self.feature_type, att.class_family))
    }
}

/// The set of annotation classes selected for an analysis.
#[derive(Debug, Clone, Default)]
pub struct ClassSet {
    classes: FxHashSet<String>,
}

impl ClassSet {
    pub fn new<S: Into<String>>(classes: impl IntoIterator<Item = S>) -> Self {
        ClassSet {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether `class` is selected.
    ///
    /// Exact membership first; failing that, a `type/class/family` string is
    /// retried at the `type/class` level, so selecting a repeat class selects
    /// all of its families.
    pub fn matches(&self, class: &str) -> bool {
        if self.classes.contains(class) {
            return true;
        }
        let Some(last) = class.rfind('/') else {
            return false;
        };
        if class.find('/') == Some(last) {
            // only one separator: no family level to strip
            return false;
        }
        self.classes.contains(&class[..last])
    }
}
