use fxhash::FxHashMap;

use crate::errors::{ConfigError, InputError};

/// One reference sequence of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: u32,
}

/// The reference-sequence table of a run.
///
/// Built once from the first input's header and passed by reference to every
/// consumer; record `ref_id`s index into it. There is deliberately no global
/// registry.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    seqs: Vec<ReferenceSequence>,
    by_name: FxHashMap<String, usize>,
}

impl ReferenceTable {
    pub fn new(seqs: Vec<ReferenceSequence>) -> Result<Self, ConfigError> {
        let mut by_name = FxHashMap::default();
        for (i, seq) in seqs.iter().enumerate() {
            if by_name.insert(seq.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateReference(seq.name.clone()));
            }
        }
        Ok(ReferenceTable { seqs, by_name })
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn get(&self, ref_id: usize) -> Option<&ReferenceSequence> {
        self.seqs.get(ref_id)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceSequence> {
        self.seqs.iter()
    }

    /// Check another input's reference names against this table.
    ///
    /// Every input of a multi-file run must present the same reference
    /// sequences in the same order.
    pub fn verify_names<'a>(
        &self,
        names: impl ExactSizeIterator<Item = &'a str>,
    ) -> Result<(), InputError> {
        if names.len() != self.seqs.len() {
            return Err(InputError::HeaderMismatch);
        }
        for (seq, name) in self.seqs.iter().zip(names) {
            if seq.name != name {
                return Err(InputError::HeaderMismatch);
            }
        }
        Ok(())
    }
}
