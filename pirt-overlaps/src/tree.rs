use std::cmp::Ordering;
use std::ops::ControlFlow;

use num_traits::{PrimInt, Unsigned};
use thiserror::Error;

use pirt_core::models::Interval;

/// Identity assigned to a stored interval at insertion time.
///
/// Ids increase monotonically per tree and are never reused, so two stored
/// intervals with identical coordinates remain distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

/// Whether a mutation restores the augmentation invariant immediately or
/// leaves the tree provisionally inconsistent.
///
/// After any [`Adjust::Defer`] mutation, [`IntervalIndex::adjust_ranges`]
/// must run before the next query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjust {
    Immediate,
    Defer,
}

/// The query predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Half-open intersection by at least one base.
    Overlap,
    /// The stored interval covers all of the query and is strictly longer.
    ProperContainment,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("interval index queried between a deferred mutation and adjust_ranges")]
    Dirty,
}

/// One stored interval yielded by queries and traversal.
#[derive(Debug)]
pub struct Entry<'a, I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    pub id: EntryId,
    pub interval: &'a Interval<I, T>,
}

#[derive(Debug, Clone)]
struct Node<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    iv: Interval<I, T>,
    id: EntryId,
    prio: u64,
    /// Maximum end coordinate across this node's subtree. Only trusted while
    /// the tree is clean.
    max_end: I,
    left: Option<usize>,
    right: Option<usize>,
}

/// A per-reference-sequence augmented interval tree.
///
/// Nodes live in an arena and are linked by index; balance comes from treap
/// rotations with deterministic pseudo-random priorities, so the shape (and
/// every traversal order) is reproducible for a given insertion sequence.
/// Each node carries the maximum end coordinate of its subtree, letting
/// queries prune subtrees that end before the query starts.
///
/// Mutations inserted with [`Adjust::Defer`] skip augmentation maintenance;
/// the tree then refuses queries with [`TreeError::Dirty`] until
/// [`adjust_ranges`](IntervalIndex::adjust_ranges) rebuilds the augmentation
/// in one O(n) pass. Batch loads should defer every insert and adjust once.
#[derive(Debug, Clone)]
pub struct IntervalIndex<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    arena: Vec<Node<I, T>>,
    free: Vec<usize>,
    root: Option<usize>,
    next_id: u64,
    rng_state: u64,
    len: usize,
    dirty: bool,
}

impl<I, T> Default for IntervalIndex<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, T> IntervalIndex<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    pub fn new() -> Self {
        IntervalIndex {
            arena: Vec::new(),
            free: Vec::new(),
            root: None,
            next_id: 0,
            rng_state: 0x853c_49e6_748f_ea9b,
            len: 0,
            dirty: false,
        }
    }

    /// Number of stored intervals.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether a deferred mutation has left the augmentation unrestored.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Add an interval, returning its assigned identity.
    pub fn insert(&mut self, interval: Interval<I, T>, adjust: Adjust) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        let prio = self.next_priority();
        let max_end = interval.end;
        let node = Node { iv: interval, id, prio, max_end, left: None, right: None };
        let idx = match self.free.pop() {
            Some(i) => {
                self.arena[i] = node;
                i
            }
            None => {
                self.arena.push(node);
                self.arena.len() - 1
            }
        };
        let fix = matches!(adjust, Adjust::Immediate);
        if !fix {
            self.dirty = true;
        }
        let root = self.root;
        self.root = Some(self.insert_at(root, idx, fix));
        self.len += 1;
        id
    }

    /// Remove the interval with the given coordinates and identity.
    ///
    /// Returns whether a matching interval was found.
    pub fn delete(&mut self, start: I, end: I, id: EntryId, adjust: Adjust) -> bool {
        let fix = matches!(adjust, Adjust::Immediate);
        let root = self.root;
        let (new_root, removed) = self.delete_at(root, start, end, id, fix);
        self.root = new_root;
        if removed {
            self.len -= 1;
            if !fix {
                self.dirty = true;
            }
        }
        removed
    }

    /// Rebuild every augmentation value in one post-order pass and clear the
    /// dirty flag. Required after a deferred batch, before the next query.
    pub fn adjust_ranges(&mut self) {
        if let Some(root) = self.root {
            self.fix_subtree(root);
        }
        self.dirty = false;
    }

    /// Return every stored interval matching the query under `mode`.
    pub fn query(&self, start: I, end: I, mode: QueryMode) -> Result<Vec<Entry<'_, I, T>>, TreeError> {
        if self.dirty {
            return Err(TreeError::Dirty);
        }
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.collect_matches(root, start, end, mode, &mut out);
        }
        Ok(out)
    }

    /// Whether any stored interval matches the query under `mode`.
    ///
    /// Terminates on the first match; prefer this over
    /// [`query`](IntervalIndex::query) when only existence matters.
    pub fn query_any(&self, start: I, end: I, mode: QueryMode) -> Result<bool, TreeError> {
        if self.dirty {
            return Err(TreeError::Dirty);
        }
        Ok(match self.root {
            Some(root) => self.any_match(root, start, end, mode),
            None => false,
        })
    }

    /// In-order traversal.
    ///
    /// The visitor returns `Ok(ControlFlow::Break(()))` to stop early or an
    /// error to abort; the first error is surfaced to the caller. Traversal
    /// does not consult the augmentation, so it is permitted on a dirty tree.
    pub fn visit<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(Entry<'_, I, T>) -> Result<ControlFlow<()>, E>,
    {
        if let Some(root) = self.root {
            self.visit_at(root, &mut f)?;
        }
        Ok(())
    }

    fn next_priority(&mut self) -> u64 {
        // splitmix64 step; constant-seeded so tree shapes are reproducible
        self.rng_state = self.rng_state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.rng_state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn cmp_key(&self, n: usize, start: I, end: I, id: EntryId) -> Ordering {
        let node = &self.arena[n];
        node.iv
            .start
            .cmp(&start)
            .then_with(|| node.iv.end.cmp(&end))
            .then_with(|| node.id.cmp(&id))
    }

    fn node_cmp(&self, a: usize, b: usize) -> Ordering {
        let nb = &self.arena[b];
        self.cmp_key(a, nb.iv.start, nb.iv.end, nb.id)
    }

    fn update_max(&mut self, n: usize) {
        let mut m = self.arena[n].iv.end;
        if let Some(l) = self.arena[n].left {
            m = m.max(self.arena[l].max_end);
        }
        if let Some(r) = self.arena[n].right {
            m = m.max(self.arena[r].max_end);
        }
        self.arena[n].max_end = m;
    }

    fn rotate_right(&mut self, n: usize, l: usize, fix: bool) -> usize {
        self.arena[n].left = self.arena[l].right;
        self.arena[l].right = Some(n);
        if fix {
            self.update_max(n);
            self.update_max(l);
        }
        l
    }

    fn rotate_left(&mut self, n: usize, r: usize, fix: bool) -> usize {
        self.arena[n].right = self.arena[r].left;
        self.arena[r].left = Some(n);
        if fix {
            self.update_max(n);
            self.update_max(r);
        }
        r
    }

    fn insert_at(&mut self, node: Option<usize>, new: usize, fix: bool) -> usize {
        let Some(n) = node else { return new };
        if self.node_cmp(new, n) == Ordering::Less {
            let left = self.arena[n].left;
            let child = self.insert_at(left, new, fix);
            self.arena[n].left = Some(child);
            if self.arena[child].prio > self.arena[n].prio {
                return self.rotate_right(n, child, fix);
            }
        } else {
            let right = self.arena[n].right;
            let child = self.insert_at(right, new, fix);
            self.arena[n].right = Some(child);
            if self.arena[child].prio > self.arena[n].prio {
                return self.rotate_left(n, child, fix);
            }
        }
        if fix {
            self.update_max(n);
        }
        n
    }

    fn delete_at(
        &mut self,
        node: Option<usize>,
        start: I,
        end: I,
        id: EntryId,
        fix: bool,
    ) -> (Option<usize>, bool) {
        let Some(n) = node else { return (None, false) };
        match self.cmp_key(n, start, end, id) {
            Ordering::Greater => {
                let left = self.arena[n].left;
                let (sub, removed) = self.delete_at(left, start, end, id, fix);
                self.arena[n].left = sub;
                if removed && fix {
                    self.update_max(n);
                }
                (Some(n), removed)
            }
            Ordering::Less => {
                let right = self.arena[n].right;
                let (sub, removed) = self.delete_at(right, start, end, id, fix);
                self.arena[n].right = sub;
                if removed && fix {
                    self.update_max(n);
                }
                (Some(n), removed)
            }
            Ordering::Equal => (self.sink_and_remove(n, fix), true),
        }
    }

    /// Rotate `n` downward until it has at most one child, then unlink it.
    fn sink_and_remove(&mut self, n: usize, fix: bool) -> Option<usize> {
        match (self.arena[n].left, self.arena[n].right) {
            (None, None) => {
                self.free.push(n);
                None
            }
            (Some(c), None) | (None, Some(c)) => {
                self.free.push(n);
                Some(c)
            }
            (Some(l), Some(r)) => {
                if self.arena[l].prio > self.arena[r].prio {
                    let top = self.rotate_right(n, l, fix);
                    let sub = self.sink_and_remove(n, fix);
                    self.arena[top].right = sub;
                    if fix {
                        self.update_max(top);
                    }
                    Some(top)
                } else {
                    let top = self.rotate_left(n, r, fix);
                    let sub = self.sink_and_remove(n, fix);
                    self.arena[top].left = sub;
                    if fix {
                        self.update_max(top);
                    }
                    Some(top)
                }
            }
        }
    }

    fn fix_subtree(&mut self, n: usize) -> I {
        let (left, right) = (self.arena[n].left, self.arena[n].right);
        let mut m = self.arena[n].iv.end;
        if let Some(l) = left {
            m = m.max(self.fix_subtree(l));
        }
        if let Some(r) = right {
            m = m.max(self.fix_subtree(r));
        }
        self.arena[n].max_end = m;
        m
    }

    fn predicate(&self, n: usize, start: I, end: I, mode: QueryMode) -> bool {
        let iv = &self.arena[n].iv;
        match mode {
            QueryMode::Overlap => iv.overlap(start, end),
            QueryMode::ProperContainment => iv.contains_properly(start, end),
        }
    }

    fn collect_matches<'a>(
        &'a self,
        n: usize,
        start: I,
        end: I,
        mode: QueryMode,
        out: &mut Vec<Entry<'a, I, T>>,
    ) {
        let node = &self.arena[n];
        // nothing in this subtree reaches past the query start
        if node.max_end <= start {
            return;
        }
        if let Some(l) = node.left {
            self.collect_matches(l, start, end, mode, out);
        }
        // in-order by start: once starts reach the query end, neither this
        // node nor anything to its right can satisfy either predicate
        if node.iv.start < end {
            if self.predicate(n, start, end, mode) {
                out.push(Entry { id: node.id, interval: &self.arena[n].iv });
            }
            if let Some(r) = node.right {
                self.collect_matches(r, start, end, mode, out);
            }
        }
    }

    fn any_match(&self, n: usize, start: I, end: I, mode: QueryMode) -> bool {
        let node = &self.arena[n];
        if node.max_end <= start {
            return false;
        }
        if let Some(l) = node.left {
            if self.any_match(l, start, end, mode) {
                return true;
            }
        }
        if node.iv.start < end {
            if self.predicate(n, start, end, mode) {
                return true;
            }
            if let Some(r) = node.right {
                return self.any_match(r, start, end, mode);
            }
        }
        false
    }

    fn visit_at<E, F>(&self, n: usize, f: &mut F) -> Result<ControlFlow<()>, E>
    where
        F: FnMut(Entry<'_, I, T>) -> Result<ControlFlow<()>, E>,
    {
        if let Some(l) = self.arena[n].left {
            if self.visit_at(l, f)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        if f(Entry { id: self.arena[n].id, interval: &self.arena[n].iv })?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
        match self.arena[n].right {
            Some(r) => self.visit_at(r, f),
            None => Ok(ControlFlow::Continue(())),
        }
    }
}
