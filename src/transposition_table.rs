/// Default number of slots, a prime so that keys spread over the table
pub const DEFAULT_CAPACITY: usize = 65_537;

/// A stored negamax result
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Entry {
    key: u64,
    pub score: i32,
    pub depth: u32,
    pub best_move: Option<usize>,
    /// `false` for bound results from a cutoff or a fail-low
    pub exact: bool,
}

impl Entry {
    /// Whether this entry can replace a search to `depth`
    pub fn trusted_for(&self, depth: u32) -> bool {
        self.exact && self.depth >= depth
    }
}

/// A fixed-size, always-replace cache of negamax results for one decision
///
/// Collisions on the same slot evict the previous entry; the full key is kept
/// so that a lookup never returns another position's result.
#[derive(Clone)]
pub struct TranspositionTable {
    entries: Vec<Option<Entry>>,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity.max(1)],
        }
    }

    pub fn set(
        &mut self,
        key: u64,
        score: i32,
        depth: u32,
        best_move: Option<usize>,
        exact: bool,
    ) {
        let len = self.entries.len();
        self.entries[key as usize % len] = Some(Entry {
            key,
            score,
            depth,
            best_move,
            exact,
        });
    }

    pub fn get(&self, key: u64) -> Option<Entry> {
        self.entries[key as usize % self.entries.len()].filter(|entry| entry.key == key)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}
