use std::cmp::Ordering;

use rand::Rng;

use crate::types::InternalKeyComparator;

/// Maximum height of the skip list. LevelDB uses 12.
pub const MAX_HEIGHT: usize = 12;

/// Index of the head sentinel in the arena.
const HEAD: usize = 0;

/// A single node in the skip list.
///
/// Each node has `height` forward pointers. Level 0 contains all nodes
/// (a regular linked list). Higher levels skip over nodes, enabling
/// O(log n) average-case search.
///
/// ```text
/// Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
/// Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
/// Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
/// Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
/// ```
///
/// Nodes live in an arena and link by index. Nodes are never removed, so an
/// index stays valid for the life of the list, even across inserts.
struct SkipNode {
    key: Vec<u8>,
    value: Vec<u8>,
    forward: Vec<Option<usize>>,
}

/// A probabilistic sorted data structure ordered by an internal key
/// comparator.
///
/// Average case: O(log n) insert, O(log n) lookup, O(n) iteration.
pub struct SkipList {
    nodes: Vec<SkipNode>,
    height: usize,
    len: usize,
    size_bytes: usize,
    cmp: InternalKeyComparator,
}

impl SkipList {
    /// Create a new empty skip list.
    pub fn new(cmp: InternalKeyComparator) -> Self {
        SkipList {
            nodes: vec![SkipNode {
                key: Vec::new(),
                value: Vec::new(),
                forward: vec![None; MAX_HEIGHT],
            }],
            height: 1,
            len: 0,
            size_bytes: 0,
            cmp,
        }
    }

    /// Insert a key-value pair. Overwrites the value if the key already
    /// exists.
    ///
    /// Algorithm:
    ///   1. Find the insertion point at each level (track predecessors)
    ///   2. Generate a random height for the new node (coin flip per level)
    ///   3. Create node with that height
    ///   4. Splice into the list at each level up to the node's height
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let mut prev = [HEAD; MAX_HEIGHT];
        let found = self.find_greater_or_equal(&key, Some(&mut prev));

        if let Some(idx) = found {
            if self.cmp.compare(&self.nodes[idx].key, &key) == Ordering::Equal {
                self.size_bytes = self.size_bytes - self.nodes[idx].value.len() + value.len();
                self.nodes[idx].value = value;
                return;
            }
        }

        let height = self.random_height();
        if height > self.height {
            // prev[] already holds HEAD for the new levels.
            self.height = height;
        }

        self.size_bytes += key.len() + value.len() + height * std::mem::size_of::<usize>();
        let idx = self.nodes.len();
        let mut forward = vec![None; height];
        for (level, slot) in forward.iter_mut().enumerate() {
            *slot = self.nodes[prev[level]].forward[level];
        }
        self.nodes.push(SkipNode { key, value, forward });
        for (level, &p) in prev.iter().enumerate().take(height) {
            self.nodes[p].forward[level] = Some(idx);
        }
        self.len += 1;
    }

    /// First node with key >= target, recording the last node before it on
    /// every level.
    ///
    /// Algorithm:
    ///   1. Start at head, highest level
    ///   2. Move forward while next key < target
    ///   3. Drop down one level
    ///   4. Repeat until level 0
    fn find_greater_or_equal(
        &self,
        target: &[u8],
        mut prev: Option<&mut [usize; MAX_HEIGHT]>,
    ) -> Option<usize> {
        let mut x = HEAD;
        let mut level = self.height - 1;
        loop {
            let next = self.nodes[x].forward[level];
            match next {
                Some(n) if self.cmp.compare(&self.nodes[n].key, target) == Ordering::Less => {
                    x = n;
                }
                _ => {
                    if let Some(prev) = prev.as_mut() {
                        prev[level] = x;
                    }
                    if level == 0 {
                        return next;
                    }
                    level -= 1;
                }
            }
        }
    }

    /// Last node with key < target.
    fn find_less_than(&self, target: &[u8]) -> Option<usize> {
        let mut x = HEAD;
        let mut level = self.height - 1;
        loop {
            match self.nodes[x].forward[level] {
                Some(n) if self.cmp.compare(&self.nodes[n].key, target) == Ordering::Less => {
                    x = n;
                }
                _ => {
                    if level == 0 {
                        return (x != HEAD).then_some(x);
                    }
                    level -= 1;
                }
            }
        }
    }

    fn find_last(&self) -> Option<usize> {
        let mut x = HEAD;
        let mut level = self.height - 1;
        loop {
            match self.nodes[x].forward[level] {
                Some(n) => x = n,
                None => {
                    if level == 0 {
                        return (x != HEAD).then_some(x);
                    }
                    level -= 1;
                }
            }
        }
    }

    /// Node index of the first entry with key >= target.
    pub fn seek(&self, target: &[u8]) -> Option<usize> {
        self.find_greater_or_equal(target, None)
    }

    pub fn first(&self) -> Option<usize> {
        self.nodes[HEAD].forward[0]
    }

    pub fn last(&self) -> Option<usize> {
        self.find_last()
    }

    pub fn next(&self, node: usize) -> Option<usize> {
        self.nodes[node].forward[0]
    }

    pub fn prev(&self, node: usize) -> Option<usize> {
        self.find_less_than(&self.nodes[node].key)
    }

    /// Key and value stored at a node index.
    pub fn entry(&self, node: usize) -> (&[u8], &[u8]) {
        let n = &self.nodes[node];
        (&n.key, &n.value)
    }

    pub fn comparator(&self) -> &InternalKeyComparator {
        &self.cmp
    }

    /// Number of entries in the skip list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the skip list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Approximate memory usage in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Create an iterator over all entries in sorted order.
    /// Traverses level 0 (the bottom level contains all entries).
    pub fn iter(&self) -> SkipListIter<'_> {
        SkipListIter {
            list: self,
            current: self.first(),
        }
    }

    /// Generate a random level for a new node.
    /// Each level has a 1/4 probability (LevelDB uses 1/4, not 1/2).
    /// Higher branching factor = shorter skip list = fewer levels = less memory.
    fn random_height(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_range(0..4) == 0 {
            height += 1;
        }
        height
    }
}

/// Borrowing iterator over skip list entries in sorted order.
///
/// Follows level 0 forward pointers; level 0 is a sorted linked list
/// containing every entry.
pub struct SkipListIter<'a> {
    list: &'a SkipList,
    current: Option<usize>,
}

impl<'a> Iterator for SkipListIter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = self.list.next(node);
        Some(self.list.entry(node))
    }
}
