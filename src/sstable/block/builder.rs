/// Accumulates sorted key-value pairs and serializes them into a block.
///
/// Keys are prefix-compressed against the previous key. Every
/// `restart_interval` entries the full key is stored again; those restart
/// points are recorded at the end of the block.
///
/// On-disk layout of a block:
/// ```text
/// ┌──────────────────────────────────────────────────────────────────────┐
/// │ Entry 0: [shared(4B)][unshared(4B)][val_len(4B)][key suffix][value]   │
/// │ Entry 1: ...                                                          │
/// │ Entry N: ...                                                          │
/// ├──────────────────────────────────────────────────────────────────────┤
/// │ Restart array: [off_0(4B)][off_1(4B)]...[off_R(4B)]                   │
/// │ Num restarts (4B)                                                     │
/// └──────────────────────────────────────────────────────────────────────┘
/// ```
///
/// A small interval makes lookups cheaper; a large one makes blocks smaller.
pub struct BlockBuilder {
    data: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    num_entries: usize,
    last_key: Vec<u8>,
    block_size: usize,
    restart_interval: usize,
}

pub(crate) const ENTRY_HEADER_SIZE: usize = 12;

impl BlockBuilder {
    /// Create a new block builder with target block size.
    pub fn new(block_size: usize, restart_interval: usize) -> Self {
        BlockBuilder {
            data: Vec::new(),
            restarts: vec![0],
            counter: 0,
            num_entries: 0,
            last_key: Vec::new(),
            block_size,
            restart_interval: restart_interval.max(1),
        }
    }

    /// Add a key-value pair to the block.
    /// Returns false if the block is full (entry doesn't fit).
    /// First entry is always accepted even if it exceeds block_size.
    /// Entries MUST be added in sorted key order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> bool {
        let entry_size = ENTRY_HEADER_SIZE + key.len() + value.len();
        if self.num_entries > 0 && self.estimated_size() + entry_size > self.block_size {
            return false;
        }

        let shared = if self.counter < self.restart_interval {
            self.last_key
                .iter()
                .zip(key)
                .take_while(|(a, b)| a == b)
                .count()
        } else {
            self.restarts.push(self.data.len() as u32);
            self.counter = 0;
            0
        };
        let unshared = key.len() - shared;

        self.data.extend_from_slice(&(shared as u32).to_le_bytes());
        self.data.extend_from_slice(&(unshared as u32).to_le_bytes());
        self.data.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.data.extend_from_slice(&key[shared..]);
        self.data.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
        self.num_entries += 1;
        true
    }

    /// Finalize the block: append restart array and restart count.
    pub fn build(self) -> Vec<u8> {
        let mut block = self.data;
        for offset in &self.restarts {
            block.extend_from_slice(&offset.to_le_bytes());
        }
        block.extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        block
    }

    /// Current estimated size of the block (data + restarts + count).
    pub fn estimated_size(&self) -> usize {
        self.data.len() + self.restarts.len() * 4 + 4
    }

    /// Whether the block is empty (no entries added).
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    pub fn len(&self) -> usize {
        self.num_entries
    }

    /// Key of the most recently added entry.
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }
}
