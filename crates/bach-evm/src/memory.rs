//! EVM memory implementation

use bach_primitives::U256;

/// EVM memory (byte-addressable, grows in 32-byte words).
///
/// Callers resize before access; reads and writes past the current size
/// panic, so every opcode charges and expands first.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create new empty memory
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Get current memory size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Current size in words
    pub fn words(&self) -> usize {
        self.data.len() / 32
    }

    /// Grow to `words` words; never shrinks
    pub fn resize_words(&mut self, words: usize) {
        let new_size = words * 32;
        if new_size > self.data.len() {
            self.data.resize(new_size, 0);
        }
    }

    /// Load a 32-byte word from memory
    pub fn load(&self, offset: usize) -> U256 {
        U256::from_big_endian(&self.data[offset..offset + 32])
    }

    /// Store a 32-byte word to memory
    pub fn store(&mut self, offset: usize, value: U256) {
        value.to_big_endian(&mut self.data[offset..offset + 32]);
    }

    /// Store a single byte to memory
    pub fn store8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Borrow a byte range
    pub fn slice(&self, offset: usize, size: usize) -> &[u8] {
        if size == 0 {
            return &[];
        }
        &self.data[offset..offset + size]
    }

    /// Store a byte slice to memory
    pub fn store_slice(&mut self, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Copy `size` bytes of `source` starting at `source_offset` into memory,
    /// zero-filling whatever lies past the end of `source`
    pub fn store_padded(&mut self, offset: usize, source: &[u8], source_offset: usize, size: usize) {
        if size == 0 {
            return;
        }
        let target = &mut self.data[offset..offset + size];
        let available = source.len().saturating_sub(source_offset).min(size);
        if available > 0 {
            target[..available].copy_from_slice(&source[source_offset..source_offset + available]);
        }
        target[available..].fill(0);
    }

    /// Copy within memory (for MCOPY)
    pub fn copy(&mut self, dest: usize, src: usize, size: usize) {
        if size == 0 {
            return;
        }
        self.data.copy_within(src..src + size, dest);
    }
}
