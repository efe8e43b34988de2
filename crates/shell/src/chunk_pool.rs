// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reusable stream-chunk buffers (spec §5): a worker's stdout/stderr pump
//! tasks borrow a buffer, fill it from the child's pipe, and return it to
//! the pool once the chunk has been forwarded to the caller. Buffers are
//! zeroed on release so secret bytes a command happened to print don't
//! linger in reused memory.

use parking_lot::Mutex;
use zeroize::Zeroize;

/// Size of one stream chunk (spec §5: "~128 chunks of 64 KiB").
pub const CHUNK_SIZE: usize = 64 * 1024;

pub struct ChunkPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl ChunkPool {
    pub fn new() -> Self {
        Self { free: Mutex::new(Vec::new()) }
    }

    /// Borrow a zeroed, `CHUNK_SIZE`-capacity buffer.
    pub fn get(&self) -> Vec<u8> {
        self.free.lock().pop().unwrap_or_else(|| vec![0u8; CHUNK_SIZE])
    }

    /// Return a buffer to the pool, zeroing it first.
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.zeroize();
        buf.resize(CHUNK_SIZE, 0);
        self.free.lock().push(buf);
    }
}

impl Default for ChunkPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_full_capacity_buffer() {
        let pool = ChunkPool::new();
        let buf = pool.get();
        assert_eq!(buf.len(), CHUNK_SIZE);
    }

    #[test]
    fn put_zeroes_before_reuse() {
        let pool = ChunkPool::new();
        let mut buf = pool.get();
        buf[0] = 0xAB;
        pool.put(buf);
        let recycled = pool.get();
        assert!(recycled.iter().all(|&b| b == 0));
    }
}
