//! The shared block every context maps.
//!
//! A region is just an array of aligned words. Contexts never agree on
//! pointers, only on byte offsets, which each one resolves against its own
//! view of the region once the bootstrap message arrives.

use core::sync::atomic::AtomicU32;

use crate::config::{LOCK_CELL_OFFSET, PHASE_CELL_OFFSET, REGION_WORDS, WORD_BYTES};
use crate::error::RegionError;

/// Fixed-size block of atomically addressable words.
pub struct SharedRegion<const WORDS: usize = REGION_WORDS> {
    words: [AtomicU32; WORDS],
}

impl<const WORDS: usize> SharedRegion<WORDS> {
    /// A zero-filled region.
    pub const fn new() -> Self {
        Self {
            words: [const { AtomicU32::new(0) }; WORDS],
        }
    }

    /// Region size in bytes.
    pub const fn size(&self) -> usize {
        WORDS * WORD_BYTES
    }

    /// The word at byte `offset`.
    pub fn word(&self, offset: usize) -> Result<&AtomicU32, RegionError> {
        if offset % WORD_BYTES != 0 {
            return Err(RegionError::Misaligned {
                offset,
                alignment: WORD_BYTES,
            });
        }
        self.words.get(offset / WORD_BYTES).ok_or(RegionError::OutOfRange {
            offset,
            size: self.size(),
        })
    }

    /// Resolve the named offsets of a bootstrap message into cell references.
    pub fn resolve(&self, offsets: CellOffsets) -> Result<Cells<'_>, RegionError> {
        if offsets.lock == offsets.phase {
            return Err(RegionError::Overlapping(offsets.lock));
        }
        Ok(Cells {
            lock: self.word(offsets.lock)?,
            phase: self.word(offsets.phase)?,
        })
    }
}

impl<const WORDS: usize> Default for SharedRegion<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offsets of the two cells inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellOffsets {
    pub lock: usize,
    pub phase: usize,
}

impl Default for CellOffsets {
    fn default() -> Self {
        Self {
            lock: LOCK_CELL_OFFSET,
            phase: PHASE_CELL_OFFSET,
        }
    }
}

/// What the bootstrap channel delivers to a context, once, before its first turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootstrapMessage {
    pub offsets: CellOffsets,
}

/// Resolved cell references.
#[derive(Debug, Clone, Copy)]
pub struct Cells<'a> {
    pub lock: &'a AtomicU32,
    pub phase: &'a AtomicU32,
}
