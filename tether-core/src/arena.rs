//! Frame arena.
//!
//! A bump allocator over a vector of plain-data records. Allocation appends
//! records; nothing is freed individually. `reset()` drops every record at
//! once and bumps the generation so handles from earlier frames stop
//! resolving.
//!
//! Records are `Copy`, so no destructors ever run on reset. Alignment is the
//! record type's alignment: the backing `Vec<T>` guarantees it for every slot.

use std::marker::PhantomData;
use std::ops::Range;

use crate::error::RendererError;

/// Handle to a single record.
#[derive(Debug)]
pub struct ArenaHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ArenaHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaHandle<T> {}

impl<T> PartialEq for ArenaHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for ArenaHandle<T> {}

impl<T> ArenaHandle<T> {
    /// Position of the record within the arena's allocation order.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Handle to a contiguous run of records.
#[derive(Debug)]
pub struct ArenaSpan<T> {
    start: u32,
    len: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ArenaSpan<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaSpan<T> {}

impl<T> ArenaSpan<T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn range(&self) -> Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

/// Bump arena of `T` records with a fixed (growable) capacity.
pub struct Arena<T: Copy> {
    records: Vec<T>,
    capacity: usize,
    generation: u32,
}

impl<T: Copy> Arena<T> {
    /// Create an arena that can hold `capacity` records before it must be
    /// reset or grown.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            generation: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current offset (records handed out since the last reset).
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.records.len()
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Allocate one record.
    pub fn alloc(&mut self, record: T) -> Result<ArenaHandle<T>, RendererError> {
        if self.remaining() == 0 {
            return Err(RendererError::AllocationExhausted {
                requested: 1,
                remaining: 0,
            });
        }
        let index = self.records.len() as u32;
        self.records.push(record);
        Ok(ArenaHandle {
            index,
            generation: self.generation,
            _marker: PhantomData,
        })
    }

    /// Allocate `count` contiguous records initialised to `fill`.
    ///
    /// Fails without allocating anything if fewer than `count` records remain.
    pub fn alloc_n(&mut self, count: usize, fill: T) -> Result<ArenaSpan<T>, RendererError> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(RendererError::AllocationExhausted {
                requested: count,
                remaining,
            });
        }
        let start = self.records.len() as u32;
        self.records.resize(self.records.len() + count, fill);
        Ok(ArenaSpan {
            start,
            len: count as u32,
            generation: self.generation,
            _marker: PhantomData,
        })
    }

    /// Resolve a handle. `None` if it was issued before the last reset.
    pub fn get(&self, handle: ArenaHandle<T>) -> Option<&T> {
        if handle.generation != self.generation {
            return None;
        }
        self.records.get(handle.index as usize)
    }

    pub fn get_mut(&mut self, handle: ArenaHandle<T>) -> Option<&mut T> {
        if handle.generation != self.generation {
            return None;
        }
        self.records.get_mut(handle.index as usize)
    }

    /// Resolve a span. `None` if it was issued before the last reset.
    pub fn span(&self, span: ArenaSpan<T>) -> Option<&[T]> {
        if span.generation != self.generation {
            return None;
        }
        self.records.get(span.range())
    }

    pub fn span_mut(&mut self, span: ArenaSpan<T>) -> Option<&mut [T]> {
        if span.generation != self.generation {
            return None;
        }
        self.records.get_mut(span.range())
    }

    /// All live records in allocation order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.records
    }

    /// Invalidate every handle and rewind to offset zero. The backing
    /// storage is kept.
    pub fn reset(&mut self) {
        self.records.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Raise the capacity. Live handles stay valid. Never shrinks.
    pub fn grow(&mut self, new_capacity: usize) {
        if new_capacity <= self.capacity {
            return;
        }
        self.records.reserve(new_capacity - self.records.len());
        self.capacity = new_capacity;
    }
}
