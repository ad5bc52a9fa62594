// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! DMA-capable buffer pool with owning block handles.
//!
//! The pool hands out [`MemoryBlock`] handles; a handle is the only path to
//! the block's memory, and dropping it returns the block to the pool, so
//! use-after-release and double-release are unrepresentable rather than
//! documented preconditions. The vendor MB pool (feature `rockchip`) and a
//! plain heap backend share one front type; the heap backend keeps the
//! whole pipeline runnable on a development host and in the test suite.
//!
//! This pipeline deliberately sizes the pool at one block: the same block
//! is rewritten by the capture source every tick and read synchronously by
//! the encoder, so acquisition happens once at setup rather than per
//! frame. A second acquire before the first handle is dropped reports
//! [`Error::OutOfBlocks`].

use crate::error::{Error, Result};
#[cfg(feature = "rockchip")]
use crate::mpi::MpiSystem;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[cfg(feature = "rockchip")]
use rockit_sys::mpi::{MB_ALLOC_TYPE_DMA, MB_BLK, MB_INVALID_POOLID, MB_POOL, MB_POOL_CONFIG_S};
#[cfg(feature = "rockchip")]
use rockit_sys::{RK_FALSE, RK_SUCCESS, RK_TRUE};
#[cfg(feature = "rockchip")]
use std::ptr::NonNull;

enum RawBlock {
    Heap(Box<[u8]>),
    #[cfg(feature = "rockchip")]
    Rockit { blk: MB_BLK, vaddr: NonNull<u8> },
}

// A raw block is an opaque token plus its mapping; the vendor API permits
// releasing a block from any thread.
unsafe impl Send for RawBlock {}

enum Backend {
    Heap,
    #[cfg(feature = "rockchip")]
    Rockit { mpi: Arc<MpiSystem>, pool: MB_POOL },
}

struct PoolState {
    available: Vec<RawBlock>,
    outstanding: usize,
    destroyed: bool,
}

struct PoolInner {
    block_size: usize,
    block_count: usize,
    backend: Backend,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn release_raw(&self, raw: RawBlock) {
        let mut state = self.state.lock().unwrap();
        state.outstanding -= 1;
        match raw {
            RawBlock::Heap(buf) => state.available.push(RawBlock::Heap(buf)),
            #[cfg(feature = "rockchip")]
            RawBlock::Rockit { blk, .. } => {
                if let Backend::Rockit { mpi, .. } = &self.backend {
                    let ret = unsafe { mpi.lib().RK_MPI_MB_ReleaseMB(blk) };
                    if ret != RK_SUCCESS {
                        warn!(code = format!("{ret:#x}"), "MB release failed");
                    }
                }
            }
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        #[cfg(feature = "rockchip")]
        if let Backend::Rockit { mpi, pool } = &self.backend {
            let ret = unsafe { mpi.lib().RK_MPI_MB_DestroyPool(*pool) };
            if ret != RK_SUCCESS {
                warn!(code = format!("{ret:#x}"), "MB pool destroy failed");
            } else {
                tracing::debug!(pool = *pool, "MB pool destroyed");
            }
        }
    }
}

/// Fixed-size pool of DMA-capable memory blocks.
pub struct MemoryPool {
    inner: Arc<PoolInner>,
    destroyed: bool,
}

impl MemoryPool {
    /// Create a host-memory pool of `block_count` blocks of `block_size`
    /// bytes each.
    pub fn with_heap(block_size: usize, block_count: usize) -> Result<Self> {
        if block_size == 0 || block_count == 0 {
            return Err(Error::InvalidConfig(
                "pool block size and count must be non-zero".into(),
            ));
        }
        let available = (0..block_count)
            .map(|_| RawBlock::Heap(vec![0u8; block_size].into_boxed_slice()))
            .collect();
        Ok(Self {
            inner: Arc::new(PoolInner {
                block_size,
                block_count,
                backend: Backend::Heap,
                state: Mutex::new(PoolState {
                    available,
                    outstanding: 0,
                    destroyed: false,
                }),
            }),
            destroyed: false,
        })
    }

    /// Create a vendor DMA pool of `block_count` blocks of `block_size`
    /// bytes each.
    #[cfg(feature = "rockchip")]
    pub fn with_rockit(mpi: Arc<MpiSystem>, block_size: usize, block_count: usize) -> Result<Self> {
        if block_size == 0 || block_count == 0 {
            return Err(Error::InvalidConfig(
                "pool block size and count must be non-zero".into(),
            ));
        }

        let mut config = MB_POOL_CONFIG_S {
            u64MBSize: block_size as u64,
            u32MBCnt: block_count as u32,
            enAllocType: MB_ALLOC_TYPE_DMA,
            ..unsafe { std::mem::zeroed() }
        };
        let pool = unsafe { mpi.lib().RK_MPI_MB_CreatePool(&mut config) };
        if pool == MB_INVALID_POOLID {
            return Err(Error::PoolAllocation {
                size: block_size,
                count: block_count,
            });
        }
        tracing::debug!(pool, block_size, block_count, "MB pool created");

        Ok(Self {
            inner: Arc::new(PoolInner {
                block_size,
                block_count,
                backend: Backend::Rockit { mpi, pool },
                state: Mutex::new(PoolState {
                    available: Vec::new(),
                    outstanding: 0,
                    destroyed: false,
                }),
            }),
            destroyed: false,
        })
    }

    /// Obtain one block. `cached` selects the cache-coherent mapping on
    /// the vendor backend (the consumer is responsible for any flush the
    /// mapping mode implies); the heap backend ignores it.
    pub fn acquire_block(&self, cached: bool) -> Result<MemoryBlock> {
        let mut state = self.inner.state.lock().unwrap();
        if state.destroyed || self.destroyed {
            return Err(Error::PoolNotReady);
        }
        if state.outstanding >= self.inner.block_count {
            return Err(Error::OutOfBlocks);
        }

        let raw = match &self.inner.backend {
            Backend::Heap => state.available.pop().ok_or(Error::OutOfBlocks)?,
            #[cfg(feature = "rockchip")]
            Backend::Rockit { mpi, pool } => {
                let flag = if cached { RK_TRUE } else { RK_FALSE };
                let blk = unsafe {
                    mpi.lib()
                        .RK_MPI_MB_GetMB(*pool, self.inner.block_size as u64, flag)
                };
                if blk.is_null() {
                    return Err(Error::OutOfBlocks);
                }
                let vaddr = unsafe { mpi.lib().RK_MPI_MB_Handle2VirAddr(blk) };
                let Some(vaddr) = NonNull::new(vaddr.cast::<u8>()) else {
                    unsafe { mpi.lib().RK_MPI_MB_ReleaseMB(blk) };
                    return Err(Error::InvalidConfig(
                        "MB block has no virtual mapping".into(),
                    ));
                };
                RawBlock::Rockit { blk, vaddr }
            }
        };

        state.outstanding += 1;
        drop(state);

        Ok(MemoryBlock {
            raw: Some(raw),
            pool: Arc::clone(&self.inner),
            cached,
        })
    }

    /// Tear the pool down. Further acquires fail with
    /// [`Error::PoolNotReady`]; calling this twice is a no-op. Blocks
    /// still outstanding keep their memory alive (and the vendor pool with
    /// it) until they are dropped — a leak if they never are, never a
    /// dangling mapping.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let mut state = self.inner.state.lock().unwrap();
        state.destroyed = true;
        state.available.clear();
        if state.outstanding > 0 {
            warn!(
                outstanding = state.outstanding,
                "pool destroyed with blocks still outstanding"
            );
        }
    }

    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    pub fn block_count(&self) -> usize {
        self.inner.block_count
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Owning handle to one pool block.
///
/// The pixel memory is reachable only through this handle and the address
/// is stable for the handle's whole lifetime (the zero-copy contract: the
/// capture source writes and the encoder reads the same bytes). Dropping
/// the handle returns the block to its pool.
pub struct MemoryBlock {
    raw: Option<RawBlock>,
    pool: Arc<PoolInner>,
    cached: bool,
}

impl MemoryBlock {
    pub fn capacity(&self) -> usize {
        self.pool.block_size
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Whether the block came from the vendor DMA pool (required by the
    /// hardware encoder) rather than host memory.
    pub fn is_dma(&self) -> bool {
        match self.raw.as_ref() {
            #[cfg(feature = "rockchip")]
            Some(RawBlock::Rockit { .. }) => true,
            _ => false,
        }
    }

    /// CPU address of the block, stable until the handle is dropped.
    pub fn virtual_address(&self) -> *const u8 {
        self.as_slice().as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.raw.as_ref().expect("block present until drop") {
            RawBlock::Heap(buf) => buf,
            #[cfg(feature = "rockchip")]
            RawBlock::Rockit { vaddr, .. } => unsafe {
                std::slice::from_raw_parts(vaddr.as_ptr(), self.pool.block_size)
            },
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let block_size = self.pool.block_size;
        match self.raw.as_mut().expect("block present until drop") {
            RawBlock::Heap(buf) => buf,
            #[cfg(feature = "rockchip")]
            RawBlock::Rockit { vaddr, .. } => unsafe {
                std::slice::from_raw_parts_mut(vaddr.as_ptr(), block_size)
            },
        }
    }

    /// The raw vendor handle for hand-off to the encoder channel, `None`
    /// for heap-backed blocks.
    #[cfg(feature = "rockchip")]
    pub(crate) fn mb_handle(&self) -> Option<MB_BLK> {
        match self.raw.as_ref() {
            Some(RawBlock::Rockit { blk, .. }) => Some(*blk),
            _ => None,
        }
    }
}

impl Drop for MemoryBlock {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.pool.release_raw(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_pool_exhausts() {
        let pool = MemoryPool::with_heap(16, 1).unwrap();
        let block = pool.acquire_block(true).unwrap();
        assert!(matches!(
            pool.acquire_block(true),
            Err(Error::OutOfBlocks)
        ));
        drop(block);
        pool.acquire_block(true).unwrap();
    }

    #[test]
    fn address_stable_across_reacquire() {
        let pool = MemoryPool::with_heap(64, 1).unwrap();
        let block = pool.acquire_block(true).unwrap();
        let addr = block.virtual_address();
        drop(block);
        let block = pool.acquire_block(false).unwrap();
        assert_eq!(addr, block.virtual_address());
    }

    #[test]
    fn writes_are_readable_at_same_address() {
        let pool = MemoryPool::with_heap(8, 1).unwrap();
        let mut block = pool.acquire_block(true).unwrap();
        let before = block.virtual_address();
        block.as_mut_slice().copy_from_slice(&[7u8; 8]);
        assert_eq!(block.virtual_address(), before);
        assert_eq!(block.as_slice(), &[7u8; 8]);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut pool = MemoryPool::with_heap(16, 1).unwrap();
        pool.destroy();
        pool.destroy();
        assert!(matches!(pool.acquire_block(true), Err(Error::PoolNotReady)));
    }

    #[test]
    fn destroy_with_outstanding_block_keeps_memory_valid() {
        let mut pool = MemoryPool::with_heap(4, 1).unwrap();
        let mut block = pool.acquire_block(true).unwrap();
        pool.destroy();
        block.as_mut_slice()[0] = 42;
        assert_eq!(block.as_slice()[0], 42);
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(MemoryPool::with_heap(0, 1).is_err());
        assert!(MemoryPool::with_heap(16, 0).is_err());
    }

    #[test]
    fn cached_flag_is_threaded_through() {
        let pool = MemoryPool::with_heap(16, 2).unwrap();
        assert!(pool.acquire_block(true).unwrap().is_cached());
        assert!(!pool.acquire_block(false).unwrap().is_cached());
    }
}
