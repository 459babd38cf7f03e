//! SharedCounterTable - process-shared bogo-op counters.
//!
//! A named POSIX shared memory object mapped `MAP_SHARED`, so the
//! orchestrator and every forked worker observe the same backing storage.
//!
//! ## Memory Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  /havoc-<pid>  (max_workers × KIND_COUNT × 8 bytes)          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  row 0: [io][cpu][vm][hdd][wait][null]   worker index 0      │
//! │  row 1: [io][cpu][vm][hdd][wait][null]   worker index 1      │
//! │  ...                                                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each slot has exactly one writer (its worker), so increments are a plain
//! load + store with no locking. Kinds with fewer workers than the widest
//! kind leave their trailing cells at zero.

use std::fs::File;
use std::sync::atomic::{ AtomicU64, Ordering };

use memmap2::{ MmapMut, MmapOptions };
use nix::fcntl::OFlag;
use nix::sys::mman::{ shm_open, shm_unlink };
use nix::sys::stat::Mode;
use nix::unistd::{ getpid, Pid };
use static_assertions::const_assert_eq;
use tracing::{ debug, warn };

use crate::error::{ HavocError, Result };
use crate::stressor::{ StressorKind, KIND_COUNT };

const_assert_eq!(std::mem::size_of::<AtomicU64>(), std::mem::size_of::<u64>());

const SLOT_SIZE: usize = std::mem::size_of::<AtomicU64>();

/// Flat slot index for (kind, worker index).
#[inline]
pub const fn slot_index(kind: StressorKind, instance: usize) -> usize {
    instance * KIND_COUNT + kind.ordinal()
}

/// Shared memory object name for a given orchestrator pid.
pub fn object_name(pid: Pid) -> String {
    format!("/havoc-{}", pid)
}

/// Handle to one counter. Cheap to copy; valid for as long as the mapping.
#[derive(Clone, Copy)]
pub struct CounterSlot<'a> {
    cell: &'a AtomicU64,
}

impl<'a> CounterSlot<'a> {
    pub fn new(cell: &'a AtomicU64) -> Self {
        Self { cell }
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.cell.load(Ordering::Acquire)
    }

    /// Single writer, so a load + store is enough.
    #[inline]
    pub fn increment(&self) {
        let next = self.cell.load(Ordering::Relaxed).wrapping_add(1);
        self.cell.store(next, Ordering::Release);
    }
}

pub struct SharedCounterTable {
    name: String,
    mmap: MmapMut,
    base: *const AtomicU64,
    slots: usize,
    /// Only the creating process may unlink
    owner: Pid,
    unlinked: bool,
}

impl SharedCounterTable {
    /// Create the table under the pid-qualified name of this process.
    pub fn for_process(slots: usize) -> Result<Self> {
        Self::allocate(&object_name(getpid()), slots)
    }

    /// Create, size and map a zeroed table of `slots` counters.
    ///
    /// A stale object with the same name is unlinked first. On any failure
    /// the object is unlinked again before returning.
    pub fn allocate(name: &str, slots: usize) -> Result<Self> {
        if slots == 0 {
            return Err(HavocError::config("counter table needs at least one slot"));
        }
        let len = slots * SLOT_SIZE;

        let _ = shm_unlink(name);
        let fd = shm_open(
            name,
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL,
            Mode::S_IRUSR | Mode::S_IWUSR
        ).map_err(|e| {
            HavocError::shared_memory(format!("Cannot open shared memory region {name}: {e}"))
        })?;
        let file = File::from(fd);

        if let Err(e) = file.set_len(len as u64) {
            let _ = shm_unlink(name);
            return Err(
                HavocError::shared_memory(format!("Cannot resize shared memory region: {e}"))
            );
        }

        // SAFETY: the object was just created with O_EXCL and sized above;
        // nothing else truncates it while mapped.
        let mut mmap = match unsafe { MmapOptions::new().len(len).map_mut(&file) } {
            Ok(m) => m,
            Err(e) => {
                let _ = shm_unlink(name);
                return Err(
                    HavocError::shared_memory(format!("Cannot mmap shared memory region: {e}"))
                );
            }
        };
        let base = mmap.as_mut_ptr() as *const AtomicU64;

        let table = Self {
            name: name.to_string(),
            mmap,
            base,
            slots,
            owner: getpid(),
            unlinked: false,
        };
        table.clear();
        debug!(name = %table.name, slots, "counter table mapped");
        Ok(table)
    }

    #[inline]
    fn cells(&self) -> &[AtomicU64] {
        // SAFETY: the mapping is page aligned, `slots * 8` bytes long and
        // lives as long as `self`. All access goes through atomics.
        unsafe { std::slice::from_raw_parts(self.base, self.slots) }
    }

    fn clear(&self) {
        for cell in self.cells() {
            cell.store(0, Ordering::Relaxed);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// Mapped size in bytes
    pub fn byte_len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn slot(&self, index: usize) -> CounterSlot<'_> {
        CounterSlot::new(&self.cells()[index])
    }

    #[inline]
    pub fn slot_for(&self, kind: StressorKind, instance: usize) -> CounterSlot<'_> {
        self.slot(slot_index(kind, instance))
    }

    #[inline]
    pub fn read(&self, index: usize) -> u64 {
        self.cells()[index].load(Ordering::Acquire)
    }

    /// Sum of the first `started` counters of `kind`.
    pub fn kind_total(&self, kind: StressorKind, started: usize) -> u64 {
        (0..started).map(|i| self.read(slot_index(kind, i))).sum()
    }

    /// Unmap and unlink. Forked children holding an inherited copy never
    /// unlink; only the creating process does.
    pub fn release(mut self) -> Result<()> {
        self.unlink()
    }

    fn unlink(&mut self) -> Result<()> {
        if self.unlinked || getpid() != self.owner {
            return Ok(());
        }
        self.unlinked = true;
        shm_unlink(self.name.as_str()).map_err(|e| {
            HavocError::shared_memory(format!("Cannot unlink shared memory region {}: {e}", self.name))
        })?;
        debug!(name = %self.name, "counter table released");
        Ok(())
    }
}

impl Drop for SharedCounterTable {
    fn drop(&mut self) {
        if let Err(e) = self.unlink() {
            warn!("{e}");
        }
    }
}

impl std::fmt::Debug for SharedCounterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCounterTable")
            .field("name", &self.name)
            .field("slots", &self.slots)
            .field("owner", &self.owner)
            .finish()
    }
}
