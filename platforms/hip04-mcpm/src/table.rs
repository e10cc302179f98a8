// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Per-core power request counts and the lock that guards them.

use kernel_guard::NoPreemptIrqSave;
use kspin::{SpinRaw, SpinRawGuard};

use crate::{
    MAX_CLUSTERS, MAX_CPUS_PER_CLUSTER,
    cpu::CpuId,
    error::{Result, Violation},
};

/// Power state of a single core, derived from its refcount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    /// Refcount 0: powered down or going down.
    Down,
    /// Refcount 1: requested up.
    Up,
    /// Refcount 2: a power-up overtook a power-down still in flight.
    Race,
}

impl CoreState {
    fn of(id: CpuId, count: u8) -> Result<Self> {
        match count {
            0 => Ok(Self::Down),
            1 => Ok(Self::Up),
            2 => Ok(Self::Race),
            count => Err(Violation::RefcountOverflow { id, count }.into()),
        }
    }
}

/// Outstanding power-up requests of every core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClusterTable {
    counts: [[u8; MAX_CPUS_PER_CLUSTER]; MAX_CLUSTERS],
}

impl ClusterTable {
    /// All cores down.
    pub const fn new() -> Self {
        Self {
            counts: [[0; MAX_CPUS_PER_CLUSTER]; MAX_CLUSTERS],
        }
    }

    /// Refcount of `id`.
    #[inline]
    pub fn refcount(&self, id: CpuId) -> u8 {
        self.counts[id.cluster()][id.cpu()]
    }

    /// Power state of `id`.
    pub fn state(&self, id: CpuId) -> Result<CoreState> {
        CoreState::of(id, self.refcount(id))
    }

    /// Whether no core of `cluster` is requested up.
    pub fn cluster_down(&self, cluster: usize) -> bool {
        self.counts[cluster].iter().all(|&c| c == 0)
    }

    /// Whether any core of `cluster` is requested up.
    #[inline]
    pub fn cluster_up(&self, cluster: usize) -> bool {
        !self.cluster_down(cluster)
    }

    /// Adds a power-up request for `id` and returns the new state.
    pub(crate) fn get(&mut self, id: CpuId) -> Result<CoreState> {
        let count = self.refcount(id) + 1;
        let state = CoreState::of(id, count)?;
        self.counts[id.cluster()][id.cpu()] = count;
        Ok(state)
    }

    /// Drops a power-up request for `id` and returns the new state.
    pub(crate) fn put(&mut self, id: CpuId) -> Result<CoreState> {
        let count = self
            .refcount(id)
            .checked_sub(1)
            .ok_or(Violation::RefcountUnderflow { id })?;
        let state = CoreState::of(id, count)?;
        self.counts[id.cluster()][id.cpu()] = count;
        Ok(state)
    }

    /// Marks the boot core up.
    pub(crate) fn set_boot_cpu(&mut self, id: CpuId) {
        self.counts[id.cluster()][id.cpu()] = 1;
    }
}

/// The table lock.
///
/// It also orders the cluster bring-up register sequence and every access
/// to the boot descriptor.
pub(crate) struct BootLock {
    table: SpinRaw<ClusterTable>,
}

/// [`BootLock`] held with local IRQs and preemption disabled.
pub(crate) struct BootLockIrqGuard<'a> {
    // Dropped before `_irq`, so the lock is released with IRQs still off.
    table: SpinRawGuard<'a, ClusterTable>,
    _irq: NoPreemptIrqSave,
}

impl BootLock {
    pub(crate) const fn new(table: ClusterTable) -> Self {
        Self {
            table: SpinRaw::new(table),
        }
    }

    /// Acquires the lock, leaving the IRQ state alone.
    ///
    /// Callers must already run with IRQs masked.
    #[inline]
    pub(crate) fn lock(&self) -> SpinRawGuard<'_, ClusterTable> {
        self.table.lock()
    }

    /// Disables preemption and local IRQs, then acquires the lock.
    #[inline]
    pub(crate) fn lock_irq(&self) -> BootLockIrqGuard<'_> {
        let irq = NoPreemptIrqSave::new();
        BootLockIrqGuard {
            table: self.table.lock(),
            _irq: irq,
        }
    }
}

impl core::ops::Deref for BootLockIrqGuard<'_> {
    type Target = ClusterTable;

    fn deref(&self) -> &ClusterTable {
        &self.table
    }
}

impl core::ops::DerefMut for BootLockIrqGuard<'_> {
    fn deref_mut(&mut self) -> &mut ClusterTable {
        &mut self.table
    }
}
