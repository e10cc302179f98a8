// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Register windows used by the sequencer.
//!
//! Three windows are involved:
//!
//! - the boot relocation block, a 16-byte scratch area read by the boot
//!   wrapper of a core coming out of reset;
//! - the system controller, holding one reset request/release/status triple
//!   per cluster;
//! - the fabric, holding the snoop filter mode register.

use core::time::Duration;

use memory_addr::VirtAddr;

use crate::config::PollBound;

/// Offsets within the boot relocation block.
pub mod relocation {
    /// Physical address the boot wrapper jumps through.
    pub const TARGET: usize = 0x0;
    /// Boot wrapper magic.
    pub const MAGIC: usize = 0x4;
    /// Secondary entry point.
    pub const ENTRY: usize = 0x8;
    /// Always zero.
    pub const RESERVED: usize = 0xc;
    /// Bytes covered by the descriptor.
    pub const SIZE: usize = 0x10;
}

/// Offsets within the system controller.
pub mod sysctrl {
    /// `SC_CPU_RESET_REQ`: writing a set bit asserts that reset.
    #[inline]
    pub const fn reset_req(cluster: usize) -> usize {
        0x520 + (cluster << 3)
    }

    /// `SC_CPU_RESET_DREQ`: writing a set bit releases that reset.
    #[inline]
    pub const fn reset_dreq(cluster: usize) -> usize {
        0x524 + (cluster << 3)
    }

    /// `SC_CPU_RESET_STATUS`: a set bit means still in reset.
    #[inline]
    pub const fn reset_status(cluster: usize) -> usize {
        0x1520 + (cluster << 3)
    }
}

/// Offsets within the fabric.
pub mod fabric {
    /// Snoop filter mode, one enable bit per cluster.
    pub const SF_MODE: usize = 0x0c;
}

bitflags::bitflags! {
    /// Bit layout shared by `SC_CPU_RESET_REQ` and `SC_CPU_RESET_DREQ`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResetBits: u32 {
        /// Cluster L2 reset.
        const CLUSTER_L2 = 1 << 8;
        /// Cluster debug reset.
        const CLUSTER_DEBUG = 1 << 13;

        const _ = !0;
    }
}

impl ResetBits {
    /// Core, NEON and core debug resets of one core, written together.
    #[inline]
    pub const fn core(cpu: usize) -> Self {
        Self::from_bits_retain((1 << cpu) | (1 << (cpu + 4)) | (1 << (cpu + 9)))
    }
}

bitflags::bitflags! {
    /// Bit layout of `SC_CPU_RESET_STATUS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResetStatus: u32 {
        /// Cluster L2 still in reset.
        const CLUSTER_L2 = 1 << 8;
        /// Cluster debug logic still in reset.
        const CLUSTER_DEBUG = 1 << 13;

        const _ = !0;
    }
}

impl ResetStatus {
    /// Core, NEON and core debug of one core still in reset.
    #[inline]
    pub const fn core_in_reset(cpu: usize) -> Self {
        Self::from_bits_retain((1 << cpu) | (1 << (cpu + 4)) | (1 << (cpu + 9)))
    }

    /// The core sits in WFI.
    #[inline]
    pub const fn wfi(cpu: usize) -> Self {
        Self::from_bits_retain(1 << (cpu + 16))
    }

    /// The core sits in WFE.
    #[inline]
    pub const fn wfe(cpu: usize) -> Self {
        Self::from_bits_retain(1 << (cpu + 20))
    }

    /// Debug acknowledge of the core.
    #[inline]
    pub const fn debug_ack(cpu: usize) -> Self {
        Self::from_bits_retain(1 << (cpu + 24))
    }
}

/// A window of 32-bit device registers.
///
/// Every call must reach the device: implementations may not cache, merge
/// or reorder accesses.
pub trait Mmio {
    /// Reads the register at `offset` bytes into the window.
    fn read32(&self, offset: usize) -> u32;

    /// Writes the register at `offset` bytes into the window.
    fn write32(&self, offset: usize, value: u32);
}

impl<T: Mmio + ?Sized> Mmio for &T {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// A mapped device window accessed with volatile loads and stores.
#[derive(Debug)]
pub struct MmioRegion {
    base: VirtAddr,
    size: usize,
}

impl MmioRegion {
    /// Wraps an already mapped window.
    ///
    /// # Safety
    ///
    /// `base..base + size` must be mapped as device memory for the lifetime
    /// of the region and must not be accessed through any other path.
    pub const unsafe fn new(base: VirtAddr, size: usize) -> Self {
        Self { base, size }
    }

    /// Virtual base address of the window.
    pub const fn base(&self) -> VirtAddr {
        self.base
    }

    /// Size of the window in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn reg(&self, offset: usize) -> *mut u32 {
        debug_assert!(offset + 4 <= self.size, "offset {offset:#x} outside window");
        (self.base.as_usize() + offset) as *mut u32
    }
}

impl Mmio for MmioRegion {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        unsafe { self.reg(offset).read_volatile() }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        unsafe { self.reg(offset).write_volatile(value) }
    }
}

/// Number of reads [`poll_until`] performs for the given interval and
/// timeout. Always at least one.
pub fn poll_attempts(interval: Duration, timeout: Duration) -> u64 {
    if interval.is_zero() {
        return 1;
    }
    (timeout.as_nanos() / interval.as_nanos()).clamp(1, u64::MAX as u128) as u64
}

/// Reads `offset` until `value & mask == target`, waiting `interval`
/// between reads, for at most `timeout`.
///
/// Returns whether the condition was observed.
pub fn poll_until<M: Mmio + ?Sized>(
    io: &M,
    offset: usize,
    mask: u32,
    target: u32,
    interval: Duration,
    timeout: Duration,
    mut delay: impl FnMut(Duration),
) -> bool {
    for _ in 0..poll_attempts(interval, timeout) {
        if io.read32(offset) & mask == target {
            return true;
        }
        delay(interval);
    }
    false
}

/// Like [`poll_until`], but bounded by a [`PollBound`].
///
/// With [`PollBound::Unbounded`] this spins without delay and only returns
/// once the condition holds.
pub fn wait_until<M: Mmio + ?Sized>(
    io: &M,
    offset: usize,
    mask: u32,
    target: u32,
    bound: PollBound,
    delay: impl FnMut(Duration),
) -> bool {
    match bound {
        PollBound::Unbounded => {
            while io.read32(offset) & mask != target {
                core::hint::spin_loop();
            }
            true
        }
        PollBound::Bounded { interval, timeout } => {
            poll_until(io, offset, mask, target, interval, timeout, delay)
        }
    }
}
