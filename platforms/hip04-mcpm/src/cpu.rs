// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Core identity and the per-core primitives the sequencer relies on.

use core::{fmt, time::Duration};

use crate::{
    MAX_CLUSTERS, MAX_CPUS_PER_CLUSTER,
    error::{McpmError, Result},
};

/// A physical core, addressed by cluster and core index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuId {
    cluster: usize,
    cpu: usize,
}

impl CpuId {
    /// Creates a core id, checking both indices against the SoC topology.
    pub const fn new(cpu: usize, cluster: usize) -> Result<Self> {
        if cluster >= MAX_CLUSTERS || cpu >= MAX_CPUS_PER_CLUSTER {
            return Err(McpmError::InvalidArgument);
        }
        Ok(Self { cluster, cpu })
    }

    /// Decodes affinity level 0 (core) and 1 (cluster) of an MPIDR value.
    pub const fn from_mpidr(mpidr: u64) -> Result<Self> {
        let cpu = (mpidr & 0xff) as usize;
        let cluster = ((mpidr >> 8) & 0xff) as usize;
        Self::new(cpu, cluster)
    }

    /// Identity of the core executing this call.
    ///
    /// The cluster runtime uses this to name itself before calling
    /// [`Hip04Mcpm::power_down`](crate::Hip04Mcpm::power_down).
    #[cfg(target_arch = "aarch64")]
    pub fn current() -> Result<Self> {
        use aarch64_cpu::registers::{MPIDR_EL1, Readable};
        Self::from_mpidr(MPIDR_EL1.get())
    }

    /// Core index within the cluster.
    #[inline]
    pub const fn cpu(&self) -> usize {
        self.cpu
    }

    /// Cluster index.
    #[inline]
    pub const fn cluster(&self) -> usize {
        self.cluster
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster {} CPU{}", self.cluster, self.cpu)
    }
}

/// Primitives executed on the calling core.
pub trait CoreControl {
    /// Blocks the caller for at least `dur`.
    fn delay(&self, dur: Duration);

    /// Data synchronization and instruction synchronization barriers.
    fn barrier(&self);

    /// Parks the core in its low-power wait state.
    ///
    /// On hardware this returns only if the core is woken before its power
    /// is removed.
    fn wait_for_interrupt(&self);
}

/// [`CoreControl`] backed by the ARMv8 generic timer and barrier instructions.
#[cfg(target_arch = "aarch64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Aarch64Core;

#[cfg(target_arch = "aarch64")]
impl CoreControl for Aarch64Core {
    fn delay(&self, dur: Duration) {
        use aarch64_cpu::registers::{CNTFRQ_EL0, CNTPCT_EL0, Readable};

        const NANOS_PER_SEC: u128 = 1_000_000_000;
        let ticks = (dur.as_nanos() * CNTFRQ_EL0.get() as u128 / NANOS_PER_SEC) as u64;
        let start = CNTPCT_EL0.get();
        while CNTPCT_EL0.get().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }

    fn barrier(&self) {
        use aarch64_cpu::asm::barrier;

        barrier::isb(barrier::SY);
        barrier::dsb(barrier::SY);
    }

    fn wait_for_interrupt(&self) {
        aarch64_cpu::asm::wfi();
    }
}
