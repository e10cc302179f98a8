// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Interfaces between the sequencer and the cluster runtime.

use lazyinit::LazyInit;

use crate::{
    cpu::CpuId,
    error::{McpmError, Result},
};

/// Cache levels a dying core must clean before leaving coherency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushLevel {
    /// Up to the level of unification inner shareable. Used while other
    /// cores of the cluster stay up.
    Louis,
    /// All levels, including the cluster L2. Used by the last core of a
    /// cluster.
    All,
}

/// How [`PowerOps::power_down`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkOutcome {
    /// The core executed its wait-for-interrupt and was woken again.
    Parked,
    /// A power-up request for this core arrived while it was going down,
    /// so it never parked.
    Skipped,
}

/// Hooks of the cluster runtime that `power_down` calls in order.
pub trait ClusterRuntime {
    /// The core is about to go down. Called before the boot lock is taken.
    fn going_down(&self, id: CpuId);

    /// Clean caches and leave coherency.
    fn flush(&self, id: CpuId, level: FlushLevel);

    /// The core is out of coherency and about to park.
    fn cpu_down(&self, id: CpuId);
}

/// Power operations a platform provides to the cluster runtime.
pub trait PowerOps: Send + Sync {
    /// Requests `cpu` of `cluster` to run.
    fn power_up(&self, cpu: usize, cluster: usize) -> Result<()>;

    /// Takes the calling core `id` down and parks it.
    fn power_down(&self, id: CpuId, runtime: &dyn ClusterRuntime) -> Result<ParkOutcome>;

    /// Waits for `cpu` of `cluster` to park, then holds it in reset.
    fn wait_for_powerdown(&self, cpu: usize, cluster: usize) -> Result<()>;

    /// Tells the platform the calling core finished coming up.
    fn powered_up(&self);
}

static PLATFORM_OPS: LazyInit<&'static dyn PowerOps> = LazyInit::new();

/// Installs the platform power operations. Only the first call succeeds.
pub fn register_platform(ops: &'static dyn PowerOps) -> Result<()> {
    if PLATFORM_OPS.call_once(|| ops).is_none() {
        error!("platform power operations already registered");
        return Err(McpmError::InvalidArgument);
    }
    info!("platform power operations registered");
    Ok(())
}

/// The registered platform power operations, if any.
pub fn platform_ops() -> Option<&'static dyn PowerOps> {
    PLATFORM_OPS.get().copied()
}
