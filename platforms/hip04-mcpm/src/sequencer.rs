// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! The power sequencer.

use crate::{
    MAX_CLUSTERS,
    config::McpmConfig,
    cpu::{CoreControl, CpuId},
    error::{McpmError, Result, Violation},
    regs::{Mmio, ResetBits, ResetStatus, poll_until, relocation, sysctrl, wait_until},
    runtime::{ClusterRuntime, FlushLevel, ParkOutcome, PowerOps},
    snoop,
    table::{BootLock, ClusterTable, CoreState},
};

/// The register windows of the sequencer. A window that is not mapped is
/// `None`.
#[derive(Debug)]
pub struct McpmWindows<M> {
    /// Boot relocation block.
    pub relocation: Option<M>,
    /// System controller.
    pub sysctrl: Option<M>,
    /// Fabric. Snoop filter control is skipped without it.
    pub fabric: Option<M>,
}

/// Power sequencer of a HiP04 SoC.
///
/// Owns the power state table, its lock and the register windows. Build it
/// once at boot with [`Hip04Mcpm::new`].
pub struct Hip04Mcpm<M, C> {
    config: McpmConfig,
    entry: u32,
    windows: McpmWindows<M>,
    core: C,
    lock: BootLock,
}

impl<M: Mmio, C: CoreControl> Hip04Mcpm<M, C> {
    /// Creates the sequencer with the boot core, identified by its MPIDR,
    /// marked up and its cluster's snoop filter enabled.
    pub fn new(
        config: McpmConfig,
        windows: McpmWindows<M>,
        core: C,
        boot_mpidr: u64,
    ) -> Result<Self> {
        config.boot.validate()?;
        let entry = config.entry_word()?;
        let boot_cpu = CpuId::from_mpidr(boot_mpidr).inspect_err(|_| {
            error!("boot CPU is out of bound (MPIDR {boot_mpidr:#x})");
        })?;

        let mcpm = Self {
            config,
            entry,
            windows,
            core,
            lock: BootLock::new(ClusterTable::new()),
        };
        {
            let mut table = mcpm.lock.lock_irq();
            mcpm.write_snoop_filter(boot_cpu.cluster(), true)?;
            table.set_boot_cpu(boot_cpu);
        }
        info!("HiP04 MCPM initialized, boot CPU is {boot_cpu}");
        Ok(mcpm)
    }

    /// Requests `cpu` of `cluster` to run.
    ///
    /// The first core of a cluster also takes the cluster out of reset and
    /// enables its snoop filter. Returns after the settle delay.
    pub fn power_up(&self, cpu: usize, cluster: usize) -> Result<()> {
        let id = CpuId::new(cpu, cluster)?;
        let (Some(reloc), Some(ctrl)) = (&self.windows.relocation, &self.windows.sysctrl)
        else {
            return Err(McpmError::NotReady);
        };

        {
            let mut table = self.lock.lock_irq();
            let cluster_was_down = table.cluster_down(cluster);
            let state = table.get(id).inspect_err(|e| error!("{id}: {e}"))?;

            self.write_boot_descriptor(reloc);
            if cluster_was_down {
                if let Err(e) = self.bring_up_cluster(ctrl, cluster) {
                    table.put(id)?;
                    return Err(e);
                }
            }
            ctrl.write32(sysctrl::reset_dreq(cluster), ResetBits::core(cpu).bits());
            debug!("{id} released from reset ({state:?})");
        }

        self.core.delay(self.config.timings.settle);
        Ok(())
    }

    /// Takes the calling core `id` down.
    ///
    /// Unless a power-up request for `id` overtook this call, the core parks
    /// in wait-for-interrupt until its power is removed. An
    /// [`McpmError::InvariantViolation`] leaves the core running and must
    /// not be retried.
    ///
    /// Must be called with local IRQs disabled.
    pub fn power_down(&self, id: CpuId, runtime: &dyn ClusterRuntime) -> Result<ParkOutcome> {
        runtime.going_down(id);

        let (skip_park, last_man) = {
            let mut table = self.lock.lock();
            if table.cluster_down(id.cluster()) {
                let violation = Violation::ClusterNotUp {
                    cluster: id.cluster(),
                };
                error!("{id}: {violation}");
                return Err(violation.into());
            }
            let skip_park = match table.put(id).inspect_err(|e| error!("{id}: {e}"))? {
                CoreState::Down => false,
                CoreState::Up => {
                    debug!("{id}: a power up request went ahead of us");
                    true
                }
                CoreState::Race => {
                    let violation = Violation::StillRunning { id, count: 2 };
                    error!("{violation}");
                    return Err(violation.into());
                }
            };
            (skip_park, table.cluster_down(id.cluster()))
        };

        let level = if last_man {
            FlushLevel::All
        } else {
            FlushLevel::Louis
        };
        runtime.flush(id, level);
        if last_man {
            self.disable_idle_snoop_filter(id.cluster());
        }
        runtime.cpu_down(id);

        self.core.barrier();
        if skip_park {
            return Ok(ParkOutcome::Skipped);
        }
        debug!("{id} parking");
        self.core.wait_for_interrupt();
        Ok(ParkOutcome::Parked)
    }

    /// Waits for `cpu` of `cluster` to reach WFI, then asserts its resets.
    ///
    /// Ids out of range are a caller bug and reported as
    /// [`McpmError::InvariantViolation`].
    pub fn wait_for_powerdown(&self, cpu: usize, cluster: usize) -> Result<()> {
        let id = CpuId::new(cpu, cluster).map_err(|_| {
            let violation = Violation::CpuOutOfRange { cpu, cluster };
            error!("wait_for_powerdown: {violation}");
            McpmError::from(violation)
        })?;
        let ctrl = self.windows.sysctrl.as_ref().ok_or(McpmError::NotReady)?;
        let timings = &self.config.timings;
        let wfi = ResetStatus::wfi(cpu).bits();

        if !poll_until(
            ctrl,
            sysctrl::reset_status(cluster),
            wfi,
            wfi,
            timings.powerdown_poll,
            timings.powerdown_timeout,
            |d| self.core.delay(d),
        ) {
            warn!("{id} did not reach WFI within {:?}", timings.powerdown_timeout);
            return Err(McpmError::Timeout);
        }

        // Issued without the boot lock: two monitors of the same core may
        // both write it.
        ctrl.write32(sysctrl::reset_req(cluster), ResetBits::core(cpu).bits());
        debug!("{id} held in reset");
        Ok(())
    }

    /// Clears the boot descriptor once a core has come up, so a later
    /// power-up cannot reuse a stale entry point.
    pub fn powered_up_notify(&self) {
        let Some(reloc) = &self.windows.relocation else {
            return;
        };
        let _table = self.lock.lock();
        for offset in [
            relocation::TARGET,
            relocation::MAGIC,
            relocation::ENTRY,
            relocation::RESERVED,
        ] {
            reloc.write32(offset, 0);
        }
    }

    /// Sets or clears the snoop filter of `cluster` under the boot lock.
    pub fn set_snoop_filter(&self, cluster: usize, enabled: bool) -> Result<()> {
        if cluster >= MAX_CLUSTERS {
            return Err(McpmError::InvalidArgument);
        }
        let _table = self.lock.lock_irq();
        self.write_snoop_filter(cluster, enabled)
    }

    /// Whether the snoop filter of `cluster` is enabled, or `None` without
    /// a fabric window.
    pub fn snoop_enabled(&self, cluster: usize) -> Option<bool> {
        let fabric = self.windows.fabric.as_ref()?;
        Some(snoop::snoop_filter_enabled(fabric, cluster))
    }

    /// A copy of the power state table.
    pub fn cluster_table(&self) -> ClusterTable {
        *self.lock.lock_irq()
    }

    /// The configuration the sequencer was built with.
    pub fn config(&self) -> &McpmConfig {
        &self.config
    }

    fn write_boot_descriptor(&self, reloc: &M) {
        let boot = &self.config.boot;
        reloc.write32(relocation::TARGET, boot.bootwrapper_phys);
        reloc.write32(relocation::MAGIC, boot.bootwrapper_magic);
        reloc.write32(relocation::ENTRY, self.entry);
        reloc.write32(relocation::RESERVED, 0);
    }

    fn bring_up_cluster(&self, ctrl: &M, cluster: usize) -> Result<()> {
        trace!("cluster {cluster}: releasing debug reset");
        ctrl.write32(
            sysctrl::reset_dreq(cluster),
            ResetBits::CLUSTER_DEBUG.bits(),
        );
        if !wait_until(
            ctrl,
            sysctrl::reset_status(cluster),
            ResetStatus::CLUSTER_DEBUG.bits(),
            0,
            self.config.timings.bring_up,
            |d| self.core.delay(d),
        ) {
            warn!("cluster {cluster}: debug reset did not clear");
            return Err(McpmError::Timeout);
        }
        self.write_snoop_filter(cluster, true)
    }

    fn disable_idle_snoop_filter(&self, cluster: usize) {
        let table = self.lock.lock();
        // A power-up may have claimed the cluster since the last check.
        if table.cluster_up(cluster) {
            return;
        }
        if let Err(e) = self.write_snoop_filter(cluster, false) {
            warn!("cluster {cluster}: snoop filter left enabled: {e}");
        }
    }

    /// Caller holds the boot lock.
    fn write_snoop_filter(&self, cluster: usize, enabled: bool) -> Result<()> {
        snoop::set_snoop_filter(
            self.windows.fabric.as_ref(),
            cluster,
            enabled,
            self.config.timings.bring_up,
            |d| self.core.delay(d),
        )
    }
}

impl<M, C> PowerOps for Hip04Mcpm<M, C>
where
    M: Mmio + Send + Sync,
    C: CoreControl + Send + Sync,
{
    fn power_up(&self, cpu: usize, cluster: usize) -> Result<()> {
        Hip04Mcpm::power_up(self, cpu, cluster)
    }

    fn power_down(&self, id: CpuId, runtime: &dyn ClusterRuntime) -> Result<ParkOutcome> {
        Hip04Mcpm::power_down(self, id, runtime)
    }

    fn wait_for_powerdown(&self, cpu: usize, cluster: usize) -> Result<()> {
        Hip04Mcpm::wait_for_powerdown(self, cpu, cluster)
    }

    fn powered_up(&self) {
        self.powered_up_notify()
    }
}
