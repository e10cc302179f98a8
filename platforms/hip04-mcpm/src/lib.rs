// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Multi-cluster power management for HiSilicon HiP04.
//!
//! The SoC has 4 clusters of 4 cores. Each cluster shares one debug/L2
//! reset domain and one snoop filter enable bit in the fabric. Each core
//! has its own core, NEON and debug resets in the system controller.
//!
//! [`Hip04Mcpm`] keeps a refcount of outstanding power-up requests per core
//! and drives these resets:
//!
//! - [`Hip04Mcpm::power_up`] publishes the boot descriptor, brings the
//!   cluster out of reset if it was idle, then releases the core.
//! - [`Hip04Mcpm::power_down`] runs on the dying core, drops its request and
//!   parks it, unless a new power-up request has already arrived.
//! - [`Hip04Mcpm::wait_for_powerdown`] runs on another core and asserts the
//!   dying core's resets once it sits in WFI.
//! - [`Hip04Mcpm::powered_up_notify`] clears the boot descriptor.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hip04_mcpm::{BootConfig, Hip04Mcpm, McpmConfig, McpmWindows, MmioRegion};
//!
//! let boot = BootConfig::from_properties(|name| sysctrl_node.read_u32(name))?;
//! let windows = McpmWindows {
//!     relocation: Some(unsafe { MmioRegion::new(reloc_va, boot.relocation_size as usize) }),
//!     sysctrl: Some(unsafe { MmioRegion::new(sysctrl_va, SYSCTRL_SIZE) }),
//!     fabric: Some(unsafe { MmioRegion::new(fabric_va, FABRIC_SIZE) }),
//! };
//! let mcpm = Hip04Mcpm::new(
//!     McpmConfig::new(boot, entry_paddr),
//!     windows,
//!     Aarch64Core,
//!     MPIDR_EL1.get(),
//! )?;
//! mcpm.power_up(1, 0)?;
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

pub mod config;
pub mod cpu;
pub mod error;
pub mod regs;
pub mod runtime;
mod sequencer;
mod snoop;
pub mod table;


#[cfg(target_arch = "aarch64")]
pub use cpu::Aarch64Core;
pub use config::{BootConfig, McpmConfig, PollBound, Timings};
pub use cpu::{CoreControl, CpuId};
pub use error::{McpmError, Result, Violation};
pub use regs::{Mmio, MmioRegion};
pub use runtime::{
    ClusterRuntime, FlushLevel, ParkOutcome, PowerOps, platform_ops, register_platform,
};
pub use sequencer::{Hip04Mcpm, McpmWindows};
pub use table::{ClusterTable, CoreState};

/// Number of clusters.
pub const MAX_CLUSTERS: usize = 4;

/// Number of cores in a cluster.
pub const MAX_CPUS_PER_CLUSTER: usize = 4;
