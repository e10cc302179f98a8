// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Configuration supplied once by the platform description.

use core::time::Duration;

use memory_addr::PhysAddr;

use crate::{
    error::{McpmError, Result},
    regs::relocation,
};

/// Boot wrapper parameters of the system controller node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    /// Physical address of the boot wrapper.
    pub bootwrapper_phys: u32,
    /// Size of the boot wrapper.
    pub bootwrapper_size: u32,
    /// Magic value the boot wrapper checks before jumping.
    pub bootwrapper_magic: u32,
    /// Physical address of the relocation block.
    pub relocation_entry: u32,
    /// Size of the relocation block.
    pub relocation_size: u32,
}

impl BootConfig {
    /// Builds the configuration from named platform properties.
    ///
    /// `lookup` returns the `u32` value of a property, or `None` if the
    /// platform does not provide it.
    pub fn from_properties(lookup: impl Fn(&str) -> Option<u32>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name).ok_or_else(|| {
                error!("failed to get {name}");
                McpmError::InvalidArgument
            })
        };
        let config = Self {
            bootwrapper_phys: get("bootwrapper-phys")?,
            bootwrapper_size: get("bootwrapper-size")?,
            bootwrapper_magic: get("bootwrapper-magic")?,
            relocation_entry: get("relocation-entry")?,
            relocation_size: get("relocation-size")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the relocation block can hold the boot descriptor.
    pub fn validate(&self) -> Result<()> {
        if (self.relocation_size as usize) < relocation::SIZE {
            error!(
                "relocation-size {:#x} is smaller than the boot descriptor",
                self.relocation_size
            );
            return Err(McpmError::InvalidArgument);
        }
        Ok(())
    }
}

/// How long a bring-up poll may spin before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollBound {
    /// Spin until the hardware responds, however long that takes.
    #[default]
    Unbounded,
    /// Read every `interval` and fail with
    /// [`McpmError::Timeout`] after `timeout`.
    Bounded {
        /// Delay between two reads.
        interval: Duration,
        /// Total time allowed.
        timeout: Duration,
    },
}

/// Delays and poll limits of the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Delay after releasing a core from reset.
    pub settle: Duration,
    /// Interval between WFI status reads in `wait_for_powerdown`.
    pub powerdown_poll: Duration,
    /// Time `wait_for_powerdown` waits for WFI.
    pub powerdown_timeout: Duration,
    /// Limit for the cluster reset release and snoop filter read-back loops.
    pub bring_up: PollBound,
}

impl Timings {
    /// 10 ms settle, WFI polled every 10 ms for 1 s, unbounded bring-up.
    pub const DEFAULT: Self = Self {
        settle: Duration::from_millis(10),
        powerdown_poll: Duration::from_millis(10),
        powerdown_timeout: Duration::from_millis(1000),
        bring_up: PollBound::Unbounded,
    };
}

impl Default for Timings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything the sequencer needs besides its register windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McpmConfig {
    /// Boot wrapper parameters.
    pub boot: BootConfig,
    /// Physical address secondary cores enter the kernel at.
    pub entry_point: PhysAddr,
    /// Delays and poll limits.
    pub timings: Timings,
}

impl McpmConfig {
    /// Creates a configuration with the default timings.
    pub fn new(boot: BootConfig, entry_point: PhysAddr) -> Self {
        Self {
            boot,
            entry_point,
            timings: Timings::DEFAULT,
        }
    }

    /// Replaces the timings.
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub(crate) fn entry_word(&self) -> Result<u32> {
        u32::try_from(self.entry_point.as_usize()).map_err(|_| {
            error!(
                "entry point {:#x} is not reachable by the boot wrapper",
                self.entry_point.as_usize()
            );
            McpmError::InvalidArgument
        })
    }
}
