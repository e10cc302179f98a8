// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Per-cluster snoop filter enable in the fabric.

use core::time::Duration;

use crate::{
    config::PollBound,
    error::{McpmError, Result},
    regs::{Mmio, fabric, wait_until},
};

/// Sets or clears the snoop filter bit of `cluster`, then reads the
/// register back until the write has landed.
///
/// Does nothing without a fabric window. Callers must hold the boot lock,
/// the register is shared by all clusters.
pub(crate) fn set_snoop_filter<M: Mmio + ?Sized>(
    io: Option<&M>,
    cluster: usize,
    enabled: bool,
    bound: PollBound,
    delay: impl FnMut(Duration),
) -> Result<()> {
    let Some(io) = io else {
        return Ok(());
    };
    let mut data = io.read32(fabric::SF_MODE);
    if enabled {
        data |= 1 << cluster;
    } else {
        data &= !(1 << cluster);
    }
    trace!("snoop filter cluster {cluster} -> {enabled} (SF_MODE={data:#x})");
    io.write32(fabric::SF_MODE, data);
    if !wait_until(io, fabric::SF_MODE, !0, data, bound, delay) {
        warn!("snoop filter of cluster {cluster} did not latch {data:#x}");
        return Err(McpmError::Timeout);
    }
    Ok(())
}

/// Whether the snoop filter bit of `cluster` is set.
pub(crate) fn snoop_filter_enabled<M: Mmio + ?Sized>(io: &M, cluster: usize) -> bool {
    io.read32(fabric::SF_MODE) & (1 << cluster) != 0
}
