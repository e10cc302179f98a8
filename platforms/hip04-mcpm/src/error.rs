// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Error types for the power sequencer.

use core::fmt;

use linux_raw_sys::errno;

use crate::cpu::CpuId;

/// Result type for power sequencing operations.
pub type Result<T> = core::result::Result<T, McpmError>;

/// Error types for power sequencing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpmError {
    /// CPU or cluster id out of range, or bad configuration.
    InvalidArgument,
    /// The register windows needed by the operation are not mapped.
    NotReady,
    /// A hardware status bit was not observed within the configured bound.
    Timeout,
    /// The power state table disagrees with the requested transition.
    ///
    /// This is never recoverable: the caller must stop driving the
    /// affected core and must not retry.
    InvariantViolation(Violation),
}

/// The broken invariant behind an [`McpmError::InvariantViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// `power_down` ran while the cluster had no active core.
    ClusterNotUp {
        /// Cluster of the calling core.
        cluster: usize,
    },
    /// A refcount would leave the `{0, 1, 2}` range going up.
    RefcountOverflow {
        /// Affected core.
        id: CpuId,
        /// The value the refcount would have reached.
        count: u8,
    },
    /// A refcount would drop below zero.
    RefcountUnderflow {
        /// Affected core.
        id: CpuId,
    },
    /// After `power_down` the core is still requested by more than one
    /// caller.
    StillRunning {
        /// Affected core.
        id: CpuId,
        /// Refcount left after the decrement.
        count: u8,
    },
    /// A caller passed ids that cannot name a core.
    CpuOutOfRange {
        /// Requested core index.
        cpu: usize,
        /// Requested cluster index.
        cluster: usize,
    },
}

impl McpmError {
    /// Whether the error is an unrecoverable fault.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }

    /// Returns the negative Linux errno matching this error.
    pub const fn errno(&self) -> i32 {
        let code = match self {
            Self::InvalidArgument => errno::EINVAL,
            Self::NotReady => errno::ENODEV,
            Self::Timeout => errno::ETIMEDOUT,
            Self::InvariantViolation(_) => errno::EFAULT,
        };
        -(code as i32)
    }
}

impl From<Violation> for McpmError {
    fn from(v: Violation) -> Self {
        Self::InvariantViolation(v)
    }
}

impl fmt::Display for McpmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::NotReady => write!(f, "Register windows not mapped"),
            Self::Timeout => write!(f, "Timed out"),
            Self::InvariantViolation(v) => write!(f, "Invariant violation: {v}"),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterNotUp { cluster } => write!(f, "cluster {cluster} is not up"),
            Self::RefcountOverflow { id, count } => {
                write!(f, "{id} refcount would reach {count}")
            }
            Self::RefcountUnderflow { id } => write!(f, "{id} refcount would go negative"),
            Self::StillRunning { id, count } => {
                write!(f, "{id} is still running (refcount {count})")
            }
            Self::CpuOutOfRange { cpu, cluster } => {
                write!(f, "cluster {cluster} CPU{cpu} is out of range")
            }
        }
    }
}
