#![allow(clippy::needless_range_loop)]

//! devfft plans and executes batched discrete Fourier transforms for parallel compute devices.
//!
//! The interesting work happens at commit time: a transform length is factored into a chain of
//! sub-transforms, each assigned to a level of the device's parallelism hierarchy (a single
//! work-item, a subgroup, a workgroup, or a chain of independently dispatched kernels with
//! transposes in between). Lengths with prime factors too large for any kernel are padded with
//! Bluestein's algorithm. Every twiddle factor used by any stage is precomputed into one
//! contiguous buffer that is shared by every subsequent execution.
//!
//! At execution time, the plan is replayed as a dependency graph of device operations and
//! submitted to a [`Queue`]. The crate ships [`HostQueue`], which runs every operation eagerly
//! on the host and is used as the reference backend.
//!
//! ### Usage
//!
//! ```
//! use devfft::{Descriptor, DeviceInfo, HostQueue};
//!
//! let mut desc = Descriptor::new(1234);
//! desc.number_of_transforms = 4;
//! let committed = desc.commit::<f32>(&DeviceInfo::default()).unwrap();
//!
//! // interleaved complex data: [re, im, re, im, ...]
//! let input = vec![0.0f32; 2 * 1234 * 4];
//! let mut output = vec![0.0f32; 2 * 1234 * 4];
//!
//! let mut queue = HostQueue::new();
//! let done = committed.compute_forward(&mut queue, &input, &mut output).unwrap();
//! done.wait(&mut queue).unwrap();
//! ```
//!
//! ### Normalization
//!
//! Transforms are not normalized unless the descriptor's `forward_scale` or `backward_scale` is
//! set. A forward transform followed by a backward transform multiplies every element by the
//! transform length.

pub use num_complex;
pub use num_traits;

use std::fmt::Display;

mod bluestein;
mod committed;
mod common;
mod config;
mod descriptor;
mod engine;
mod error;
mod factorizer;
mod graph;
mod host;
mod launch;
mod math_utils;
mod queue;
mod transpose;
mod twiddle_factory;
mod twiddles;

#[cfg(test)]
mod test_utils;

pub use crate::bluestein::{padded_len, BluesteinExpander};
pub use crate::committed::{Committed, Io};
pub use crate::common::FftNum;
pub use crate::config::DeviceInfo;
pub use crate::descriptor::{Addressing, Descriptor};
pub use crate::engine::{
    batches_per_group, partition_batches, Completion, ExecutionContext, ExecutionGraph,
};
pub use crate::error::{DeviceError, FftError, PlanningError};
pub use crate::factorizer::{Decomposition, Factor, LengthFactorizer, MAX_LENGTH};
pub use crate::graph::{DependencyGraph, NodeId};
pub use crate::host::HostQueue;
pub use crate::launch::{launch_params, local_mem_required, LaunchParams};
pub use crate::math_utils::MAX_SUPPORTED_PRIME;
pub use crate::queue::{
    Bindings, BufferRef, Component, ComputeOp, Event, ModulateOp, ModulateStage, Op, Plane, Queue,
    TransposeOp, View,
};
pub use crate::transpose::{complex_transpose, scalar_transpose, transpose_index};
pub use crate::twiddle_factory::TwiddleFactory;

/// Represents a FFT direction, IE a forward FFT or an inverse FFT
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum FftDirection {
    Forward,
    Inverse,
}
impl Display for FftDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => f.write_str("Forward"),
            Self::Inverse => f.write_str("Inverse"),
        }
    }
}

/// The numeric domain of the time-domain signal.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Domain {
    Complex,
    /// Real input for forward transforms, real output for backward transforms.
    /// The frequency domain always holds the full complex spectrum.
    Real,
}

/// How complex values are stored in caller and scratch buffers.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ComplexStorage {
    /// One buffer of `[re, im, re, im, ...]` pairs.
    Interleaved,
    /// Two buffers, one holding real parts and one holding imaginary parts.
    Split,
}

/// Whether a transform overwrites its input.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Placement {
    InPlace,
    OutOfPlace,
}

/// The granularity of device parallelism a factor executes at.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub enum Level {
    /// One lane computes a whole sub-transform in registers.
    WorkItem,
    /// A subgroup cooperates on one sub-transform, `sg x wi` elements.
    Subgroup,
    /// A workgroup computes one sub-transform through local memory, `n x m` elements.
    Workgroup,
    /// The transform does not fit any single kernel and runs as a chain of kernels with
    /// transposes in between.
    Global,
}

/// Data layout of one stage of the factor chain.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Layout {
    /// The elements of each sub-transform are contiguous.
    Packed,
    /// Element `n` of every sub-transform is stored together, so consecutive sub-transforms are
    /// adjacent in memory and each sub-transform is strided by the sub-batch count.
    BatchInterleaved,
}
