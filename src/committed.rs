use std::sync::Arc;

use log::{debug, warn};

use crate::common::FftNum;
use crate::config::DeviceInfo;
use crate::descriptor::{Addressing, Descriptor};
use crate::engine::{
    batches_per_group, partition_batches, Completion, ExecutionContext, ExecutionGraph, GraphParams,
};
use crate::error::{DeviceError, FftError, PlanningError};
use crate::factorizer::{Decomposition, LengthFactorizer};
use crate::queue::{Bindings, BufferRef, Queue, View};
use crate::twiddle_factory::TwiddleFactory;
use crate::{ComplexStorage, Domain, FftDirection, Placement};

/// The caller's buffers for one execution. Interleaved buffers hold `[re, im]` pairs, split
/// buffers hold one plane each. Real-domain data is always one scalar per element.
pub enum Io<'a, T> {
    OutOfPlace {
        input: &'a [T],
        output: &'a mut [T],
    },
    InPlace(&'a mut [T]),
    SplitOutOfPlace {
        input_re: &'a [T],
        input_im: &'a [T],
        output_re: &'a mut [T],
        output_im: &'a mut [T],
    },
    SplitInPlace {
        re: &'a mut [T],
        im: &'a mut [T],
    },
}

impl<'a, T> Io<'a, T> {
    fn storage(&self) -> ComplexStorage {
        match self {
            Io::OutOfPlace { .. } | Io::InPlace(_) => ComplexStorage::Interleaved,
            Io::SplitOutOfPlace { .. } | Io::SplitInPlace { .. } => ComplexStorage::Split,
        }
    }

    fn placement(&self) -> Placement {
        match self {
            Io::InPlace(_) | Io::SplitInPlace { .. } => Placement::InPlace,
            Io::OutOfPlace { .. } | Io::SplitOutOfPlace { .. } => Placement::OutOfPlace,
        }
    }
}

/// A descriptor planned for one device, with its twiddle factors computed.
///
/// A `Committed` can be cloned cheaply and used from any number of threads; every execution
/// brings its own [`ExecutionContext`].
#[derive(Clone, Debug)]
pub struct Committed<T> {
    descriptor: Descriptor,
    device: DeviceInfo,
    decomposition: Decomposition,
    twiddles: Arc<[T]>,
    batches_per_group: usize,
}

impl<T: FftNum> Committed<T> {
    pub(crate) fn new(descriptor: Descriptor, device: DeviceInfo) -> Result<Self, FftError> {
        descriptor.validate()?;
        let mut decomposition = LengthFactorizer::new(device).decompose(descriptor.length)?;
        let num_transforms = descriptor.number_of_transforms;

        let batches_per_group = if decomposition.is_direct() {
            num_transforms
        } else {
            let per_batch_bytes = 2 * decomposition.padded_len * std::mem::size_of::<T>();
            if per_batch_bytes > device.residency_bytes {
                warn!(
                    "one transform of length {} needs {} bytes, more than the {} byte residency budget",
                    decomposition.padded_len, per_batch_bytes, device.residency_bytes
                );
            }
            batches_per_group(device.residency_bytes, per_batch_bytes, num_transforms)
        };

        let twiddles = TwiddleFactory::new(device).build::<T>(
            &mut decomposition,
            batches_per_group,
            num_transforms,
        )?;

        debug!(
            "committed length {} at {:?} level: factors {:?}, padded length {}{}, {} transforms per group",
            descriptor.length,
            decomposition.level,
            decomposition.factor_lens(),
            decomposition.padded_len,
            if decomposition.bluestein { " (bluestein)" } else { "" },
            batches_per_group
        );

        Ok(Self {
            descriptor,
            device,
            decomposition,
            twiddles: Arc::from(twiddles),
            batches_per_group,
        })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn twiddles(&self) -> &[T] {
        &self.twiddles
    }

    /// Scalars in the twiddle buffer.
    pub fn twiddle_len(&self) -> usize {
        self.twiddles.len()
    }

    /// Transforms processed together in one pass over the factor chain.
    pub fn batches_per_group(&self) -> usize {
        self.batches_per_group
    }

    pub fn num_batch_groups(&self) -> usize {
        if self.decomposition.is_direct() {
            1
        } else {
            partition_batches(self.descriptor.number_of_transforms, self.batches_per_group).len()
        }
    }

    fn region_len(&self) -> usize {
        if self.decomposition.is_direct() {
            0
        } else {
            2 * self.decomposition.padded_len * self.batches_per_group
        }
    }

    /// Scalars of scratch memory one execution needs, across both regions.
    pub fn scratch_len(&self) -> usize {
        2 * self.region_len()
    }

    /// Allocates the scratch memory for one execution.
    pub fn new_context(&self) -> Result<ExecutionContext<T>, FftError> {
        ExecutionContext::new(self.region_len())
    }

    fn graph_params(&self, direction: FftDirection) -> GraphParams<'_> {
        let (input, output) = self.descriptor.layouts(direction);
        let (input_kind, output_kind) = self.descriptor.kinds(direction);
        let view = |buffer, addressing: Addressing, kind| View {
            buffer,
            offset: addressing.offset,
            stride: addressing.stride,
            distance: addressing.distance,
            kind,
        };
        GraphParams {
            decomposition: &self.decomposition,
            direction,
            storage: self.descriptor.complex_storage,
            input: view(BufferRef::Input, input, input_kind),
            output: view(BufferRef::Output, output, output_kind),
            num_transforms: self.descriptor.number_of_transforms,
            batches_per_group: self.batches_per_group,
            scale: self.descriptor.scale(direction),
        }
    }

    /// The operations an execution in `direction` issues, without running them.
    pub fn build_graph(&self, direction: FftDirection) -> ExecutionGraph {
        ExecutionGraph::build(&self.graph_params(direction))
    }

    /// Scalars a buffer (or each plane of a split buffer) needs for data of `kind`.
    fn required_len(&self, addressing: Addressing, kind: Domain) -> Result<usize, FftError> {
        self.descriptor
            .required_scalars(addressing, kind)
            .ok_or(FftError::InternalConsistency(
                "buffer extent overflow passed descriptor validation",
            ))
    }

    fn check_len(name: &'static str, actual: usize, required: usize) -> Result<(), FftError> {
        if actual < required {
            return Err(DeviceError::BufferTooSmall {
                name,
                required,
                actual,
            }
            .into());
        }
        Ok(())
    }

    fn validate_io(&self, direction: FftDirection, io: &Io<'_, T>) -> Result<(), FftError> {
        if io.storage() != self.descriptor.complex_storage {
            return Err(PlanningError::InvalidDescriptor(format!(
                "buffers use {:?} storage, but the descriptor was committed for {:?}",
                io.storage(),
                self.descriptor.complex_storage
            ))
            .into());
        }
        if io.placement() != self.descriptor.placement {
            return Err(PlanningError::InvalidDescriptor(format!(
                "buffers are {:?}, but the descriptor was committed {:?}",
                io.placement(),
                self.descriptor.placement
            ))
            .into());
        }

        let (input, output) = self.descriptor.layouts(direction);
        let (input_kind, output_kind) = self.descriptor.kinds(direction);
        let input_len = self.required_len(input, input_kind)?;
        let output_len = self.required_len(output, output_kind)?;
        // the imaginary plane of real data is never touched
        let plane_len = |len: usize, kind: Domain| if kind == Domain::Real { 0 } else { len };

        match io {
            Io::OutOfPlace { input, output } => {
                Self::check_len("input", input.len(), input_len)?;
                Self::check_len("output", output.len(), output_len)
            }
            Io::InPlace(buffer) => Self::check_len("output", buffer.len(), input_len.max(output_len)),
            Io::SplitOutOfPlace {
                input_re,
                input_im,
                output_re,
                output_im,
            } => {
                Self::check_len("input", input_re.len(), input_len)?;
                Self::check_len("input", input_im.len(), plane_len(input_len, input_kind))?;
                Self::check_len("output", output_re.len(), output_len)?;
                Self::check_len("output", output_im.len(), plane_len(output_len, output_kind))
            }
            Io::SplitInPlace { re, im } => {
                let len = input_len.max(output_len);
                Self::check_len("output", re.len(), len)?;
                Self::check_len("output", im.len(), len)
            }
        }
    }

    /// Runs one transform of every batch in `direction`, using the scratch memory of `context`.
    ///
    /// Errors detected before any work is issued are returned directly. Failures of issued
    /// operations are reported by [`Completion::wait`].
    pub fn compute_with_context<Q: Queue>(
        &self,
        queue: &mut Q,
        context: &mut ExecutionContext<T>,
        direction: FftDirection,
        io: Io<'_, T>,
    ) -> Result<Completion, FftError> {
        self.validate_io(direction, &io)?;
        Self::check_len("scratch", context.scratch_len(), self.scratch_len())?;

        let twiddles = &self.twiddles[..];
        let scratch = context.scratch_mut();
        let mut bindings = match io {
            Io::OutOfPlace { input, output } => {
                Bindings::interleaved(Some(input), output, scratch, twiddles)
            }
            Io::InPlace(buffer) => Bindings::interleaved(None, buffer, scratch, twiddles),
            Io::SplitOutOfPlace {
                input_re,
                input_im,
                output_re,
                output_im,
            } => Bindings::split(
                Some((input_re, input_im)),
                (output_re, output_im),
                scratch,
                twiddles,
            ),
            Io::SplitInPlace { re, im } => Bindings::split(None, (re, im), scratch, twiddles),
        };

        self.build_graph(direction).submit(queue, &mut bindings)
    }

    fn compute<Q: Queue>(
        &self,
        queue: &mut Q,
        direction: FftDirection,
        io: Io<'_, T>,
    ) -> Result<Completion, FftError> {
        let mut context = self.new_context()?;
        self.compute_with_context(queue, &mut context, direction, io)
    }

    /// Forward transform of interleaved data from `input` into `output`.
    pub fn compute_forward<Q: Queue>(
        &self,
        queue: &mut Q,
        input: &[T],
        output: &mut [T],
    ) -> Result<Completion, FftError> {
        self.compute(queue, FftDirection::Forward, Io::OutOfPlace { input, output })
    }

    /// Backward transform of interleaved data from `input` into `output`.
    pub fn compute_backward<Q: Queue>(
        &self,
        queue: &mut Q,
        input: &[T],
        output: &mut [T],
    ) -> Result<Completion, FftError> {
        self.compute(queue, FftDirection::Inverse, Io::OutOfPlace { input, output })
    }

    pub fn compute_forward_inplace<Q: Queue>(
        &self,
        queue: &mut Q,
        buffer: &mut [T],
    ) -> Result<Completion, FftError> {
        self.compute(queue, FftDirection::Forward, Io::InPlace(buffer))
    }

    pub fn compute_backward_inplace<Q: Queue>(
        &self,
        queue: &mut Q,
        buffer: &mut [T],
    ) -> Result<Completion, FftError> {
        self.compute(queue, FftDirection::Inverse, Io::InPlace(buffer))
    }

    /// Forward transform of split data.
    pub fn compute_forward_split<Q: Queue>(
        &self,
        queue: &mut Q,
        input_re: &[T],
        input_im: &[T],
        output_re: &mut [T],
        output_im: &mut [T],
    ) -> Result<Completion, FftError> {
        let io = Io::SplitOutOfPlace {
            input_re,
            input_im,
            output_re,
            output_im,
        };
        self.compute(queue, FftDirection::Forward, io)
    }

    /// Backward transform of split data.
    pub fn compute_backward_split<Q: Queue>(
        &self,
        queue: &mut Q,
        input_re: &[T],
        input_im: &[T],
        output_re: &mut [T],
        output_im: &mut [T],
    ) -> Result<Completion, FftError> {
        let io = Io::SplitOutOfPlace {
            input_re,
            input_im,
            output_re,
            output_im,
        };
        self.compute(queue, FftDirection::Inverse, io)
    }

    pub fn compute_forward_split_inplace<Q: Queue>(
        &self,
        queue: &mut Q,
        re: &mut [T],
        im: &mut [T],
    ) -> Result<Completion, FftError> {
        self.compute(queue, FftDirection::Forward, Io::SplitInPlace { re, im })
    }

    pub fn compute_backward_split_inplace<Q: Queue>(
        &self,
        queue: &mut Q,
        re: &mut [T],
        im: &mut [T],
    ) -> Result<Completion, FftError> {
        self.compute(queue, FftDirection::Inverse, Io::SplitInPlace { re, im })
    }
}
