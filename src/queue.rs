use num_complex::Complex;

use crate::common::FftNum;
use crate::error::DeviceError;
use crate::factorizer::Factor;
use crate::{ComplexStorage, Domain, FftDirection, Layout};

/// Completion handle of one submitted operation.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Event(pub u64);

/// The buffer a [`View`] addresses.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum BufferRef {
    /// The caller's input. Resolves to the output when executing in place.
    Input,
    Output,
    /// One of the two regions of the execution's scratch arena.
    Scratch(usize),
}

/// Batched strided addressing into a buffer. Element `e` of transform `b` lives at
/// `offset + b * distance + e * stride`, counted in complex elements (or real elements for a
/// `Domain::Real` view).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct View {
    pub buffer: BufferRef,
    pub offset: usize,
    pub stride: usize,
    pub distance: usize,
    /// A real view reads zero imaginary parts and drops imaginary parts on write.
    pub kind: Domain,
}

impl View {
    /// Contiguous view of a scratch region holding transforms of `len` elements back to back.
    pub fn scratch(region: usize, len: usize) -> Self {
        Self {
            buffer: BufferRef::Scratch(region),
            offset: 0,
            stride: 1,
            distance: len,
            kind: Domain::Complex,
        }
    }

    #[inline(always)]
    pub fn index(&self, batch: usize, element: usize) -> usize {
        self.offset + batch * self.distance + element * self.stride
    }
}

/// Runs one factor of a decomposition over blocks of `factor.len * factor.sub_batch` elements.
#[derive(Clone, PartialEq, Debug)]
pub struct ComputeOp {
    pub factor: Factor,
    pub direction: FftDirection,
    pub layout: Layout,
    pub input: View,
    pub output: View,
    /// Sub-problems per transform, each `factor.len * factor.sub_batch` elements long.
    pub num_blocks: usize,
    pub num_transforms: usize,
    pub scale: f64,
}

/// Which scalars of a complex buffer a transpose moves.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Plane {
    Interleaved,
    Real,
    Imag,
}

/// Transposes every block of `block_len = lda * ldb` elements of every transform.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TransposeOp {
    pub src: View,
    pub dst: View,
    pub lda: usize,
    pub ldb: usize,
    pub block_len: usize,
    pub num_blocks: usize,
    pub num_transforms: usize,
    pub scale: f64,
    pub plane: Plane,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ModulateStage {
    /// Multiplies the first `len` input elements by the chirp modifiers and zero-pads up to
    /// `padded_len`.
    Load,
    /// Multiplies by the normalized chirp spectrum, elementwise over `padded_len` elements.
    Chirp,
    /// Multiplies the first `len` elements by the chirp modifiers and the caller's scale.
    Store,
}

/// Pointwise multiplication by one of the Bluestein tables.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ModulateOp {
    pub stage: ModulateStage,
    pub src: View,
    pub dst: View,
    pub len: usize,
    pub padded_len: usize,
    pub modifiers_offset: usize,
    pub chirp_offset: usize,
    /// Use conjugated tables. Set for inverse transforms.
    pub conjugate: bool,
    pub scale: f64,
    pub num_transforms: usize,
}

/// A node of an execution graph.
#[derive(Clone, PartialEq, Debug)]
pub enum Op {
    Compute(ComputeOp),
    Transpose(TransposeOp),
    Modulate(ModulateOp),
    /// Completes when all of its predecessors complete.
    Join,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Compute(_) => "compute",
            Op::Transpose(_) => "transpose",
            Op::Modulate(_) => "modulate",
            Op::Join => "join",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Component {
    Re,
    Im,
}

impl Component {
    #[inline(always)]
    fn index(self) -> usize {
        match self {
            Component::Re => 0,
            Component::Im => 1,
        }
    }
}

#[derive(Debug)]
enum Planes<S> {
    Interleaved(S),
    Split { re: S, im: S },
}

impl<S> Planes<S> {
    fn plane(&self, storage_split_component: Option<Component>) -> &S {
        match (self, storage_split_component) {
            (Planes::Interleaved(buffer), _) => buffer,
            (Planes::Split { re, .. }, None) | (Planes::Split { re, .. }, Some(Component::Re)) => re,
            (Planes::Split { im, .. }, Some(Component::Im)) => im,
        }
    }
}

enum Location {
    Input(Option<Component>, usize),
    Output(Option<Component>, usize),
    Scratch(usize),
    /// The imaginary part of a real view.
    Discarded,
}

/// The memory one execution runs against: the caller's buffers, the scratch arena and the
/// twiddle buffer.
pub struct Bindings<'a, T> {
    storage: ComplexStorage,
    input: Option<Planes<&'a [T]>>,
    output: Planes<&'a mut [T]>,
    scratch: &'a mut [T],
    region_len: usize,
    twiddles: &'a [T],
}

impl<'a, T: FftNum> Bindings<'a, T> {
    /// Bindings for interleaved `[re, im]` storage. `input` is `None` for in-place execution.
    pub fn interleaved(
        input: Option<&'a [T]>,
        output: &'a mut [T],
        scratch: &'a mut [T],
        twiddles: &'a [T],
    ) -> Self {
        Self {
            storage: ComplexStorage::Interleaved,
            input: input.map(Planes::Interleaved),
            output: Planes::Interleaved(output),
            region_len: scratch.len() / 2,
            scratch,
            twiddles,
        }
    }

    /// Bindings for split storage, one plane of real parts and one of imaginary parts.
    pub fn split(
        input: Option<(&'a [T], &'a [T])>,
        output: (&'a mut [T], &'a mut [T]),
        scratch: &'a mut [T],
        twiddles: &'a [T],
    ) -> Self {
        Self {
            storage: ComplexStorage::Split,
            input: input.map(|(re, im)| Planes::Split { re, im }),
            output: Planes::Split {
                re: output.0,
                im: output.1,
            },
            region_len: scratch.len() / 2,
            scratch,
            twiddles,
        }
    }

    pub fn storage(&self) -> ComplexStorage {
        self.storage
    }

    fn locate(&self, view: &View, batch: usize, element: usize, c: Component) -> Location {
        let idx = view.index(batch, element);
        match view.buffer {
            BufferRef::Scratch(region) => {
                let base = region * self.region_len;
                match self.storage {
                    ComplexStorage::Interleaved => Location::Scratch(base + 2 * idx + c.index()),
                    ComplexStorage::Split => {
                        Location::Scratch(base + idx + c.index() * (self.region_len / 2))
                    }
                }
            }
            buffer => {
                let (plane, scalar) = match (view.kind, self.storage) {
                    (Domain::Real, _) if c == Component::Im => return Location::Discarded,
                    (Domain::Real, ComplexStorage::Interleaved) => (None, idx),
                    (Domain::Real, ComplexStorage::Split) => (Some(Component::Re), idx),
                    (Domain::Complex, ComplexStorage::Interleaved) => (None, 2 * idx + c.index()),
                    (Domain::Complex, ComplexStorage::Split) => (Some(c), idx),
                };
                if buffer == BufferRef::Input && self.input.is_some() {
                    Location::Input(plane, scalar)
                } else {
                    Location::Output(plane, scalar)
                }
            }
        }
    }

    pub fn read(
        &self,
        view: &View,
        batch: usize,
        element: usize,
        c: Component,
    ) -> Result<T, DeviceError> {
        let (slice, name, scalar): (&[T], &'static str, usize) =
            match self.locate(view, batch, element, c) {
                Location::Discarded => return Ok(T::zero()),
                Location::Scratch(i) => (&*self.scratch, "scratch", i),
                Location::Output(plane, i) => (&**self.output.plane(plane), "output", i),
                Location::Input(plane, i) => match &self.input {
                    Some(planes) => (*planes.plane(plane), "input", i),
                    None => (&**self.output.plane(plane), "output", i),
                },
            };
        slice
            .get(scalar)
            .copied()
            .ok_or(DeviceError::BufferTooSmall {
                name,
                required: scalar + 1,
                actual: slice.len(),
            })
    }

    pub fn write(
        &mut self,
        view: &View,
        batch: usize,
        element: usize,
        c: Component,
        value: T,
    ) -> Result<(), DeviceError> {
        let (slice, name, scalar): (&mut [T], &'static str, usize) =
            match self.locate(view, batch, element, c) {
                Location::Discarded => return Ok(()),
                Location::Scratch(i) => (&mut *self.scratch, "scratch", i),
                Location::Input(..) => {
                    return Err(DeviceError::LaunchFailure(
                        "write to the read-only input buffer".to_string(),
                    ))
                }
                Location::Output(plane, i) => {
                    let slice = match (&mut self.output, plane) {
                        (Planes::Interleaved(buffer), _) => &mut **buffer,
                        (Planes::Split { im, .. }, Some(Component::Im)) => &mut **im,
                        (Planes::Split { re, .. }, _) => &mut **re,
                    };
                    (slice, "output", i)
                }
            };
        let actual = slice.len();
        match slice.get_mut(scalar) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DeviceError::BufferTooSmall {
                name,
                required: scalar + 1,
                actual,
            }),
        }
    }

    pub fn read_complex(
        &self,
        view: &View,
        batch: usize,
        element: usize,
    ) -> Result<Complex<T>, DeviceError> {
        Ok(Complex {
            re: self.read(view, batch, element, Component::Re)?,
            im: self.read(view, batch, element, Component::Im)?,
        })
    }

    pub fn write_complex(
        &mut self,
        view: &View,
        batch: usize,
        element: usize,
        value: Complex<T>,
    ) -> Result<(), DeviceError> {
        self.write(view, batch, element, Component::Re, value.re)?;
        self.write(view, batch, element, Component::Im, value.im)
    }

    /// Reads the complex value stored as an interleaved pair at scalar `index` of the twiddle
    /// buffer.
    pub fn twiddle(&self, index: usize) -> Result<Complex<T>, DeviceError> {
        match (self.twiddles.get(index), self.twiddles.get(index + 1)) {
            (Some(&re), Some(&im)) => Ok(Complex { re, im }),
            _ => Err(DeviceError::BufferTooSmall {
                name: "twiddles",
                required: index + 2,
                actual: self.twiddles.len(),
            }),
        }
    }

    /// Reads one scalar of the twiddle buffer.
    pub fn twiddle_scalar(&self, index: usize) -> Result<T, DeviceError> {
        self.twiddles
            .get(index)
            .copied()
            .ok_or(DeviceError::BufferTooSmall {
                name: "twiddles",
                required: index + 1,
                actual: self.twiddles.len(),
            })
    }
}

/// A device queue. Every method issues one operation that runs after all events in `deps`
/// and returns the event that signals its completion.
///
/// A queue may run operations eagerly or defer them, but it must be done reading and writing
/// `bindings` before the call returns.
pub trait Queue {
    fn compute<T: FftNum>(
        &mut self,
        op: &ComputeOp,
        bindings: &mut Bindings<'_, T>,
        deps: &[Event],
    ) -> Result<Event, DeviceError>;

    fn transpose<T: FftNum>(
        &mut self,
        op: &TransposeOp,
        bindings: &mut Bindings<'_, T>,
        deps: &[Event],
    ) -> Result<Event, DeviceError>;

    fn modulate<T: FftNum>(
        &mut self,
        op: &ModulateOp,
        bindings: &mut Bindings<'_, T>,
        deps: &[Event],
    ) -> Result<Event, DeviceError>;

    fn join(&mut self, deps: &[Event]) -> Result<Event, DeviceError>;

    /// Blocks until `event` completes, returning the first failure on its dependency path.
    fn wait(&mut self, event: Event) -> Result<(), DeviceError>;
}
