use num_complex::Complex;
use num_traits::Zero;

use crate::common::FftNum;
use crate::error::DeviceError;
use crate::factorizer::Factor;
use crate::queue::{
    Bindings, Component, ComputeOp, Event, ModulateOp, ModulateStage, Plane, Queue, TransposeOp,
};
use crate::transpose::{complex_transpose, scalar_transpose};
use crate::twiddle_factory::inter_stage_index;
use crate::twiddles::generate_twiddle_factors;
use crate::{FftDirection, Layout, Level};

/// A [`Queue`] that runs every operation on the calling thread as soon as it is issued.
///
/// Each event records whether its operation succeeded. An operation whose dependency failed
/// doesn't run and inherits the failure, so waiting on any later event reports the first error
/// on its dependency path.
#[derive(Debug, Default)]
pub struct HostQueue {
    events: Vec<Result<(), DeviceError>>,
    fail_at: Option<usize>,
}

impl HostQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue whose `submission`-th operation (counting from zero, joins included) fails with
    /// `DeviceError::LaunchFailure` instead of running.
    pub fn with_failure_at(submission: usize) -> Self {
        Self {
            events: Vec::new(),
            fail_at: Some(submission),
        }
    }

    /// Number of operations issued so far.
    pub fn submitted(&self) -> usize {
        self.events.len()
    }

    fn submit(
        &mut self,
        deps: &[Event],
        run: impl FnOnce() -> Result<(), DeviceError>,
    ) -> Result<Event, DeviceError> {
        let mut status = Ok(());
        for dep in deps {
            match self.events.get(dep.0 as usize) {
                None => return Err(DeviceError::UnknownEvent(dep.0)),
                Some(Err(e)) if status.is_ok() => status = Err(e.clone()),
                Some(_) => {}
            }
        }

        let index = self.events.len();
        if status.is_ok() {
            status = if self.fail_at == Some(index) {
                Err(DeviceError::LaunchFailure(format!(
                    "operation {} failed to launch",
                    index
                )))
            } else {
                run()
            };
        }
        self.events.push(status);
        Ok(Event(index as u64))
    }
}

impl Queue for HostQueue {
    fn compute<T: FftNum>(
        &mut self,
        op: &ComputeOp,
        bindings: &mut Bindings<'_, T>,
        deps: &[Event],
    ) -> Result<Event, DeviceError> {
        self.submit(deps, || run_compute(op, bindings))
    }

    fn transpose<T: FftNum>(
        &mut self,
        op: &TransposeOp,
        bindings: &mut Bindings<'_, T>,
        deps: &[Event],
    ) -> Result<Event, DeviceError> {
        self.submit(deps, || run_transpose(op, bindings))
    }

    fn modulate<T: FftNum>(
        &mut self,
        op: &ModulateOp,
        bindings: &mut Bindings<'_, T>,
        deps: &[Event],
    ) -> Result<Event, DeviceError> {
        self.submit(deps, || run_modulate(op, bindings))
    }

    fn join(&mut self, deps: &[Event]) -> Result<Event, DeviceError> {
        self.submit(deps, || Ok(()))
    }

    fn wait(&mut self, event: Event) -> Result<(), DeviceError> {
        self.events
            .get(event.0 as usize)
            .cloned()
            .unwrap_or(Err(DeviceError::UnknownEvent(event.0)))
    }
}

fn scalar<T: FftNum>(value: f64) -> T {
    T::from_f64(value).unwrap()
}

/// Position of element `n` of sub-transform `s` within a block.
#[inline(always)]
fn position(layout: Layout, factor: &Factor, s: usize, n: usize) -> usize {
    match layout {
        Layout::Packed => s * factor.len + n,
        Layout::BatchInterleaved => s + n * factor.sub_batch,
    }
}

fn naive_dft<T: FftNum>(input: &[Complex<T>], output: &mut [Complex<T>], roots: &[Complex<T>]) {
    let len = input.len();
    for (k, out) in output.iter_mut().enumerate() {
        *out = input
            .iter()
            .enumerate()
            .fold(Complex::zero(), |acc, (n, &x)| acc + x * roots[(n * k) % len]);
    }
}

type Twiddle<'a, T> = dyn Fn(usize, usize) -> Result<Complex<T>, DeviceError> + 'a;
type SubDft<'a, T> = dyn Fn(&[Complex<T>], &mut [Complex<T>]) -> Result<(), DeviceError> + 'a;

/// DFT of length `p * q`: `p`-point DFTs down the columns, a twiddle multiply, then `q`-point DFTs
/// along the rows. Input index `q * n1 + n2` maps to output index `k1 + p * k2`.
fn four_step<T: FftNum>(
    input: &[Complex<T>],
    output: &mut [Complex<T>],
    p: usize,
    q: usize,
    twiddle: &Twiddle<'_, T>,
    dft_p: &SubDft<'_, T>,
    dft_q: &SubDft<'_, T>,
) -> Result<(), DeviceError> {
    let mut column = vec![Complex::zero(); p];
    let mut column_out = vec![Complex::zero(); p];
    let mut rows = vec![Complex::zero(); p * q];
    for n2 in 0..q {
        for n1 in 0..p {
            column[n1] = input[q * n1 + n2];
        }
        dft_p(&column, &mut column_out)?;
        for k1 in 0..p {
            rows[k1 * q + n2] = column_out[k1] * twiddle(k1, n2)?;
        }
    }

    let mut row_out = vec![Complex::zero(); q];
    for k1 in 0..p {
        dft_q(&rows[k1 * q..(k1 + 1) * q], &mut row_out)?;
        for k2 in 0..q {
            output[k1 + p * k2] = row_out[k2];
        }
    }
    Ok(())
}

/// Runs the level kernel of `factor` over one sub-transform.
fn level_dft<T: FftNum>(
    factor: &Factor,
    direction: FftDirection,
    bindings: &Bindings<'_, T>,
    input: &[Complex<T>],
    output: &mut [Complex<T>],
) -> Result<(), DeviceError> {
    let orient = |w: Complex<T>| match direction {
        FftDirection::Forward => w,
        FftDirection::Inverse => w.conj(),
    };
    let naive = |len: usize| {
        let roots = generate_twiddle_factors::<T>(len, direction);
        move |x: &[Complex<T>], y: &mut [Complex<T>]| -> Result<(), DeviceError> {
            naive_dft(x, y, &roots);
            Ok(())
        }
    };
    let base = factor.table_offset;

    match (factor.level, &factor.kernel_factors[..]) {
        (Level::WorkItem, _) => naive(factor.len)(input, output),
        (Level::Subgroup, &[sg, wi]) => {
            let len = factor.len;
            let twiddle = |k1: usize, n2: usize| -> Result<Complex<T>, DeviceError> {
                Ok(orient(Complex {
                    re: bindings.twiddle_scalar(base + n2 * sg + k1)?,
                    im: bindings.twiddle_scalar(base + len + n2 * sg + k1)?,
                }))
            };
            four_step(input, output, sg, wi, &twiddle, &naive(sg), &naive(wi))
        }
        (Level::Workgroup, &[n_sg, n_wi, m_sg, m_wi]) => {
            let (n, m) = (n_sg * n_wi, m_sg * m_wi);
            let table = |offset: usize, q: usize| {
                move |k1: usize, n2: usize| -> Result<Complex<T>, DeviceError> {
                    Ok(orient(bindings.twiddle(offset + 2 * (k1 * q + n2))?))
                }
            };
            let (n_table, m_table) = (table(base, n_wi), table(base + 2 * n, m_wi));
            let (dft_n_sg, dft_n_wi) = (naive(n_sg), naive(n_wi));
            let (dft_m_sg, dft_m_wi) = (naive(m_sg), naive(m_wi));
            let dft_n = |x: &[Complex<T>], y: &mut [Complex<T>]| {
                four_step(x, y, n_sg, n_wi, &n_table, &dft_n_sg, &dft_n_wi)
            };
            let dft_m = |x: &[Complex<T>], y: &mut [Complex<T>]| {
                four_step(x, y, m_sg, m_wi, &m_table, &dft_m_sg, &dft_m_wi)
            };

            let cross = base + 2 * (n + m);
            let twiddle = |k1: usize, n2: usize| -> Result<Complex<T>, DeviceError> {
                Ok(orient(bindings.twiddle(cross + 2 * (n2 * n + k1))?))
            };
            four_step(input, output, n, m, &twiddle, &dft_n, &dft_m)
        }
        (Level::Global, _) => Err(DeviceError::LaunchFailure(
            "no kernel runs a whole global-level transform".to_string(),
        )),
        _ => Err(DeviceError::LaunchFailure(format!(
            "kernel factors {:?} don't match level {:?}",
            factor.kernel_factors, factor.level
        ))),
    }
}

fn run_compute<T: FftNum>(op: &ComputeOp, bindings: &mut Bindings<'_, T>) -> Result<(), DeviceError> {
    let factor = &op.factor;
    let block_len = factor.block_len();
    let scale = scalar::<T>(op.scale);

    let mut input = vec![Complex::zero(); factor.len];
    let mut output = vec![Complex::zero(); factor.len];
    for t in 0..op.num_transforms {
        for p in 0..op.num_blocks {
            let block = p * block_len;
            for s in 0..factor.sub_batch {
                for (n, value) in input.iter_mut().enumerate() {
                    *value = bindings.read_complex(&op.input, t, block + position(op.layout, factor, s, n))?;
                }
                level_dft(factor, op.direction, bindings, &input, &mut output)?;

                for (k, &value) in output.iter().enumerate() {
                    let mut value = value;
                    if let Some(offset) = factor.inter_stage_offset {
                        let twiddle = bindings.twiddle(offset + 2 * inter_stage_index(factor, k, s))?;
                        value = match op.direction {
                            FftDirection::Forward => value * twiddle,
                            FftDirection::Inverse => value * twiddle.conj(),
                        };
                    }
                    bindings.write_complex(
                        &op.output,
                        t,
                        block + position(op.layout, factor, s, k),
                        value * scale,
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn run_transpose<T: FftNum>(op: &TransposeOp, bindings: &mut Bindings<'_, T>) -> Result<(), DeviceError> {
    let n = op.block_len;
    if op.lda * op.ldb != n {
        return Err(DeviceError::LaunchFailure(format!(
            "transpose of {} x {} doesn't cover blocks of {}",
            op.ldb, op.lda, n
        )));
    }
    let scale = scalar::<T>(op.scale);

    match op.plane {
        Plane::Interleaved => {
            let mut src = vec![T::zero(); 2 * n];
            let mut dst = vec![T::zero(); 2 * n];
            for t in 0..op.num_transforms {
                for p in 0..op.num_blocks {
                    for e in 0..n {
                        let value = bindings.read_complex(&op.src, t, p * n + e)?;
                        src[2 * e] = value.re;
                        src[2 * e + 1] = value.im;
                    }
                    complex_transpose(&src, &mut dst, op.lda, op.ldb, n);
                    for e in 0..n {
                        let value = Complex::new(dst[2 * e], dst[2 * e + 1]);
                        bindings.write_complex(&op.dst, t, p * n + e, value * scale)?;
                    }
                }
            }
        }
        Plane::Real | Plane::Imag => {
            let component = if op.plane == Plane::Real {
                Component::Re
            } else {
                Component::Im
            };
            let mut src = vec![T::zero(); n];
            let mut dst = vec![T::zero(); n];
            for t in 0..op.num_transforms {
                for p in 0..op.num_blocks {
                    for (e, value) in src.iter_mut().enumerate() {
                        *value = bindings.read(&op.src, t, p * n + e, component)?;
                    }
                    scalar_transpose(&src, &mut dst, op.lda, op.ldb, n);
                    for (e, &value) in dst.iter().enumerate() {
                        bindings.write(&op.dst, t, p * n + e, component, value * scale)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn run_modulate<T: FftNum>(op: &ModulateOp, bindings: &mut Bindings<'_, T>) -> Result<(), DeviceError> {
    let orient = |w: Complex<T>| if op.conjugate { w.conj() } else { w };
    let scale = scalar::<T>(op.scale);

    for t in 0..op.num_transforms {
        match op.stage {
            ModulateStage::Load => {
                for n in 0..op.padded_len {
                    let value = if n < op.len {
                        let modifier = orient(bindings.twiddle(op.modifiers_offset + 2 * n)?);
                        bindings.read_complex(&op.src, t, n)? * modifier
                    } else {
                        Complex::zero()
                    };
                    bindings.write_complex(&op.dst, t, n, value)?;
                }
            }
            ModulateStage::Chirp => {
                for n in 0..op.padded_len {
                    let chirp = orient(bindings.twiddle(op.chirp_offset + 2 * n)?);
                    let value = bindings.read_complex(&op.src, t, n)? * chirp;
                    bindings.write_complex(&op.dst, t, n, value)?;
                }
            }
            ModulateStage::Store => {
                for k in 0..op.len {
                    let modifier = orient(bindings.twiddle(op.modifiers_offset + 2 * k)?);
                    let value = bindings.read_complex(&op.src, t, k)? * modifier;
                    bindings.write_complex(&op.dst, t, k, value * scale)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::config::DeviceInfo;
    use crate::factorizer::LengthFactorizer;
    use crate::queue::{BufferRef, View};
    use crate::test_utils::{
        compare_vectors, deinterleave, interleave, random_signal, reference_dft, tiny_device,
    };
    use crate::twiddle_factory::TwiddleFactory;
    use crate::Domain;

    /// Runs a single-kernel decomposition of `len` as one compute op.
    fn run_direct(device: DeviceInfo, len: usize, direction: FftDirection) {
        let mut decomposition = LengthFactorizer::new(device).decompose(len).unwrap();
        assert!(decomposition.is_direct(), "len = {}", len);
        let twiddles: Vec<f64> = TwiddleFactory::new(device)
            .build(&mut decomposition, 1, 3)
            .unwrap();

        let signal: Vec<Complex<f64>> = random_signal(3 * len);
        let input = interleave(&signal);
        let mut output = vec![0f64; input.len()];
        let mut scratch: Vec<f64> = vec![];

        let view = |buffer| View {
            buffer,
            offset: 0,
            stride: 1,
            distance: len,
            kind: Domain::Complex,
        };
        let op = ComputeOp {
            factor: decomposition.forward[0].clone(),
            direction,
            layout: Layout::Packed,
            input: view(BufferRef::Input),
            output: view(BufferRef::Output),
            num_blocks: 1,
            num_transforms: 3,
            scale: 1.0,
        };

        let mut queue = HostQueue::new();
        let mut bindings = Bindings::interleaved(Some(&input[..]), &mut output, &mut scratch, &twiddles);
        let event = queue.compute(&op, &mut bindings, &[]).unwrap();
        queue.wait(event).unwrap();

        let actual = deinterleave(&output);
        for t in 0..3 {
            let expected = reference_dft(&signal[t * len..(t + 1) * len], direction);
            assert!(
                compare_vectors(&expected, &actual[t * len..(t + 1) * len]),
                "len = {}, direction = {}",
                len,
                direction
            );
        }
    }

    #[test]
    fn test_level_kernels() {
        for direction in [FftDirection::Forward, FftDirection::Inverse] {
            // work-item
            run_direct(DeviceInfo::default(), 7, direction);
            // subgroup, 32 x 1 and 11 x 3
            run_direct(DeviceInfo::default(), 32, direction);
            run_direct(DeviceInfo::default(), 33, direction);
            // workgroup, (32 x 1) x (32 x 1) and (2 x 1) x (4 x 1)
            run_direct(DeviceInfo::default(), 1024, direction);
            run_direct(tiny_device(), 8, direction);
            // workgroup with multi-lane sub-factors: 36 = (3 x 2) x (3 x 2)
            run_direct(
                DeviceInfo {
                    local_memory: 100,
                    ..tiny_device()
                },
                36,
                direction,
            );
        }
    }

    #[test]
    fn test_four_step() {
        let signal: Vec<Complex<f32>> = random_signal(12);
        let mut output = vec![Complex::zero(); 12];
        let twiddle = |k1: usize, n2: usize| -> Result<Complex<f32>, DeviceError> {
            Ok(crate::twiddles::compute_twiddle(k1 * n2, 12, FftDirection::Forward))
        };
        let dft = |len: usize| {
            let roots = generate_twiddle_factors::<f32>(len, FftDirection::Forward);
            move |x: &[Complex<f32>], y: &mut [Complex<f32>]| -> Result<(), DeviceError> {
                naive_dft(x, y, &roots);
                Ok(())
            }
        };
        four_step(&signal, &mut output, 4, 3, &twiddle, &dft(4), &dft(3)).unwrap();
        assert!(compare_vectors(&reference_dft(&signal, FftDirection::Forward), &output));
    }

    #[test]
    fn test_failure_propagation() {
        let mut queue = HostQueue::with_failure_at(1);
        let a = queue.join(&[]).unwrap();
        let b = queue.join(&[a]).unwrap();
        let c = queue.join(&[b]).unwrap();
        let d = queue.join(&[a]).unwrap();

        assert_eq!(queue.wait(a), Ok(()));
        assert!(matches!(queue.wait(b), Err(DeviceError::LaunchFailure(_))));
        assert_eq!(queue.wait(c), queue.wait(b));
        assert_eq!(queue.wait(d), Ok(()));
        assert_eq!(queue.submitted(), 4);

        assert_eq!(queue.wait(Event(99)), Err(DeviceError::UnknownEvent(99)));
        assert_eq!(queue.join(&[Event(42)]), Err(DeviceError::UnknownEvent(42)));
    }

    #[test]
    fn test_transpose_op() {
        // two transforms of one 2 x 3 block each, scaled by 2
        let input: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let mut output = vec![0f32; 24];
        let mut scratch: Vec<f32> = vec![];
        let op = TransposeOp {
            src: View {
                buffer: BufferRef::Input,
                offset: 0,
                stride: 1,
                distance: 6,
                kind: Domain::Complex,
            },
            dst: View {
                buffer: BufferRef::Output,
                offset: 0,
                stride: 1,
                distance: 6,
                kind: Domain::Complex,
            },
            lda: 3,
            ldb: 2,
            block_len: 6,
            num_blocks: 1,
            num_transforms: 2,
            scale: 2.0,
            plane: Plane::Interleaved,
        };
        let mut queue = HostQueue::new();
        let mut bindings = Bindings::interleaved(Some(&input[..]), &mut output, &mut scratch, &[]);
        queue.transpose(&op, &mut bindings, &[]).unwrap();

        let expected_order = [0, 3, 1, 4, 2, 5];
        for t in 0..2 {
            for (i, &j) in expected_order.iter().enumerate() {
                let src = 2 * (t * 6 + j);
                let dst = 2 * (t * 6 + i);
                assert_eq!(output[dst], 2.0 * input[src]);
                assert_eq!(output[dst + 1], 2.0 * input[src + 1]);
            }
        }
    }
}
