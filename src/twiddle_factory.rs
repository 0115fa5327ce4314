use log::debug;
use num_complex::Complex;

use crate::bluestein::BluesteinExpander;
use crate::common::FftNum;
use crate::config::DeviceInfo;
use crate::error::{try_vec, FftError};
use crate::factorizer::{Decomposition, Factor};
use crate::launch::{launch_params, local_mem_required};
use crate::transpose::complex_transpose;
use crate::twiddles::compute_twiddle;
use crate::{FftDirection, Layout, Level};

#[inline(always)]
fn put<T: FftNum>(buffer: &mut [T], index: usize, value: Complex<T>) {
    buffer[index] = value.re;
    buffer[index + 1] = value.im;
}

/// Builds the twiddle buffer of a decomposition and finalizes the launch parameters of every
/// factor.
///
/// Layout of the buffer, in scalars:
///
/// 1. With Bluestein: the normalized chirp spectrum (`2 * padded_len`), then the modifiers
///    (`2 * padded_len`).
/// 2. For the forward chain: the inter-stage table after each factor but the last
///    (`2 * len * sub_batch` each), then each factor's own table.
/// 3. With Bluestein: the same for the backward chain.
///
/// Every table holds forward-direction values. Inverse kernels conjugate on read.
pub struct TwiddleFactory {
    device: DeviceInfo,
}

impl TwiddleFactory {
    pub fn new(device: DeviceInfo) -> Self {
        Self { device }
    }

    /// Scalars a factor's own table occupies.
    fn table_len(factor: &Factor) -> Result<usize, FftError> {
        match factor.level {
            Level::WorkItem => Ok(0),
            Level::Subgroup => Ok(2 * factor.len),
            Level::Workgroup => match factor.kernel_factors[..] {
                [n_sg, n_wi, m_sg, m_wi] => {
                    let (n, m) = (n_sg * n_wi, m_sg * m_wi);
                    Ok(2 * n * m + 2 * (n + m))
                }
                _ => Err(FftError::InternalConsistency(
                    "workgroup factor must have four kernel factors",
                )),
            },
            Level::Global => Err(FftError::InternalConsistency(
                "a factor can't run at global level",
            )),
        }
    }

    fn chain_len(chain: &[Factor]) -> Result<usize, FftError> {
        let mut total = 0;
        for (i, factor) in chain.iter().enumerate() {
            if i + 1 < chain.len() {
                total += 2 * factor.block_len();
            }
            total += Self::table_len(factor)?;
        }
        Ok(total)
    }

    /// Size of the twiddle buffer, computed from the decomposition alone.
    pub fn required_len(decomposition: &Decomposition) -> Result<usize, FftError> {
        let mut total = Self::chain_len(&decomposition.forward)?;
        if decomposition.bluestein {
            total += 4 * decomposition.padded_len;
            total += Self::chain_len(&decomposition.backward)?;
        }
        Ok(total)
    }

    /// Fills the twiddle buffer and every factor's offsets, local memory requirement and launch
    /// parameters. `batches_per_group` sizes the launches of chain factors, `num_transforms`
    /// the launch of a direct transform.
    pub fn build<T: FftNum>(
        &self,
        decomposition: &mut Decomposition,
        batches_per_group: usize,
        num_transforms: usize,
    ) -> Result<Vec<T>, FftError> {
        let planned_width = decomposition
            .forward
            .iter()
            .chain(&decomposition.backward)
            .all(|factor| factor.used_sg_size == self.device.subgroup_size);
        if !planned_width {
            return Err(FftError::InternalConsistency(
                "decomposition was planned for a different subgroup width",
            ));
        }

        let total = Self::required_len(decomposition)?;
        let mut buffer: Vec<T> = try_vec![T::zero(); total];

        let mut offset = 0;
        if decomposition.bluestein {
            let expander =
                BluesteinExpander::new(decomposition.committed_len, decomposition.padded_len);
            offset = expander.write_twiddles(&mut buffer, offset);
        }
        offset = self.write_chain(&mut buffer, &mut decomposition.forward, offset)?;
        if decomposition.bluestein {
            offset = self.write_chain(&mut buffer, &mut decomposition.backward, offset)?;
        }
        if offset != total {
            return Err(FftError::InternalConsistency(
                "twiddle buffer layout doesn't match its computed size",
            ));
        }

        let direct = decomposition.is_direct();
        let padded_len = decomposition.padded_len;
        for chain in [&mut decomposition.forward, &mut decomposition.backward] {
            let last = chain.len().saturating_sub(1);
            for (i, factor) in chain.iter_mut().enumerate() {
                let layout = if i == last {
                    Layout::Packed
                } else {
                    Layout::BatchInterleaved
                };
                factor.local_mem = local_mem_required(
                    factor.level,
                    factor.len,
                    &factor.kernel_factors,
                    layout,
                    &self.device,
                )?;
                let num_ffts = if direct {
                    num_transforms
                } else {
                    padded_len / factor.len * batches_per_group
                };
                factor.launch = launch_params(factor.len, num_ffts, factor.level, &self.device)?;
            }
        }

        debug!(
            "twiddle buffer holds {} scalars ({} bytes)",
            total,
            total * std::mem::size_of::<T>()
        );
        Ok(buffer)
    }

    fn write_chain<T: FftNum>(
        &self,
        buffer: &mut [T],
        chain: &mut [Factor],
        mut offset: usize,
    ) -> Result<usize, FftError> {
        let stages = chain.len().saturating_sub(1);
        for factor in chain[..stages].iter_mut() {
            factor.inter_stage_offset = Some(offset);
            offset = write_inter_stage(buffer, factor, offset);
        }
        for factor in chain.iter_mut() {
            factor.table_offset = offset;
            offset = write_factor_table(buffer, factor, offset)?;
        }
        Ok(offset)
    }
}

/// Index, in complex elements, of the inter-stage twiddle for output `k` of sub-transform `s`.
///
/// Work-item kernels read the table factor-major, every other level reads it sub-batch-major.
#[inline]
pub(crate) fn inter_stage_index(factor: &Factor, k: usize, s: usize) -> usize {
    match factor.level {
        Level::WorkItem => k * factor.sub_batch + s,
        _ => s * factor.len + k,
    }
}

/// `exp(-2*pi*i * k * s / (len * sub_batch))` for every output `k` and sub-transform `s`.
fn write_inter_stage<T: FftNum>(buffer: &mut [T], factor: &Factor, offset: usize) -> usize {
    let block_len = factor.block_len();
    for k in 0..factor.len {
        for s in 0..factor.sub_batch {
            let twiddle = compute_twiddle(k * s, block_len, FftDirection::Forward);
            put(buffer, offset + 2 * inter_stage_index(factor, k, s), twiddle);
        }
    }
    offset + 2 * block_len
}

fn write_factor_table<T: FftNum>(
    buffer: &mut [T],
    factor: &Factor,
    offset: usize,
) -> Result<usize, FftError> {
    match (factor.level, &factor.kernel_factors[..]) {
        (Level::WorkItem, _) => Ok(offset),
        (Level::Subgroup, &[sg, wi]) => {
            // real parts then imaginary parts, each [k][j]
            let len = factor.len;
            for k in 0..wi {
                for j in 0..sg {
                    let twiddle: Complex<T> = compute_twiddle(j * k, len, FftDirection::Forward);
                    buffer[offset + k * sg + j] = twiddle.re;
                    buffer[offset + len + k * sg + j] = twiddle.im;
                }
            }
            Ok(offset + 2 * len)
        }
        (Level::Workgroup, &[n_sg, n_wi, m_sg, m_wi]) => {
            let (n, m) = (n_sg * n_wi, m_sg * m_wi);
            let offset = write_four_step_table(buffer, offset, n_sg, n_wi);
            let offset = write_four_step_table(buffer, offset, m_sg, m_wi);

            let mut cross: Vec<T> = try_vec![T::zero(); 2 * n * m];
            for i in 0..n {
                for j in 0..m {
                    put(&mut cross, 2 * (i * m + j), compute_twiddle(i * j, n * m, FftDirection::Forward));
                }
            }
            complex_transpose(&cross, &mut buffer[offset..offset + 2 * n * m], m, n, n * m);
            Ok(offset + 2 * n * m)
        }
        _ => Err(FftError::InternalConsistency(
            "factor level doesn't match its kernel factors",
        )),
    }
}

/// Twiddles of a `p x q` four-step transform, `[k1][n2]`, interleaved.
fn write_four_step_table<T: FftNum>(buffer: &mut [T], offset: usize, p: usize, q: usize) -> usize {
    let len = p * q;
    for k1 in 0..p {
        for n2 in 0..q {
            put(buffer, offset + 2 * (k1 * q + n2), compute_twiddle(k1 * n2, len, FftDirection::Forward));
        }
    }
    offset + 2 * len
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::factorizer::LengthFactorizer;
    use crate::test_utils::tiny_device;

    fn build(device: DeviceInfo, len: usize) -> (Decomposition, Vec<f64>) {
        let mut decomposition = LengthFactorizer::new(device).decompose(len).unwrap();
        let buffer = TwiddleFactory::new(device)
            .build::<f64>(&mut decomposition, 4, 4)
            .unwrap();
        (decomposition, buffer)
    }

    #[test]
    fn test_sizes() {
        // work-item: no tables at all
        let (_, buffer) = build(DeviceInfo::default(), 8);
        assert!(buffer.is_empty());

        // subgroup: one split table
        let (d, buffer) = build(DeviceInfo::default(), 32);
        assert_eq!(buffer.len(), 64);
        assert_eq!(d.forward[0].table_offset, 0);

        // bluestein over a single subgroup factor of 33, in both directions
        let (d, buffer) = build(DeviceInfo::default(), 17);
        assert_eq!(buffer.len(), 4 * 33 + 2 * (2 * 33));
        assert_eq!(d.forward[0].table_offset, 4 * 33);
        assert_eq!(d.backward[0].table_offset, 4 * 33 + 2 * 33);

        // [8 workgroup (2 x 4), 4 subgroup]
        let (d, buffer) = build(tiny_device(), 32);
        let inter_stage = 2 * 32;
        let workgroup = 2 * 8 + 2 * (2 + 4);
        let subgroup = 2 * 4;
        assert_eq!(buffer.len(), inter_stage + workgroup + subgroup);
        assert_eq!(d.forward[0].inter_stage_offset, Some(0));
        assert_eq!(d.forward[1].inter_stage_offset, None);
        assert_eq!(d.forward[0].table_offset, inter_stage);
        assert_eq!(d.forward[1].table_offset, inter_stage + workgroup);
        assert_eq!(TwiddleFactory::required_len(&d), Ok(buffer.len()));
    }

    #[test]
    fn test_subgroup_table() {
        let (d, buffer) = build(DeviceInfo::default(), 32);
        let factor = &d.forward[0];
        assert_eq!(factor.kernel_factors, vec![32, 1]);
        for j in 0..32 {
            // a single row: k = 0
            assert!((buffer[j] - 1.0).abs() < 1e-12);
            assert!(buffer[32 + j].abs() < 1e-12);
        }
    }

    #[test]
    fn test_workgroup_cross_block() {
        let (d, buffer) = build(tiny_device(), 32);
        let factor = &d.forward[0];
        assert_eq!(factor.kernel_factors, vec![2, 1, 4, 1]);
        let (n, m) = (2, 4);
        let cross = factor.table_offset + 2 * (n + m);
        for k1 in 0..n {
            for n2 in 0..m {
                let expected: Complex<f64> = compute_twiddle(k1 * n2, n * m, FftDirection::Forward);
                let idx = cross + 2 * (n2 * n + k1);
                assert!((buffer[idx] - expected.re).abs() < 1e-12);
                assert!((buffer[idx + 1] - expected.im).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_inter_stage_table() {
        let (d, buffer) = build(tiny_device(), 32);
        let factor = &d.forward[0];
        let base = factor.inter_stage_offset.unwrap();
        for k in 0..factor.len {
            for s in 0..factor.sub_batch {
                let expected: Complex<f64> = compute_twiddle(k * s, 32, FftDirection::Forward);
                let idx = base + 2 * inter_stage_index(factor, k, s);
                assert!((buffer[idx] - expected.re).abs() < 1e-12);
                assert!((buffer[idx + 1] - expected.im).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_subgroup_width_mismatch() {
        let mut d = LengthFactorizer::new(DeviceInfo::default())
            .decompose(64)
            .unwrap();
        assert!(d.forward.iter().all(|factor| factor.used_sg_size == 32));

        let narrow = DeviceInfo {
            subgroup_size: 16,
            ..DeviceInfo::default()
        };
        assert!(matches!(
            TwiddleFactory::new(narrow).build::<f64>(&mut d, 4, 4),
            Err(FftError::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_launch_filled() {
        let (d, _) = build(tiny_device(), 32);
        for factor in &d.forward {
            assert_eq!(factor.launch.local, 8);
            assert!(factor.launch.global >= 8);
            assert!(factor.local_mem <= tiny_device().local_memory);
        }
    }
}
