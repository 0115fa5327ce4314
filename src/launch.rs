use crate::config::DeviceInfo;
use crate::error::{FftError, PlanningError};
use crate::math_utils::factorize_sg;
use crate::{Layout, Level};

/// Saturation ceiling: this many lanes per compute unit is enough to keep a device busy.
const LANES_PER_COMPUTE_UNIT: usize = 8 * 64;

/// The (global, local) extents of one kernel launch, in lanes.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug, Hash)]
pub struct LaunchParams {
    pub global: usize,
    pub local: usize,
}

/// Computes the launch extents for `num_ffts` transforms of `fft_size` elements at `level`.
///
/// The global extent covers every transform at the level's transforms-per-workgroup
/// granularity, but never exceeds what the device can keep resident, and is never smaller than
/// one workgroup.
pub fn launch_params(
    fft_size: usize,
    num_ffts: usize,
    level: Level,
    device: &DeviceInfo,
) -> Result<LaunchParams, FftError> {
    device.validate()?;
    if fft_size == 0 {
        return Err(PlanningError::DegenerateDevice {
            name: "fft_size",
            value: 0,
        }
        .into());
    }
    if num_ffts == 0 {
        return Err(PlanningError::DegenerateDevice {
            name: "num_ffts",
            value: 0,
        }
        .into());
    }

    let wg_size = device.wg_size();
    let ffts_per_wg = match level {
        Level::WorkItem => wg_size,
        Level::Subgroup => {
            (device.subgroup_size / factorize_sg(fft_size, device.subgroup_size))
                * device.sgs_per_wg
        }
        Level::Workgroup => 1,
        Level::Global => {
            return Err(FftError::InternalConsistency(
                "global level has no launch parameters",
            ))
        }
    };

    let n_available = LANES_PER_COMPUTE_UNIT * device.compute_units;
    let cap = std::cmp::max(wg_size, n_available / wg_size * wg_size);
    let needed = (num_ffts + ffts_per_wg - 1) / ffts_per_wg * wg_size;

    Ok(LaunchParams {
        global: needed.min(cap),
        local: wg_size,
    })
}

/// Local memory, in scalars, one workgroup needs to run a factor of `len` elements at `level`.
pub fn local_mem_required(
    level: Level,
    len: usize,
    kernel_factors: &[usize],
    layout: Layout,
    device: &DeviceInfo,
) -> Result<usize, FftError> {
    match level {
        Level::WorkItem => match layout {
            Layout::Packed => Ok(2 * len * device.wg_size()),
            Layout::BatchInterleaved => Ok(0),
        },
        Level::Subgroup => {
            let sg_factor = kernel_factors.first().copied().unwrap_or(1).max(1);
            let ffts_per_sg = device.subgroup_size / sg_factor;
            Ok(2 * len * ffts_per_sg * device.sgs_per_wg + 2 * len)
        }
        Level::Workgroup => match kernel_factors {
            [n_sg, n_wi, m_sg, m_wi] => Ok(2 * len + 2 * (n_sg * n_wi + m_sg * m_wi)),
            _ => Err(FftError::InternalConsistency(
                "workgroup factor must have four kernel factors",
            )),
        },
        Level::Global => Err(FftError::InternalConsistency(
            "global level has no local memory requirement",
        )),
    }
}
