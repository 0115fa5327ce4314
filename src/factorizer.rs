use log::debug;

use crate::bluestein::{padded_len, smallest_supported_at_least};
use crate::config::DeviceInfo;
use crate::error::PlanningError;
use crate::launch::{local_mem_required, LaunchParams};
use crate::math_utils::{divisors_descending, factorize, factorize_sg, is_supported_length};
use crate::{Layout, Level};

/// Largest transform length that can be committed.
pub const MAX_LENGTH: usize = 1 << 27;

/// One stage of a factor chain.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Factor {
    pub len: usize,
    /// Never `Level::Global`: every factor runs as a single kernel.
    pub level: Level,
    /// How the kernel splits `len`: `[len]` at work-item level, `[sg, wi]` at subgroup level,
    /// and `[n_sg, n_wi, m_sg, m_wi]` at workgroup level.
    pub kernel_factors: Vec<usize>,
    /// Independent sub-transforms of this factor per sub-problem: the product of the lengths of
    /// every later factor.
    pub sub_batch: usize,
    /// Scalar offset of the table applied between this factor and the next, if there is a next.
    pub inter_stage_offset: Option<usize>,
    /// Scalar offset of this factor's own twiddle table.
    pub table_offset: usize,
    /// Local memory, in scalars, one workgroup needs.
    pub local_mem: usize,
    pub launch: LaunchParams,
    /// Subgroup width the kernel factors were chosen for. A factor only runs on devices of
    /// this width.
    pub used_sg_size: usize,
}

impl Factor {
    /// Length of the sub-problem this factor starts: `len * sub_batch`.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.len * self.sub_batch
    }
}

/// The result of factorizing a transform length.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Decomposition {
    pub committed_len: usize,
    /// The length the chains transform. Equal to `committed_len` unless Bluestein is used.
    pub padded_len: usize,
    /// `Level::Global` for chains of several kernels and for Bluestein, otherwise the level of
    /// the single factor.
    pub level: Level,
    pub is_prime: bool,
    pub bluestein: bool,
    pub forward: Vec<Factor>,
    /// Chain of the inverse half of a Bluestein convolution. Empty without Bluestein.
    pub backward: Vec<Factor>,
}

impl Decomposition {
    /// True when the whole transform runs as one kernel launch.
    pub fn is_direct(&self) -> bool {
        self.level != Level::Global
    }

    pub fn factor_lens(&self) -> Vec<usize> {
        self.forward.iter().map(|f| f.len).collect()
    }
}

/// Splits transform lengths into chains of factors, each assigned to a level of the device's
/// parallelism hierarchy.
#[derive(Copy, Clone, Debug)]
pub struct LengthFactorizer {
    device: DeviceInfo,
}

impl LengthFactorizer {
    pub fn new(device: DeviceInfo) -> Self {
        Self { device }
    }

    pub fn decompose(&self, len: usize) -> Result<Decomposition, PlanningError> {
        self.device.validate()?;
        if len == 0 {
            return Err(PlanningError::UnsupportedLength {
                len,
                reason: "length must be positive",
            });
        }
        if len > MAX_LENGTH {
            return Err(PlanningError::UnsupportedLength {
                len,
                reason: "length exceeds the largest supported length",
            });
        }
        let is_prime = len > 1 && primal_check::miller_rabin(len as u64);

        if is_supported_length(len) {
            if let Some(factor) = self.single_kernel(len) {
                return Ok(Decomposition {
                    committed_len: len,
                    padded_len: len,
                    level: factor.level,
                    is_prime,
                    bluestein: false,
                    forward: vec![factor],
                    backward: Vec::new(),
                });
            }
            if let Some(chain) = self.global_chain(len) {
                return Ok(Decomposition {
                    committed_len: len,
                    padded_len: len,
                    level: Level::Global,
                    is_prime,
                    bluestein: false,
                    forward: chain,
                    backward: Vec::new(),
                });
            }
            debug!(
                "no factorization of length {} fits the device, trying Bluestein",
                len
            );
        }

        // Bluestein. Prefer the shortest padding, but keep looking if the device can't run it.
        let first = padded_len(len);
        let mut padded = first;
        while padded <= MAX_LENGTH && padded <= 4 * first {
            if let Some(chain) = self.chain(padded) {
                debug!("length {} runs as a Bluestein convolution of length {}", len, padded);
                return Ok(Decomposition {
                    committed_len: len,
                    padded_len: padded,
                    level: Level::Global,
                    is_prime,
                    bluestein: true,
                    backward: chain.clone(),
                    forward: chain,
                });
            }
            padded = smallest_supported_at_least(padded + 1);
        }
        Err(PlanningError::UnsupportedLength {
            len,
            reason: "no Bluestein padding fits the device",
        })
    }

    fn chain(&self, len: usize) -> Option<Vec<Factor>> {
        self.single_kernel(len)
            .map(|factor| vec![factor])
            .or_else(|| self.global_chain(len))
    }

    fn single_kernel(&self, len: usize) -> Option<Factor> {
        let (level, kernel_factors, local_mem) = self.fit(len, Layout::Packed)?;
        Some(self.factor(len, level, kernel_factors, local_mem))
    }

    /// Greedily peels the largest divisor that fits a single kernel. Every factor but the last
    /// runs batch-interleaved.
    fn global_chain(&self, len: usize) -> Option<Vec<Factor>> {
        let mut chain = Vec::new();
        let mut remaining = len;
        while remaining > 1 {
            let (d, (level, kernel_factors, local_mem)) = divisors_descending(remaining)
                .into_iter()
                .filter(|&d| d > 1 && d < len)
                .find_map(|d| {
                    let layout = if d == remaining {
                        Layout::Packed
                    } else {
                        Layout::BatchInterleaved
                    };
                    self.fit(d, layout).map(|fit| (d, fit))
                })?;
            chain.push(self.factor(d, level, kernel_factors, local_mem));
            remaining /= d;
        }

        let mut sub_batch = 1;
        for factor in chain.iter_mut().rev() {
            factor.sub_batch = sub_batch;
            sub_batch *= factor.len;
        }
        Some(chain)
    }

    fn factor(&self, len: usize, level: Level, kernel_factors: Vec<usize>, local_mem: usize) -> Factor {
        Factor {
            len,
            level,
            kernel_factors,
            sub_batch: 1,
            inter_stage_offset: None,
            table_offset: 0,
            local_mem,
            launch: LaunchParams::default(),
            used_sg_size: self.device.subgroup_size,
        }
    }

    /// Splits `len` between the lanes of a subgroup, if each lane's share fits in registers.
    fn subgroup_split(&self, len: usize) -> Option<(usize, usize)> {
        let sg = factorize_sg(len, self.device.subgroup_size);
        let wi = len / sg;
        (wi <= self.device.max_workitem_len).then(|| (sg, wi))
    }

    /// Finds the narrowest level that can run `len` as a single kernel.
    fn fit(&self, len: usize, layout: Layout) -> Option<(Level, Vec<usize>, usize)> {
        let fits = |level: Level, kernel_factors: &[usize]| -> Option<usize> {
            local_mem_required(level, len, kernel_factors, layout, &self.device)
                .ok()
                .filter(|&required| required <= self.device.local_memory)
        };

        if len <= self.device.max_workitem_len {
            if let Some(local_mem) = fits(Level::WorkItem, &[len]) {
                return Some((Level::WorkItem, vec![len], local_mem));
            }
        }

        if let Some((sg, wi)) = self.subgroup_split(len) {
            if sg > 1 {
                if let Some(local_mem) = fits(Level::Subgroup, &[sg, wi]) {
                    return Some((Level::Subgroup, vec![sg, wi], local_mem));
                }
            }
        }

        let n = factorize(len);
        if n > 1 {
            let m = len / n;
            if let (Some((n_sg, n_wi)), Some((m_sg, m_wi))) =
                (self.subgroup_split(n), self.subgroup_split(m))
            {
                let kernel_factors = vec![n_sg, n_wi, m_sg, m_wi];
                if let Some(local_mem) = fits(Level::Workgroup, &kernel_factors) {
                    return Some((Level::Workgroup, kernel_factors, local_mem));
                }
            }
        }

        None
    }
}
