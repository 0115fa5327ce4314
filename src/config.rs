use crate::error::PlanningError;

/// Fixed capabilities of the device a transform is committed for.
///
/// The planner never queries the device itself: these values are supplied by the caller and are
/// immutable once a descriptor has been committed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Number of compute units. Launch sizes saturate at a multiple of this.
    pub compute_units: usize,
    /// Lanes per subgroup.
    pub subgroup_size: usize,
    /// Subgroups per workgroup.
    pub sgs_per_wg: usize,
    /// Local (on-chip) memory available to one workgroup, in scalars.
    pub local_memory: usize,
    /// Largest sub-transform a single lane may compute in registers.
    pub max_workitem_len: usize,
    /// Fast-memory budget, in bytes, that one batch group of a global transform should fit in.
    pub residency_bytes: usize,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            compute_units: 16,
            subgroup_size: 32,
            sgs_per_wg: 2,
            local_memory: 16 * 1024,
            max_workitem_len: 16,
            residency_bytes: 4 * 1024 * 1024,
        }
    }
}

impl DeviceInfo {
    /// Builds the default device description, then overrides individual fields from the
    /// `DEVFFT_COMPUTE_UNITS`, `DEVFFT_SUBGROUP_SIZE`, `DEVFFT_SGS_PER_WG`, `DEVFFT_LOCAL_MEMORY`,
    /// `DEVFFT_MAX_WORKITEM_LEN` and `DEVFFT_RESIDENCY_BYTES` environment variables.
    /// Variables that are missing or don't parse as an unsigned integer are ignored.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str, current: usize| -> usize {
            lookup(name)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(current)
        };
        self.compute_units = read("DEVFFT_COMPUTE_UNITS", self.compute_units);
        self.subgroup_size = read("DEVFFT_SUBGROUP_SIZE", self.subgroup_size);
        self.sgs_per_wg = read("DEVFFT_SGS_PER_WG", self.sgs_per_wg);
        self.local_memory = read("DEVFFT_LOCAL_MEMORY", self.local_memory);
        self.max_workitem_len = read("DEVFFT_MAX_WORKITEM_LEN", self.max_workitem_len);
        self.residency_bytes = read("DEVFFT_RESIDENCY_BYTES", self.residency_bytes);
        self
    }

    /// Number of lanes in one workgroup.
    #[inline]
    pub fn wg_size(&self) -> usize {
        self.subgroup_size * self.sgs_per_wg
    }

    pub(crate) fn validate(&self) -> Result<(), PlanningError> {
        let fields = [
            ("compute_units", self.compute_units),
            ("subgroup_size", self.subgroup_size),
            ("sgs_per_wg", self.sgs_per_wg),
            ("local_memory", self.local_memory),
            ("max_workitem_len", self.max_workitem_len),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(PlanningError::DegenerateDevice { name, value });
            }
        }
        Ok(())
    }
}
