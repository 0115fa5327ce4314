use thiserror::Error;

/// Errors detected while planning a transform. These are surfaced by `commit` and are never
/// retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("transform length {len} is not supported: {reason}")]
    UnsupportedLength { len: usize, reason: &'static str },
    #[error("device parameter `{name}` must be positive, got {value}")]
    DegenerateDevice { name: &'static str, value: usize },
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Errors reported by the device layer, either while issuing work or through a completion
/// handle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("cannot allocate {0} scalars")]
    OutOfMemory(usize),
    #[error("buffer `{name}` holds {actual} scalars, but {required} are required")]
    BufferTooSmall {
        name: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("event {0} was not issued by this queue")]
    UnknownEvent(u64),
    #[error("kernel launch failed: {0}")]
    LaunchFailure(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FftError {
    #[error(transparent)]
    Planning(#[from] PlanningError),
    /// The planner and the twiddle factory or engine disagree. Always a bug in this crate.
    #[error("internal consistency error: {0}")]
    InternalConsistency(&'static str),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl FftError {
    pub fn is_planning_error(&self) -> bool {
        matches!(self, FftError::Planning(_))
    }
}

macro_rules! try_vec {
    ($elem:expr; $n:expr) => {{
        let mut v = Vec::new();
        v.try_reserve_exact($n)
            .map_err(|_| crate::error::DeviceError::OutOfMemory($n))?;
        v.resize($n, $elem);
        v
    }};
}

pub(crate) use try_vec;
