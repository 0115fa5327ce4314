use num_traits::{FromPrimitive, Signed};
use std::fmt::Debug;

/// Generic floating point number, implemented for f32 and f64
pub trait FftNum: Copy + FromPrimitive + Signed + Sync + Send + Debug + 'static {}

impl<T> FftNum for T where T: Copy + FromPrimitive + Signed + Sync + Send + Debug + 'static {}

/// Number of elements a buffer needs so that `len` elements of `batches` transforms can be
/// addressed with the given offset, stride and distance. `None` if that overflows `usize`.
#[inline]
pub(crate) fn addressed_elements(
    offset: usize,
    stride: usize,
    distance: usize,
    len: usize,
    batches: usize,
) -> Option<usize> {
    if len == 0 || batches == 0 {
        return Some(offset);
    }
    let last_batch = (batches - 1).checked_mul(distance)?;
    let last_element = (len - 1).checked_mul(stride)?;
    offset
        .checked_add(last_batch)?
        .checked_add(last_element)?
        .checked_add(1)
}
