use num_complex::Complex;
use strength_reduce::StrengthReducedUsize;

use crate::common::FftNum;

/// Source index read by destination element `i` when transposing a matrix of `ldb` rows, each
/// `lda` elements long.
#[inline]
pub fn transpose_index(i: usize, lda: usize, ldb: usize) -> usize {
    (i % ldb) * lda + i / ldb
}

#[inline(always)]
fn reduced_index(i: usize, lda: usize, ldb: StrengthReducedUsize) -> usize {
    (i % ldb) * lda + i / ldb
}

// Safety: Complex<T> is repr(C) with two T fields, so an even-length slice of T has the same
// layout as a slice of half as many Complex<T>.
unsafe fn as_complex<T>(slice: &[T]) -> &[Complex<T>] {
    std::slice::from_raw_parts(slice.as_ptr() as *const Complex<T>, slice.len() / 2)
}

unsafe fn as_complex_mut<T>(slice: &mut [T]) -> &mut [Complex<T>] {
    std::slice::from_raw_parts_mut(slice.as_mut_ptr() as *mut Complex<T>, slice.len() / 2)
}

/// Transposes `count` complex values stored as interleaved `[re, im]` pairs, writing
/// `dst[i] = src[(i % ldb) * lda + i / ldb]` for every element `i < count`.
///
/// When `count == lda * ldb` the whole matrix is transposed with a cache-blocked transpose.
///
/// # Panics
///
/// Panics if `src` holds fewer than `2 * lda * ldb` scalars, if `dst` holds fewer than
/// `2 * count`, or if `count` exceeds `lda * ldb`.
pub fn complex_transpose<T: FftNum>(src: &[T], dst: &mut [T], lda: usize, ldb: usize, count: usize) {
    let len = lda * ldb;
    assert!(count <= len);
    assert!(src.len() >= 2 * len, "transpose source is shorter than the matrix");
    let src = &src[..2 * len];
    let dst = &mut dst[..2 * count];

    if count == len && count > 0 {
        // SAFETY: both slices have even length, see `as_complex`.
        let (src, dst) = unsafe { (as_complex(src), as_complex_mut(dst)) };
        transpose::transpose(src, dst, lda, ldb);
        return;
    }

    if count == 0 {
        return;
    }
    let reduced_ldb = StrengthReducedUsize::new(ldb);
    for i in 0..count {
        let j = reduced_index(i, lda, reduced_ldb);
        dst[2 * i] = src[2 * j];
        dst[2 * i + 1] = src[2 * j + 1];
    }
}

/// Same as [`complex_transpose`], for a plane of plain scalars.
pub fn scalar_transpose<T: FftNum>(src: &[T], dst: &mut [T], lda: usize, ldb: usize, count: usize) {
    let len = lda * ldb;
    assert!(count <= len);
    assert!(src.len() >= len, "transpose source is shorter than the matrix");
    let src = &src[..len];
    let dst = &mut dst[..count];

    if count == len && count > 0 {
        transpose::transpose(src, dst, lda, ldb);
        return;
    }

    if count == 0 {
        return;
    }
    let reduced_ldb = StrengthReducedUsize::new(ldb);
    for (i, out) in dst.iter_mut().enumerate() {
        *out = src[reduced_index(i, lda, reduced_ldb)];
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_transpose_index() {
        // 2 rows of 3: [[0, 1, 2], [3, 4, 5]] becomes [[0, 3], [1, 4], [2, 5]]
        let expected = [0, 3, 1, 4, 2, 5];
        for (i, &e) in expected.iter().enumerate() {
            assert_eq!(transpose_index(i, 3, 2), e);
        }
    }

    #[test]
    fn test_complex_transpose() {
        let (lda, ldb) = (5, 3);
        let src: Vec<f32> = (0..2 * lda * ldb).map(|i| i as f32).collect();
        let mut dst = vec![0f32; src.len()];
        complex_transpose(&src, &mut dst, lda, ldb, lda * ldb);

        for i in 0..lda * ldb {
            let j = transpose_index(i, lda, ldb);
            assert_eq!(dst[2 * i], src[2 * j]);
            assert_eq!(dst[2 * i + 1], src[2 * j + 1]);
        }

        // swapping the dimensions undoes the transpose
        let mut back = vec![0f32; src.len()];
        complex_transpose(&dst, &mut back, ldb, lda, lda * ldb);
        assert_eq!(back, src);
    }

    #[test]
    fn test_partial_transpose() {
        let (lda, ldb) = (4, 4);
        let src: Vec<f64> = (0..2 * lda * ldb).map(|i| i as f64).collect();
        let mut full = vec![0f64; src.len()];
        let mut partial = vec![-1f64; src.len()];
        complex_transpose(&src, &mut full, lda, ldb, lda * ldb);
        complex_transpose(&src, &mut partial, lda, ldb, 6);

        assert_eq!(&partial[..12], &full[..12]);
        assert!(partial[12..].iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_partial_scalar_transpose() {
        let (lda, ldb) = (3, 5);
        let src: Vec<f32> = (0..15).map(|i| i as f32).collect();
        let mut full = vec![0f32; 15];
        scalar_transpose(&src, &mut full, lda, ldb, 15);
        for count in [1, 4, 7, 14] {
            // the destination only needs room for `count` values
            let mut partial = vec![-1f32; count];
            scalar_transpose(&src, &mut partial, lda, ldb, count);
            assert_eq!(&partial[..], &full[..count], "count = {}", count);
        }
    }

    #[test]
    fn test_scalar_transpose() {
        for (lda, ldb) in [(1, 1), (1, 7), (7, 1), (4, 8), (9, 6)] {
            let src: Vec<f32> = (0..lda * ldb).map(|i| i as f32).collect();
            let mut dst = vec![0f32; src.len()];
            let mut back = vec![0f32; src.len()];
            scalar_transpose(&src, &mut dst, lda, ldb, lda * ldb);
            scalar_transpose(&dst, &mut back, ldb, lda, lda * ldb);
            assert_eq!(back, src, "lda = {}, ldb = {}", lda, ldb);
        }
    }
}
