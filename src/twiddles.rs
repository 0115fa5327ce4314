use crate::{common::FftNum, FftDirection};
use num_complex::Complex;

/// Computes `exp(-2*pi*i * index / len)` for forward transforms, or its conjugate for inverse
/// transforms. The angle is evaluated in f64 and narrowed afterwards, so f32 tables carry no
/// accumulated rounding from the angle computation.
pub fn compute_twiddle<T: FftNum>(
    index: usize,
    fft_len: usize,
    direction: FftDirection,
) -> Complex<T> {
    let constant = -2f64 * std::f64::consts::PI / fft_len as f64;
    let angle = constant * (index % fft_len) as f64;

    let result = Complex {
        re: T::from_f64(angle.cos()).unwrap(),
        im: T::from_f64(angle.sin()).unwrap(),
    };

    match direction {
        FftDirection::Forward => result,
        FftDirection::Inverse => result.conj(),
    }
}

pub fn generate_twiddle_factors<T: FftNum>(
    fft_len: usize,
    direction: FftDirection,
) -> Vec<Complex<T>> {
    (0..fft_len)
        .map(|i| compute_twiddle(i, fft_len, direction))
        .collect()
}

/// Bluestein chirp `exp(-i*pi*n^2 / len)`, evaluated in f64. `n*n` is reduced modulo `2*len`
/// before the angle is formed so large indices keep their precision.
pub fn chirp(n: usize, len: usize) -> Complex<f64> {
    let reduced = ((n as u128 * n as u128) % (2 * len as u128)) as f64;
    let angle = -std::f64::consts::PI * reduced / len as f64;
    Complex::from_polar(1.0, angle)
}

/// Narrows an f64 complex value to `T`.
#[inline]
pub fn narrow<T: FftNum>(value: Complex<f64>) -> Complex<T> {
    Complex {
        re: T::from_f64(value.re).unwrap(),
        im: T::from_f64(value.im).unwrap(),
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::test_utils::compare_vectors;
    use std::f32;

    #[test]
    fn test_generate() {
        //test the length-0 case
        let zero_twiddles: Vec<Complex<f32>> = generate_twiddle_factors(0, FftDirection::Forward);
        assert_eq!(0, zero_twiddles.len());

        let constant = -2f32 * f32::consts::PI;

        for len in 1..10 {
            let actual: Vec<Complex<f32>> = generate_twiddle_factors(len, FftDirection::Forward);
            let expected: Vec<Complex<f32>> = (0..len)
                .map(|i| Complex::from_polar(1f32, constant * i as f32 / len as f32))
                .collect();

            assert!(compare_vectors(&actual, &expected), "len = {}", len)
        }

        //for each len, verify that each element in the inverse is the conjugate of the non-inverse
        for len in 1..10 {
            let twiddles: Vec<Complex<f32>> = generate_twiddle_factors(len, FftDirection::Forward);
            let mut twiddles_inverse: Vec<Complex<f32>> =
                generate_twiddle_factors(len, FftDirection::Inverse);

            for value in twiddles_inverse.iter_mut() {
                *value = value.conj();
            }

            assert!(
                compare_vectors(&twiddles, &twiddles_inverse),
                "len = {}",
                len
            )
        }
    }

    #[test]
    fn test_chirp() {
        for len in [1usize, 5, 17, 100] {
            for n in 0..3 * len {
                let angle = -std::f64::consts::PI * (n * n) as f64 / len as f64;
                let expected = Complex::from_polar(1.0, angle);
                let actual = chirp(n, len);
                assert!((actual - expected).norm() < 1e-9, "len = {}, n = {}", len, n);
            }
        }
        // the chirp is periodic in 2*len when len is odd, and in len when len is even
        assert!((chirp(3, 17) - chirp(3 + 34, 17)).norm() < 1e-12);
        assert!((chirp(3, 16) - chirp(3 + 16, 16)).norm() < 1e-12);
    }
}
