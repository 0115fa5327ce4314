use num_complex::Complex;
use num_traits::Zero;

use crate::common::FftNum;
use crate::math_utils::{is_supported_length, prime_factors};
use crate::twiddles::{chirp, compute_twiddle, narrow};
use crate::FftDirection;

/// Smallest length not below `len` whose prime factors are all supported.
pub(crate) fn smallest_supported_at_least(len: usize) -> usize {
    (len.max(1)..)
        .find(|&m| is_supported_length(m))
        .unwrap_or(len)
}

/// Smallest supported length a Bluestein convolution for `len` fits in, `>= 2 * len - 1`.
pub fn padded_len(len: usize) -> usize {
    smallest_supported_at_least((2 * len).saturating_sub(1))
}

/// Expresses a DFT of length `len` as a circular convolution of length `padded_len`.
///
/// With `a[n] = exp(-i*pi*n^2 / len)`:
///
/// `X[k] = a[k] * sum_n (x[n] * a[n]) * conj(a[k - n])`
///
/// The convolution runs as a forward transform, a pointwise multiply by the spectrum of the
/// convolution kernel, and an unnormalized inverse transform. Inverse transforms use the
/// conjugate of every table.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BluesteinExpander {
    len: usize,
    padded_len: usize,
}

impl BluesteinExpander {
    /// # Panics
    ///
    /// Panics if `padded_len < 2 * len - 1`.
    pub fn new(len: usize, padded_len: usize) -> Self {
        assert!(
            padded_len + 1 >= 2 * len,
            "padded length {} is too short for a Bluestein convolution of length {}",
            padded_len,
            len
        );
        Self { len, padded_len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    /// Scalars the chirp spectrum and the modifiers occupy in the twiddle buffer.
    pub fn twiddle_len(&self) -> usize {
        4 * self.padded_len
    }

    /// Offset of the modifiers, relative to the start of the Bluestein region.
    pub fn modifiers_offset(&self) -> usize {
        2 * self.padded_len
    }

    /// `a[n]` for `n < len`, zero for the padding.
    pub fn modifier(&self, n: usize) -> Complex<f64> {
        if n < self.len {
            chirp(n, self.len)
        } else {
            Complex::zero()
        }
    }

    /// Length-`padded_len` DFT of the convolution kernel `conj(a[n])`, placed at `n` and
    /// `padded_len - n`, divided by `padded_len`.
    pub fn chirp_spectrum(&self) -> Vec<Complex<f64>> {
        let m = self.padded_len;
        let mut kernel = vec![Complex::zero(); m];
        for n in 0..self.len {
            let value = chirp(n, self.len).conj();
            kernel[n] = value;
            if n > 0 {
                kernel[m - n] = value;
            }
        }

        let scale = 1.0 / m as f64;
        let mut spectrum = mixed_radix_dft(&kernel);
        for value in spectrum.iter_mut() {
            *value = *value * scale;
        }
        spectrum
    }

    /// Writes the chirp spectrum followed by the modifiers as interleaved pairs starting at
    /// `offset`, returning the offset just past the region.
    pub fn write_twiddles<T: FftNum>(&self, buffer: &mut [T], offset: usize) -> usize {
        let m = self.padded_len;
        let region = &mut buffer[offset..offset + self.twiddle_len()];
        let (spectrum_out, modifiers_out) = region.split_at_mut(2 * m);

        for (out, value) in spectrum_out.chunks_exact_mut(2).zip(self.chirp_spectrum()) {
            let value: Complex<T> = narrow(value);
            out[0] = value.re;
            out[1] = value.im;
        }
        for (n, out) in modifiers_out.chunks_exact_mut(2).enumerate() {
            let value: Complex<T> = narrow(self.modifier(n));
            out[0] = value.re;
            out[1] = value.im;
        }
        offset + self.twiddle_len()
    }
}

/// Forward DFT of `input`, decimating in time by each prime factor of its length in turn.
fn mixed_radix_dft(input: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let len = input.len();
    let roots: Vec<Complex<f64>> = (0..len)
        .map(|i| compute_twiddle(i, len, FftDirection::Forward))
        .collect();
    let radices: Vec<usize> = prime_factors(len)
        .iter()
        .flat_map(|factor| std::iter::repeat(factor.value).take(factor.count))
        .collect();

    let mut output = vec![Complex::zero(); len];
    dit_step(input, &mut output, &radices, &roots, 1);
    output
}

/// One level of the decimation. The roots of unity of this level's length are every
/// `root_stride`-th entry of `roots`.
fn dit_step(
    input: &[Complex<f64>],
    output: &mut [Complex<f64>],
    radices: &[usize],
    roots: &[Complex<f64>],
    root_stride: usize,
) {
    let len = input.len();
    let (radix, rest) = match radices.split_first() {
        Some((&radix, rest)) if len > 1 => (radix, rest),
        _ => {
            output.copy_from_slice(input);
            return;
        }
    };
    let m = len / radix;

    // spectra of the `radix` interleaved subsequences, back to back
    let mut spectra = vec![Complex::zero(); len];
    let mut sub = vec![Complex::zero(); m];
    for r in 0..radix {
        for (j, value) in sub.iter_mut().enumerate() {
            *value = input[j * radix + r];
        }
        dit_step(
            &sub,
            &mut spectra[r * m..(r + 1) * m],
            rest,
            roots,
            root_stride * radix,
        );
    }

    for (k, out) in output.iter_mut().enumerate() {
        let column = k % m;
        *out = (0..radix).fold(Complex::zero(), |acc, r| {
            acc + spectra[r * m + column] * roots[(r * k) % len * root_stride]
        });
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::test_utils::{compare_vectors, random_signal, reference_dft};

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(17), 33);
        assert_eq!(padded_len(1), 1);
        assert_eq!(padded_len(19), 39);
        // 2 * 29 - 1 = 57 = 3 * 19 and 58 = 2 * 29 are unsupported, 60 is the next candidate
        assert_eq!(padded_len(29), 60);
        for len in 1..200 {
            let padded = padded_len(len);
            assert!(padded + 1 >= 2 * len);
            assert!(is_supported_length(padded));
        }
    }

    /// Runs the convolution with reference DFTs in place of the factor chains.
    fn bluestein_with_reference(
        expander: &BluesteinExpander,
        input: &[Complex<f64>],
        direction: FftDirection,
    ) -> Vec<Complex<f64>> {
        let conjugate = direction == FftDirection::Inverse;
        let pick = |v: Complex<f64>| if conjugate { v.conj() } else { v };
        let m = expander.padded_len();

        let mut padded = vec![Complex::zero(); m];
        for (n, &x) in input.iter().enumerate() {
            padded[n] = x * pick(expander.modifier(n));
        }
        let mut spectrum = reference_dft(&padded, FftDirection::Forward);
        for (s, h) in spectrum.iter_mut().zip(expander.chirp_spectrum()) {
            *s = *s * pick(h);
        }
        let convolved = reference_dft(&spectrum, FftDirection::Inverse);
        (0..expander.len())
            .map(|k| convolved[k] * pick(expander.modifier(k)))
            .collect()
    }

    #[test]
    fn test_bluestein_identity() {
        for len in [2, 5, 17, 23] {
            for padded in [padded_len(len), padded_len(len) + 4] {
                let expander = BluesteinExpander::new(len, padded);
                let input: Vec<Complex<f64>> = random_signal(len);
                for direction in [FftDirection::Forward, FftDirection::Inverse] {
                    let expected = reference_dft(&input, direction);
                    let actual = bluestein_with_reference(&expander, &input, direction);
                    assert!(
                        compare_vectors(&expected, &actual),
                        "len = {}, padded = {}, direction = {}",
                        len,
                        padded,
                        direction
                    );
                }
            }
        }
    }

    #[test]
    fn test_mixed_radix_dft() {
        // smooth lengths, a large prime factor and the trivial length
        for len in [1, 2, 12, 33, 37, 60, 2 * 3 * 5 * 7 * 11] {
            let input: Vec<Complex<f64>> = random_signal(len);
            let expected = reference_dft(&input, FftDirection::Forward);
            assert!(
                compare_vectors(&expected, &mixed_radix_dft(&input)),
                "len = {}",
                len
            );
        }
    }

    #[test]
    fn test_chirp_spectrum() {
        let expander = BluesteinExpander::new(17, 36);
        let m = expander.padded_len();
        let mut kernel = vec![Complex::zero(); m];
        for n in 0..17 {
            kernel[n] = chirp(n, 17).conj();
            if n > 0 {
                kernel[m - n] = kernel[n];
            }
        }
        let expected: Vec<Complex<f64>> = reference_dft(&kernel, FftDirection::Forward)
            .into_iter()
            .map(|v| v / m as f64)
            .collect();
        assert!(compare_vectors(&expected, &expander.chirp_spectrum()));
    }

    #[test]
    fn test_write_twiddles() {
        let expander = BluesteinExpander::new(5, 9);
        let mut buffer = vec![0f32; 2 + expander.twiddle_len()];
        let end = expander.write_twiddles(&mut buffer, 2);
        assert_eq!(end, buffer.len());

        // modifiers follow the spectrum and are zero past the transform length
        let modifiers = &buffer[2 + expander.modifiers_offset()..];
        assert_eq!(modifiers[0], 1.0);
        assert_eq!(modifiers[1], 0.0);
        assert!(modifiers[10..].iter().all(|&v| v == 0.0));
    }
}
