use num_complex::Complex;
use num_traits::{Float, Zero};

use rand::distributions::{uniform::SampleUniform, Distribution, Uniform};
use rand::{rngs::StdRng, SeedableRng};

use crate::twiddles::compute_twiddle;
use crate::{DeviceInfo, FftDirection, FftNum};

/// The seed for the random number generator used to generate
/// random signals. It's defined here so that we have deterministic
/// tests
const RNG_SEED: [u8; 32] = [
    1, 9, 1, 0, 1, 1, 4, 3, 1, 4, 9, 8, 4, 1, 4, 8, 2, 8, 1, 2, 2, 2, 6, 1, 2, 3, 4, 5, 6, 7, 8, 9,
];

pub fn random_signal<T: FftNum + SampleUniform>(length: usize) -> Vec<Complex<T>> {
    let mut sig = Vec::with_capacity(length);
    let dist: Uniform<T> = Uniform::new(T::zero(), T::from_f64(10.0).unwrap());
    let mut rng: StdRng = SeedableRng::from_seed(RNG_SEED);
    for _ in 0..length {
        sig.push(Complex {
            re: (dist.sample(&mut rng)),
            im: (dist.sample(&mut rng)),
        });
    }
    sig
}

pub fn compare_vectors<T: FftNum + Float>(vec1: &[Complex<T>], vec2: &[Complex<T>]) -> bool {
    assert_eq!(vec1.len(), vec2.len());
    let mut error = T::zero();
    for (&a, &b) in vec1.iter().zip(vec2.iter()) {
        error = error + (a - b).norm();
    }
    (error.to_f64().unwrap() / vec1.len() as f64) < 0.1f64
}

/// Naive O(n^2) DFT, used as the reference every kernel is checked against.
pub fn reference_dft<T: FftNum>(input: &[Complex<T>], direction: FftDirection) -> Vec<Complex<T>> {
    let len = input.len();
    (0..len)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .fold(Complex::zero(), |acc, (n, &x)| {
                    acc + x * compute_twiddle::<T>(n * k, len, direction)
                })
        })
        .collect()
}

/// Flattens complex values into `[re, im, re, im, ...]`.
pub fn interleave<T: FftNum>(values: &[Complex<T>]) -> Vec<T> {
    values.iter().flat_map(|c| [c.re, c.im]).collect()
}

pub fn deinterleave<T: FftNum>(scalars: &[T]) -> Vec<Complex<T>> {
    scalars
        .chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect()
}

/// A small device that forces modest lengths onto the global path.
pub fn tiny_device() -> DeviceInfo {
    DeviceInfo {
        compute_units: 2,
        subgroup_size: 4,
        sgs_per_wg: 2,
        local_memory: 40,
        max_workitem_len: 4,
        residency_bytes: 1024,
    }
}
