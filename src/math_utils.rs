use num_integer::Roots;

/// Largest prime any kernel level can evaluate directly. Lengths with a larger prime factor are
/// padded with Bluestein's algorithm.
pub const MAX_SUPPORTED_PRIME: usize = 13;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct PrimeFactor {
    pub value: usize,
    pub count: usize,
}

/// Factors an integer into its prime factors.
pub fn prime_factors(mut n: usize) -> Vec<PrimeFactor> {
    let mut result = Vec::new();
    if n == 0 {
        return result;
    }

    let trailing_zeros = n.trailing_zeros();
    if trailing_zeros > 0 {
        result.push(PrimeFactor {
            value: 2,
            count: trailing_zeros as usize,
        });
        n >>= trailing_zeros;
    }
    if n > 1 {
        let mut divisor = 3;
        let mut limit = n.sqrt() + 1;
        while divisor < limit {
            let mut count = 0;
            while n % divisor == 0 {
                n /= divisor;
                count += 1;
            }

            if count > 0 {
                result.push(PrimeFactor {
                    value: divisor,
                    count,
                });
            }

            // recalculate the limit to reduce the amount of other factors we need to check
            limit = n.sqrt() + 1;
            divisor += 2;
        }

        if n > 1 {
            result.push(PrimeFactor { value: n, count: 1 });
        }
    }

    result
}

/// Returns true if every prime factor of `len` can be evaluated by some kernel level.
pub fn is_supported_length(len: usize) -> bool {
    len > 0
        && prime_factors(len)
            .iter()
            .all(|factor| factor.value <= MAX_SUPPORTED_PRIME)
}

/// Largest divisor of `n` that is not greater than `limit`. Always at least 1.
pub fn largest_divisor_at_most(n: usize, limit: usize) -> usize {
    (1..=limit.min(n)).rev().find(|d| n % d == 0).unwrap_or(1)
}

/// Splits `n` into two factors for a subgroup: the returned factor is the part spread across
/// lanes, at most `subgroup_size`.
#[inline]
pub fn factorize_sg(n: usize, subgroup_size: usize) -> usize {
    largest_divisor_at_most(n, subgroup_size)
}

/// Splits `n` into two factors that are as close as possible, returning the smaller one.
#[inline]
pub fn factorize(n: usize) -> usize {
    largest_divisor_at_most(n, n.sqrt())
}

/// All divisors of `n`, largest first.
pub fn divisors_descending(n: usize) -> Vec<usize> {
    let mut small = Vec::new();
    let mut large = Vec::new();
    let mut d = 1;
    while d * d <= n {
        if n % d == 0 {
            small.push(d);
            if d * d != n {
                large.push(n / d);
            }
        }
        d += 1;
    }
    large.into_iter().chain(small.into_iter().rev()).collect()
}
