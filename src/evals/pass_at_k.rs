//! Exact pass@k estimator.
//!
//! pass@k is the probability that at least one of `k` attempts drawn
//! without replacement from `n` completed attempts succeeds, given `c`
//! observed successes (Chen et al., 2021):
//!
//! ```text
//! pass@k = 1 - C(n-c, k) / C(n, k)
//! ```
//!
//! Both binomials are computed as exact integers and the fraction is
//! gcd-reduced before the single floating-point division, so large `n`
//! does not lose precision the way a log-space product would.

/// Exact binomial coefficient C(n, k).
///
/// Uses the multiplicative form with the symmetry `C(n, k) = C(n, n-k)`;
/// every intermediate division is exact. Saturates at `u128::MAX` on
/// overflow, which is far beyond any realistic attempt count.
fn binomial(n: u64, k: u64) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // C(n, i+1) = C(n, i) * (n - i) / (i + 1), exact at every step.
        result = match result.checked_mul((n - i) as u128) {
            Some(v) => v / (i as u128 + 1),
            None => return u128::MAX,
        };
    }
    result
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Estimate pass@k for one instance with `n` attempts and `c` successes.
///
/// The zero-success and full-success shortcuts are evaluated before the
/// `n < k` branch, so a fully-solved or fully-unsolved instance scores
/// correctly regardless of the `k` vs `n` relationship. `k > n` is a valid
/// input: drawing `k` without replacement from `n < k` attempts degenerates
/// to "did anything succeed".
pub fn estimate_pass_at_k(n: u64, c: u64, k: u64) -> f64 {
    debug_assert!(c <= n, "successes ({c}) must not exceed attempts ({n})");
    if c == 0 {
        return 0.0;
    }
    if c >= n {
        return 1.0;
    }
    if n < k {
        return 1.0;
    }

    let miss = binomial(n - c, k);
    let all = binomial(n, k);
    if all == 0 {
        // Unreachable for valid inputs: C(n, 0) is 1 and n >= k here.
        return 0.0;
    }
    let d = gcd(miss, all).max(1);
    1.0 - (miss / d) as f64 / (all / d) as f64
}
