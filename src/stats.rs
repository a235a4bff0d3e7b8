//! Exact one-tailed binomial test for ABX results.
//!
//! Under the null hypothesis the listener guesses, so each trial is a fair coin.
//! The p-value is the probability of at least `correct` hits in `trials` tosses:
//!
//!   p = sum_{k=correct..trials} C(trials, k) * 0.5^trials
//!
//! Terms are summed from the tail inwards. Adding a non-negative term can never
//! lower a rounded sum, so p stays non-increasing in `correct` even in f64.

use serde::{Deserialize, Serialize};

/// Rejection threshold for the null hypothesis. `p <= alpha` rejects.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// C(n, k) via the multiplicative recurrence C(n, i) = C(n, i-1) * (n-i+1) / i,
/// iterating over the smaller of k and n-k.
///
/// Out-of-range k yields 0. Stays finite up to n ~ 1000.
pub fn binomial_coefficient(n: u64, k: u64) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = if k > n / 2 { n - k } else { k };
    let mut c = 1.0;
    for i in 1..=k {
        c = c * (n - i + 1) as f64 / i as f64;
    }
    c
}

/// P(X = k) for X ~ Binomial(n, 0.5).
pub fn binomial_pmf(n: u64, k: u64) -> f64 {
    binomial_coefficient(n, k) * 0.5f64.powi(n as i32)
}

/// One-tailed p-value of `correct` hits out of `trials`.
///
/// Negative inputs or `correct > trials` are not a valid experiment and
/// return NaN.
pub fn abx_p_value(trials: i64, correct: i64) -> f64 {
    if trials < 0 || correct < 0 || correct > trials {
        return f64::NAN;
    }
    if correct == 0 {
        return 1.0;
    }
    let n = trials as u64;
    let mut p = 0.0;
    for k in (correct as u64..=n).rev() {
        p += binomial_pmf(n, k);
    }
    p.min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Discrimination is statistically significant.
    RejectNull,
    FailToReject,
}

impl Verdict {
    pub fn from_p_value(p: f64) -> Self {
        if p <= SIGNIFICANCE_LEVEL {
            Verdict::RejectNull
        } else {
            Verdict::FailToReject
        }
    }

    pub fn is_significant(&self) -> bool {
        matches!(self, Verdict::RejectNull)
    }

    pub fn interpretation(&self, p: f64) -> String {
        match self {
            Verdict::RejectNull => format!(
                "Since the p-value ({:.4}) is less than or equal to the significance level of {}, \
                 we reject the null hypothesis: the difference was heard and is unlikely to be due to chance.",
                p, SIGNIFICANCE_LEVEL
            ),
            Verdict::FailToReject => format!(
                "Since the p-value ({:.4}) is greater than the significance level of {}, \
                 we fail to reject the null hypothesis: there is not enough evidence of an audible difference.",
                p, SIGNIFICANCE_LEVEL
            ),
        }
    }
}
