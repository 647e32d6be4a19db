//! The two combining monoids shared by the dynamic program.
//!
//! The `f`/`g`/`h` recurrences are identical for maximization and for the
//! partition function; only the way candidate values are combined differs
//! (max versus log-sum-exp), plus one maximization-only pruning rule in `f`.
//! Both are captured by the [`Semiring`] trait so a single recurrence engine
//! serves both modes.

/// Returns `ln(e^x + e^y)` without overflowing for large magnitudes.
pub fn log_sum_exp(x: f64, y: f64) -> f64 {
    if x == f64::NEG_INFINITY && y == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if x > y {
        x + (y - x).exp().ln_1p()
    } else {
        y + (x - y).exp().ln_1p()
    }
}

/// Combining monoid of the dynamic program.
///
/// `ZERO` doubles as the "unfilled" sentinel of the memo tables: cells are
/// written exactly once, and the recursion structure guarantees no cell is
/// read back before that write with a legitimate value.
pub trait Semiring {
    /// Identity of [`Semiring::combine`].
    const ZERO: f64 = f64::NEG_INFINITY;

    /// In maximization the root-level clique may be forced to contain the
    /// lowest remaining vertex: some optimal solution always does, so the
    /// restriction is lossless for max but would undercount for sums.
    const PRUNE_EMPTY_SEPARATOR: bool;

    fn combine(a: f64, b: f64) -> f64;
}

/// Max-plus: maximization over rooted partition trees (MAP).
pub enum MaxPlus {}

impl Semiring for MaxPlus {
    const PRUNE_EMPTY_SEPARATOR: bool = true;

    fn combine(a: f64, b: f64) -> f64 {
        a.max(b)
    }
}

/// Log-sum-exp: partition function over rooted partition trees.
pub enum LogSumExp {}

impl Semiring for LogSumExp {
    const PRUNE_EMPTY_SEPARATOR: bool = false;

    fn combine(a: f64, b: f64) -> f64 {
        log_sum_exp(a, b)
    }
}
