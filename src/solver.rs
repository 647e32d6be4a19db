//! The dynamic program over rooted partition trees.
//!
//! A rooted partition tree grows from a root clique downward: `f(S, R)`
//! extends the separator `S` into a clique `C = S ∪ D` with `D` drawn from
//! the unused vertices `R`, `g(C, U)` splits the remaining vertices `U` among
//! the subtrees hanging off `C`, and `h(C, R)` picks the separator of a
//! single subtree. With log-scores the recurrences are
//!
//! ```text
//! f(S, R) = ⊕_{∅ ≠ D ⊆ R, |D| ≤ W - |S|}  score(S ∪ D) + g(S ∪ D, R \ D)
//! g(C, U) = 0                                     if U = ∅
//!         = ⊕_{first(U) ∈ R ⊆ U}  h(C, R) + g(C, U \ R)
//! h(C, R) = ⊕_{S ⊊ C}  f(S, R) - score(S)
//! ```
//!
//! where `⊕` is `max` for maximization and `log-sum-exp` for the partition
//! function; `g` pins the lowest element of `U` into the first part so each
//! unordered family of subtrees is produced exactly once. The answer to an
//! instance is `f(∅, V)`.
//!
//! [`Solver`] owns the three memo tables and is generic over the semiring,
//! so max tables and sum tables can never be mixed within one instance.

use std::marker::PhantomData;

use crate::error::Error;
use crate::scores::LocalScores;
use crate::semiring::{LogSumExp, MaxPlus, Semiring};
use crate::set::VarSet;
use crate::subsets::{SubsetRange, SubsetRangeK};
use crate::table::DisjointPairTable;
use crate::tree::TreeNode;

/// MAP solver: max-plus tables.
pub type MaxSolver = Solver<MaxPlus>;

/// Partition-function solver: log-sum-exp tables, required by the samplers.
pub type SumSolver = Solver<LogSumExp>;

/// The candidate space of `h(C, R)`: every proper subset of `C`.
pub(crate) fn h_candidates(c: VarSet) -> SubsetRange {
    SubsetRange::with_bounds(VarSet::empty(), c, true, false)
}

/// The candidate space of `g(C, U)`: subsets of `U` containing its lowest
/// element. `U` must be non-empty.
pub(crate) fn g_candidates(u: VarSet) -> SubsetRange {
    let pinned = u.first().expect("g candidates need a non-empty remainder");
    SubsetRange::new(VarSet::singleton(pinned), u)
}

/// The candidate space of `f(S, R)`: non-empty `D ⊆ R` with
/// `|D| ≤ width - |S|`. With `prune_empty_separator` set and `S = ∅`, the
/// lowest element of `R` is forced into `D` (sound for maximization only).
pub(crate) fn f_candidates(
    width: u32,
    s: VarSet,
    r: VarSet,
    prune_empty_separator: bool,
) -> SubsetRangeK {
    let card_s = s.cardinality();
    debug_assert!(card_s < width, "separator {} leaves no room below width {}", s, width);

    if prune_empty_separator && s.is_empty() {
        let pinned = r.first().expect("the root call sees all vertices");
        SubsetRangeK::new(VarSet::singleton(pinned), r, width)
    } else {
        SubsetRangeK::with_bounds(VarSet::empty(), r, width - card_s, false, true)
    }
}

/// Configuration for a [`Solver`].
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum clique size `W` (clamped to the score file's subset bound).
    pub width: u32,
    /// Absolute tolerance used when backtracking re-identifies the child
    /// that produced a recorded value.
    pub tolerance: f64,
    /// Refuse to allocate tables whose estimate exceeds this many MiB.
    pub memory_limit_mib: Option<u64>,
}

impl SolverConfig {
    pub fn new(width: u32) -> Self {
        Self { width, tolerance: 1e-6, memory_limit_mib: None }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_memory_limit_mib(mut self, limit_mib: u64) -> Self {
        self.memory_limit_mib = Some(limit_mib);
        self
    }
}

/// Owns the instance (`N`, `W`, local scores) and the three DP tables.
pub struct Solver<M: Semiring> {
    n: u32,
    width: u32,
    tolerance: f64,
    scores: LocalScores,
    f_tab: DisjointPairTable<f64>,
    g_tab: DisjointPairTable<f64>,
    h_tab: DisjointPairTable<f64>,
    _mode: PhantomData<M>,
}

impl<M: Semiring> Solver<M> {
    /// Allocates the DP tables for the given scores.
    ///
    /// Logs the estimated memory footprint before allocating and fails early
    /// when a configured limit would be exceeded.
    pub fn new(scores: LocalScores, config: SolverConfig) -> Result<Self, Error> {
        if config.width == 0 {
            return Err(Error::ZeroWidth);
        }

        let n = scores.num_vars();
        let mut width = config.width;
        if width > scores.max_size() {
            log::warn!(
                "requested width {} exceeds the score bound {}; clamping",
                width,
                scores.max_size()
            );
            width = scores.max_size();
        }

        let cells = DisjointPairTable::<f64>::cells(n, width);
        let estimate_mib = (3 * cells * std::mem::size_of::<f64>() as u64) as f64 / 1024.0 / 1024.0;
        if estimate_mib < 1000.0 {
            log::info!("estimated DP table memory: {:.2} MiB", estimate_mib);
        } else {
            log::info!("estimated DP table memory: {:.2} GiB", estimate_mib / 1024.0);
        }
        if let Some(limit_mib) = config.memory_limit_mib {
            if estimate_mib > limit_mib as f64 {
                return Err(Error::MemoryLimit {
                    estimate_mib: estimate_mib.ceil() as u64,
                    limit_mib,
                });
            }
        }

        log::debug!("allocating DP tables f, g, h");
        Ok(Self {
            n,
            width,
            tolerance: config.tolerance,
            scores,
            f_tab: DisjointPairTable::new(n, width, f64::NEG_INFINITY),
            g_tab: DisjointPairTable::new(n, width, f64::NEG_INFINITY),
            h_tab: DisjointPairTable::new(n, width, f64::NEG_INFINITY),
            _mode: PhantomData,
        })
    }

    pub fn num_vars(&self) -> u32 {
        self.n
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn scores(&self) -> &LocalScores {
        &self.scores
    }

    fn run(&mut self) -> f64 {
        self.f(VarSet::empty(), VarSet::complete(self.n))
    }

    pub(crate) fn f(&mut self, s: VarSet, r: VarSet) -> f64 {
        let cached = *self.f_tab.get(s, r);
        if cached != f64::NEG_INFINITY {
            return cached;
        }

        let mut acc = M::ZERO;
        for d in f_candidates(self.width, s, r, M::PRUNE_EMPTY_SEPARATOR) {
            let clique = s | d;
            let clique_score = self.scores.get(clique);
            let value = clique_score + self.g(clique, r ^ d);
            acc = M::combine(acc, value);
        }

        self.f_tab.set(s, r, acc);
        acc
    }

    pub(crate) fn g(&mut self, c: VarSet, u: VarSet) -> f64 {
        let cached = *self.g_tab.get(c, u);
        if cached != f64::NEG_INFINITY {
            return cached;
        }

        if u.is_empty() {
            self.g_tab.set(c, u, 0.0);
            return 0.0;
        }

        let mut acc = M::ZERO;
        for r in g_candidates(u) {
            let value = self.h(c, r) + self.g(c, u ^ r);
            acc = M::combine(acc, value);
        }

        self.g_tab.set(c, u, acc);
        acc
    }

    pub(crate) fn h(&mut self, c: VarSet, r: VarSet) -> f64 {
        let cached = *self.h_tab.get(c, r);
        if cached != f64::NEG_INFINITY {
            return cached;
        }

        let mut acc = M::ZERO;
        for s in h_candidates(c) {
            let separator_score = self.scores.get(s);
            let value = self.f(s, r) - separator_score;
            acc = M::combine(acc, value);
        }

        self.h_tab.set(c, r, acc);
        acc
    }
}

impl Solver<MaxPlus> {
    /// Computes the MAP score and reconstructs one optimal junction tree.
    pub fn maximize(&mut self) -> (f64, TreeNode) {
        log::debug!("computing max tables");
        let best = self.run();
        log::debug!("optimum {} found, backtracking", best);
        let tree = self.backtrack_f(VarSet::empty(), VarSet::complete(self.n), best);
        (best, tree)
    }

    /// Re-walks the `f` candidate space in forward order and descends into
    /// the first child whose value reproduces `goal` within the tolerance.
    fn backtrack_f(&mut self, s: VarSet, r: VarSet, goal: f64) -> TreeNode {
        for d in f_candidates(self.width, s, r, true) {
            let clique = s | d;
            let clique_score = self.scores.get(clique);
            let below = self.g(clique, r ^ d);
            if (clique_score + below - goal).abs() <= self.tolerance {
                let mut node = TreeNode::new(clique, s);
                self.backtrack_g(clique, r ^ d, below, &mut node);
                return node;
            }
        }
        panic!("no clique extension reproduces the recorded optimum; DP tables are inconsistent");
    }

    fn backtrack_g(&mut self, c: VarSet, u: VarSet, goal: f64, node: &mut TreeNode) {
        if u.is_empty() {
            return;
        }
        for r in g_candidates(u) {
            let one = self.h(c, r);
            let rest = self.g(c, u ^ r);
            if (one + rest - goal).abs() <= self.tolerance {
                self.backtrack_h(c, r, one, node);
                self.backtrack_g(c, u ^ r, rest, node);
                return;
            }
        }
        panic!("no remainder split reproduces the recorded optimum; DP tables are inconsistent");
    }

    fn backtrack_h(&mut self, c: VarSet, r: VarSet, goal: f64, node: &mut TreeNode) {
        for s in h_candidates(c) {
            let separator_score = self.scores.get(s);
            let value = self.f(s, r);
            if (value - separator_score - goal).abs() <= self.tolerance {
                let child = self.backtrack_f(s, r, value);
                node.push(child);
                return;
            }
        }
        panic!("no separator choice reproduces the recorded optimum; DP tables are inconsistent");
    }
}

impl Solver<LogSumExp> {
    /// Fills the sum tables and returns the log-partition function
    /// `ln Σ exp(score)` over all rooted partition trees of width ≤ `W`.
    pub fn partition_function(&mut self) -> f64 {
        log::debug!("computing sum tables");
        self.run()
    }
}
