//! Drawing junction trees from the posterior.
//!
//! Both samplers walk the same recursion as the forward dynamic program,
//! choosing at every `f`/`g`/`h` branching point a candidate with probability
//! proportional to its contribution to the cell total. [`sample_naive`]
//! resolves each choice by inverse CDF with one fresh uniform.
//! [`AdaptiveSampler`] instead caches batches of pre-drawn choices per DP
//! cell: a cache refill builds a Walker alias table over the cell's
//! distribution, draws a batch in O(1) per draw, and doubles the batch size
//! for the next refill, so the O(k) table construction amortizes away for
//! frequently revisited cells.
//!
//! The sum tables must be filled (via
//! [`partition_function`](crate::solver::SumSolver::partition_function))
//! before sampling.

use rand::Rng;

use crate::alias::AliasTable;
use crate::semiring::log_sum_exp;
use crate::set::VarSet;
use crate::solver::{f_candidates, g_candidates, h_candidates, SumSolver};
use crate::table::DisjointPairTable;
use crate::tree::TreeNode;

// ----------------------------------------------------------------------
// Naive inverse-CDF sampling
// ----------------------------------------------------------------------

/// Draws one junction tree, spending one uniform per recursive choice.
pub fn sample_naive<R: Rng + ?Sized>(solver: &mut SumSolver, rng: &mut R) -> TreeNode {
    let n = solver.num_vars();
    naive_f(solver, rng, VarSet::empty(), VarSet::complete(n))
}

fn naive_f<R: Rng + ?Sized>(solver: &mut SumSolver, rng: &mut R, s: VarSet, r: VarSet) -> TreeNode {
    let total = solver.f(s, r);
    let threshold = rng.random::<f64>().ln() + total;

    let mut acc = f64::NEG_INFINITY;
    for d in f_candidates(solver.width(), s, r, false) {
        let clique = s | d;
        let clique_score = solver.scores().get(clique);
        let value = clique_score + solver.g(clique, r ^ d);
        acc = log_sum_exp(acc, value);

        if acc >= threshold {
            let mut node = TreeNode::new(clique, s);
            naive_g(solver, rng, clique, r ^ d, &mut node);
            return node;
        }
    }

    unreachable!("inverse CDF ran past the clique candidates of f({}, {})", s, r);
}

fn naive_g<R: Rng + ?Sized>(
    solver: &mut SumSolver,
    rng: &mut R,
    c: VarSet,
    u: VarSet,
    node: &mut TreeNode,
) {
    if u.is_empty() {
        return;
    }

    let total = solver.g(c, u);
    let threshold = rng.random::<f64>().ln() + total;

    let mut acc = f64::NEG_INFINITY;
    for r in g_candidates(u) {
        let value = solver.h(c, r) + solver.g(c, u ^ r);
        acc = log_sum_exp(acc, value);

        if acc >= threshold {
            naive_h(solver, rng, c, r, node);
            naive_g(solver, rng, c, u ^ r, node);
            return;
        }
    }

    unreachable!("inverse CDF ran past the split candidates of g({}, {})", c, u);
}

fn naive_h<R: Rng + ?Sized>(
    solver: &mut SumSolver,
    rng: &mut R,
    c: VarSet,
    r: VarSet,
    node: &mut TreeNode,
) {
    let total = solver.h(c, r);
    let threshold = rng.random::<f64>().ln() + total;

    let mut acc = f64::NEG_INFINITY;
    for s in h_candidates(c) {
        let separator_score = solver.scores().get(s);
        let value = solver.f(s, r) - separator_score;
        acc = log_sum_exp(acc, value);

        if acc >= threshold {
            let child = naive_f(solver, rng, s, r);
            node.push(child);
            return;
        }
    }

    unreachable!("inverse CDF ran past the separator candidates of h({}, {})", c, r);
}

// ----------------------------------------------------------------------
// Adaptive sampling with per-cell alias caches
// ----------------------------------------------------------------------

/// Pre-drawn choices for one DP cell.
#[derive(Debug, Clone)]
struct SampleCache {
    samples: Vec<VarSet>,
    /// Batch size of the next refill; doubles each time.
    next: usize,
}

impl SampleCache {
    fn new() -> Self {
        Self { samples: Vec::new(), next: 1 }
    }

    fn refill<R: Rng + ?Sized>(&mut self, sets: &[VarSet], probs: &[f64], rng: &mut R) {
        let alias = AliasTable::new(probs);
        self.samples.clear();
        self.samples.reserve(self.next);
        for _ in 0..self.next {
            self.samples.push(sets[alias.draw(rng)]);
        }
        self.next *= 2;
    }
}

/// Sampler that amortizes alias-table construction across draws.
///
/// The caches mirror the shape of the DP tables and are dropped with the
/// sampler.
pub struct AdaptiveSampler {
    f_cache: DisjointPairTable<Option<SampleCache>>,
    g_cache: DisjointPairTable<Option<SampleCache>>,
    h_cache: DisjointPairTable<Option<SampleCache>>,
}

impl AdaptiveSampler {
    pub fn new(solver: &SumSolver) -> Self {
        let n = solver.num_vars();
        let w = solver.width();
        Self {
            f_cache: DisjointPairTable::new(n, w, None),
            g_cache: DisjointPairTable::new(n, w, None),
            h_cache: DisjointPairTable::new(n, w, None),
        }
    }

    /// Draws one junction tree.
    pub fn sample<R: Rng + ?Sized>(&mut self, solver: &mut SumSolver, rng: &mut R) -> TreeNode {
        let n = solver.num_vars();
        self.sample_f(solver, rng, VarSet::empty(), VarSet::complete(n))
    }

    fn sample_f<R: Rng + ?Sized>(
        &mut self,
        solver: &mut SumSolver,
        rng: &mut R,
        s: VarSet,
        r: VarSet,
    ) -> TreeNode {
        let d = self.draw_f(solver, rng, s, r);
        let clique = s | d;
        let mut node = TreeNode::new(clique, s);
        self.sample_g(solver, rng, clique, r ^ d, &mut node);
        node
    }

    fn sample_g<R: Rng + ?Sized>(
        &mut self,
        solver: &mut SumSolver,
        rng: &mut R,
        c: VarSet,
        u: VarSet,
        node: &mut TreeNode,
    ) {
        if u.is_empty() {
            return;
        }
        let r = self.draw_g(solver, rng, c, u);
        self.sample_h(solver, rng, c, r, node);
        self.sample_g(solver, rng, c, u ^ r, node);
    }

    fn sample_h<R: Rng + ?Sized>(
        &mut self,
        solver: &mut SumSolver,
        rng: &mut R,
        c: VarSet,
        r: VarSet,
        node: &mut TreeNode,
    ) {
        let s = self.draw_h(solver, rng, c, r);
        let child = self.sample_f(solver, rng, s, r);
        node.push(child);
    }

    fn draw_f<R: Rng + ?Sized>(
        &mut self,
        solver: &mut SumSolver,
        rng: &mut R,
        s: VarSet,
        r: VarSet,
    ) -> VarSet {
        let empty = self.f_cache.get(s, r).as_ref().map_or(true, |c| c.samples.is_empty());
        if empty {
            let (sets, probs) = f_distribution(solver, s, r);
            let cache = self.f_cache.get_mut(s, r).get_or_insert_with(SampleCache::new);
            cache.refill(&sets, &probs, rng);
        }
        let cache = self.f_cache.get_mut(s, r).as_mut().expect("cache just refilled");
        cache.samples.pop().expect("refilled cache holds at least one sample")
    }

    fn draw_g<R: Rng + ?Sized>(
        &mut self,
        solver: &mut SumSolver,
        rng: &mut R,
        c: VarSet,
        u: VarSet,
    ) -> VarSet {
        let empty = self.g_cache.get(c, u).as_ref().map_or(true, |cache| cache.samples.is_empty());
        if empty {
            let (sets, probs) = g_distribution(solver, c, u);
            let cache = self.g_cache.get_mut(c, u).get_or_insert_with(SampleCache::new);
            cache.refill(&sets, &probs, rng);
        }
        let cache = self.g_cache.get_mut(c, u).as_mut().expect("cache just refilled");
        cache.samples.pop().expect("refilled cache holds at least one sample")
    }

    fn draw_h<R: Rng + ?Sized>(
        &mut self,
        solver: &mut SumSolver,
        rng: &mut R,
        c: VarSet,
        r: VarSet,
    ) -> VarSet {
        let empty = self.h_cache.get(c, r).as_ref().map_or(true, |cache| cache.samples.is_empty());
        if empty {
            let (sets, probs) = h_distribution(solver, c, r);
            let cache = self.h_cache.get_mut(c, r).get_or_insert_with(SampleCache::new);
            cache.refill(&sets, &probs, rng);
        }
        let cache = self.h_cache.get_mut(c, r).as_mut().expect("cache just refilled");
        cache.samples.pop().expect("refilled cache holds at least one sample")
    }
}

/// Candidate sets and normalized probabilities of the `f(S, R)` cell.
fn f_distribution(solver: &mut SumSolver, s: VarSet, r: VarSet) -> (Vec<VarSet>, Vec<f64>) {
    let total = solver.f(s, r);
    let mut sets = Vec::new();
    let mut probs = Vec::new();
    for d in f_candidates(solver.width(), s, r, false) {
        let clique = s | d;
        let clique_score = solver.scores().get(clique);
        let value = clique_score + solver.g(clique, r ^ d);
        sets.push(d);
        probs.push((value - total).exp());
    }
    (sets, probs)
}

/// Candidate sets and normalized probabilities of the `g(C, U)` cell.
fn g_distribution(solver: &mut SumSolver, c: VarSet, u: VarSet) -> (Vec<VarSet>, Vec<f64>) {
    let total = solver.g(c, u);
    let mut sets = Vec::new();
    let mut probs = Vec::new();
    for r in g_candidates(u) {
        let value = solver.h(c, r) + solver.g(c, u ^ r);
        sets.push(r);
        probs.push((value - total).exp());
    }
    (sets, probs)
}

/// Candidate sets and normalized probabilities of the `h(C, R)` cell.
fn h_distribution(solver: &mut SumSolver, c: VarSet, r: VarSet) -> (Vec<VarSet>, Vec<f64>) {
    let total = solver.h(c, r);
    let mut sets = Vec::new();
    let mut probs = Vec::new();
    for s in h_candidates(c) {
        let separator_score = solver.scores().get(s);
        let value = solver.f(s, r) - separator_score;
        sets.push(s);
        probs.push((value - total).exp());
    }
    (sets, probs)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::scores::LocalScores;
    use crate::solver::SolverConfig;

    fn sum_solver(n: u32, w: u32) -> SumSolver {
        let scores = LocalScores::from_fn(n, n, |_| 0.0);
        let mut solver = SumSolver::new(scores, SolverConfig::new(w)).unwrap();
        solver.partition_function();
        solver
    }

    fn assert_valid_tree(tree: &TreeNode, n: u32, w: u32) {
        assert!(tree.width() <= w);
        assert!(tree.separator.is_empty());
        // Every vertex is covered exactly once across subtree roots.
        let mut seen = VarSet::empty();
        for node in tree.iter() {
            assert!(node.separator.is_subset_of(node.clique));
            let fresh = node.clique ^ node.separator;
            assert!(seen.is_disjoint_from(fresh));
            seen = seen | fresh;
        }
        assert_eq!(seen, VarSet::complete(n));
        assert!(tree.to_graph(n).is_chordal());
    }

    #[test]
    fn test_naive_draws_valid_trees() {
        let mut solver = sum_solver(5, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let tree = sample_naive(&mut solver, &mut rng);
            assert_valid_tree(&tree, 5, 5);
        }
    }

    #[test]
    fn test_adaptive_draws_valid_trees() {
        let mut solver = sum_solver(5, 3);
        let mut sampler = AdaptiveSampler::new(&solver);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let tree = sampler.sample(&mut solver, &mut rng);
            assert_valid_tree(&tree, 5, 3);
        }
    }

    #[test]
    fn test_cache_batches_double() {
        let mut cache = SampleCache::new();
        let sets = [VarSet::singleton(0), VarSet::singleton(1)];
        let probs = [0.5, 0.5];
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        cache.refill(&sets, &probs, &mut rng);
        assert_eq!(cache.samples.len(), 1);
        cache.refill(&sets, &probs, &mut rng);
        assert_eq!(cache.samples.len(), 2);
        cache.refill(&sets, &probs, &mut rng);
        assert_eq!(cache.samples.len(), 4);
        assert_eq!(cache.next, 8);
    }

    #[test]
    fn test_samplers_agree_on_clique_marginals() {
        // On two vertices there are three rooted trees with zero scores:
        // two rootings of the edgeless graph and the single pair clique, so
        // the pair clique appears with probability 1/3.
        let draws = 3000;

        let mut solver = sum_solver(2, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let naive_pairs = (0..draws)
            .filter(|_| sample_naive(&mut solver, &mut rng).node_count() == 1)
            .count();

        let mut solver = sum_solver(2, 2);
        let mut sampler = AdaptiveSampler::new(&solver);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let adaptive_pairs = (0..draws)
            .filter(|_| sampler.sample(&mut solver, &mut rng).node_count() == 1)
            .count();

        for pairs in [naive_pairs, adaptive_pairs] {
            let observed = pairs as f64 / draws as f64;
            assert!(
                (observed - 1.0 / 3.0).abs() < 0.05,
                "pair-clique frequency {:.3} is far from 1/3",
                observed
            );
        }
    }
}
