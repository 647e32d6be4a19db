//! # jtree-rs: junction-tree inference for decomposable graphical models
//!
//! **`jtree-rs`** finds and samples from the posterior over *decomposable*
//! (chordal) undirected graphical models on a fixed vertex set, given
//! additive local log-scores on vertex subsets. A chordal graph is handled
//! through a *junction tree* of its maximal cliques, and the heavy lifting is
//! a dynamic program over rooted partition trees that serves two modes with
//! one recurrence engine:
//!
//! - **Maximization** (max-plus): the single best-scoring junction tree,
//!   reconstructed by backtracking.
//! - **Partition function** (log-sum-exp): the normalizer over all rooted
//!   partition trees, enabling exact posterior sampling either by inverse
//!   CDF or through an adaptive sampler that caches batches of alias-method
//!   draws per table cell.
//!
//! ## Basic usage
//!
//! ```rust
//! use jtree_rs::scores::LocalScores;
//! use jtree_rs::solver::{MaxSolver, SolverConfig};
//!
//! // Two vertices; the pair {0,1} carries all the mass.
//! let scores = LocalScores::from_fn(2, 2, |s| if s.cardinality() == 2 { 1.0 } else { 0.0 });
//! let mut solver = MaxSolver::new(scores, SolverConfig::new(2)).unwrap();
//!
//! let (best, tree) = solver.maximize();
//! assert!((best - 1.0).abs() < 1e-9);
//! assert_eq!(tree.node_count(), 1);
//! assert_eq!(tree.to_compact(), "3");
//! ```
//!
//! ## Core components
//!
//! - **[`solver`]**: the `f`/`g`/`h` recurrences over memoized
//!   disjoint-pair tables, MAP backtracking.
//! - **[`sample`]**: naive and adaptive posterior samplers.
//! - **[`tree`]**: the junction-tree result model, including the compact
//!   text form and the Thomas–Green junction-tree count.
//! - **[`graph`]**: adjacency projection, chordality checks, and the exact
//!   enumeration oracle for small instances.
//! - **[`scores`]**: the DMST subset-score file format.

pub mod alias;
pub mod error;
pub mod graph;
pub mod sample;
pub mod scores;
pub mod semiring;
pub mod set;
pub mod solver;
pub mod subsets;
pub mod table;
pub mod tree;

pub use error::Error;
