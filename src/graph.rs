//! Undirected graphs on the vertex set: adjacency projection of junction
//! trees, chordality checks via simplicial elimination, and the brute-force
//! enumeration of all decomposable graphs used as an exact reference on
//! small instances.

use std::fmt::Write as _;

use crate::scores::LocalScores;
use crate::semiring::log_sum_exp;
use crate::set::VarSet;

/// A simple undirected graph backed by an adjacency matrix.
#[derive(Debug, Clone)]
pub struct Graph {
    n: u32,
    adjacency: Vec<bool>,
}

impl Graph {
    pub fn new(n: u32) -> Self {
        Self { n, adjacency: vec![false; (n * n) as usize] }
    }

    pub fn num_vars(&self) -> u32 {
        self.n
    }

    #[inline]
    fn index(&self, i: u32, j: u32) -> usize {
        (i * self.n + j) as usize
    }

    pub fn add_edge(&mut self, i: u32, j: u32) {
        let a = self.index(i, j);
        let b = self.index(j, i);
        self.adjacency[a] = true;
        self.adjacency[b] = true;
    }

    pub fn remove_edge(&mut self, i: u32, j: u32) {
        let a = self.index(i, j);
        let b = self.index(j, i);
        self.adjacency[a] = false;
        self.adjacency[b] = false;
    }

    #[inline]
    pub fn has_edge(&self, i: u32, j: u32) -> bool {
        self.adjacency[self.index(i, j)]
    }

    /// Renders the adjacency matrix as rows of `0`/`1` characters.
    pub fn render_matrix(&self) -> String {
        let mut out = String::new();
        for j in 0..self.n {
            for i in 0..self.n {
                out.push(if self.has_edge(i, j) { '1' } else { '0' });
            }
            out.push('\n');
        }
        out
    }

    /// Emits the graph in Graphviz dot format.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "graph G {{")?;
        for i in 0..self.n {
            writeln!(dot, "\t{};", i)?;
        }
        for j in 0..self.n {
            for i in j + 1..self.n {
                if self.has_edge(i, j) {
                    writeln!(dot, "\t{} -- {};", i, j)?;
                }
            }
        }
        writeln!(dot, "}}")?;
        Ok(dot)
    }

    // ------------------------------------------------------------------
    // Simplicial elimination
    // ------------------------------------------------------------------

    /// Neighbors of `u` among the vertices still marked alive.
    fn neighbors_in(&self, u: u32, alive: &[bool]) -> Vec<u32> {
        (0..self.n)
            .filter(|&i| alive[i as usize] && self.has_edge(u, i))
            .collect()
    }

    fn is_clique(&self, vertices: &[u32]) -> bool {
        for (k, &u) in vertices.iter().enumerate() {
            for &v in &vertices[k + 1..] {
                if !self.has_edge(u, v) {
                    return false;
                }
            }
        }
        true
    }

    fn is_adjacent_to_all(&self, u: u32, vertices: &[u32]) -> bool {
        vertices.iter().all(|&v| self.has_edge(u, v))
    }

    fn has_common_neighbor_in(&self, vertices: &[u32], alive: &[bool]) -> bool {
        (0..self.n).any(|i| alive[i as usize] && self.is_adjacent_to_all(i, vertices))
    }

    fn has_common_neighbor(&self, vertices: &[u32]) -> bool {
        (0..self.n).any(|i| self.is_adjacent_to_all(i, vertices))
    }

    fn find_simplicial(&self, alive: &[bool]) -> Option<u32> {
        (0..self.n).find(|&u| alive[u as usize] && self.is_clique(&self.neighbors_in(u, alive)))
    }

    /// Whether the graph is chordal, by repeatedly removing a simplicial
    /// vertex.
    pub fn is_chordal(&self) -> bool {
        let mut alive = vec![true; self.n as usize];
        for _ in 0..self.n {
            match self.find_simplicial(&alive) {
                Some(u) => alive[u as usize] = false,
                None => return false,
            }
        }
        true
    }

    /// Scores the graph as a decomposable model: the sum of its clique
    /// scores minus the sum of its separator scores, found by simplicial
    /// elimination. Returns the score and the number of maximal cliques, or
    /// `None` when the graph is not chordal or an elimination clique exceeds
    /// the score bound.
    pub fn chordal_score(&self, scores: &LocalScores) -> Option<(f64, usize)> {
        let mut alive = vec![true; self.n as usize];
        let mut score = 0.0;
        let mut n_cliques = 0;

        for _ in 0..self.n {
            let s = self.find_simplicial(&alive)?;
            alive[s as usize] = false;

            let mut potential = self.neighbors_in(s, &alive);
            if potential.len() as u32 + 1 > scores.max_size() {
                return None;
            }

            // The eliminated neighborhood is a separator unless this was the
            // last vertex of its clique.
            if self.has_common_neighbor_in(&potential, &alive) {
                score -= scores.get(set_of(&potential));
            }

            potential.push(s);

            // The closed neighborhood is a maximal clique unless it extends.
            if !self.has_common_neighbor(&potential) {
                score += scores.get(set_of(&potential));
                n_cliques += 1;
            }
        }

        Some((score, n_cliques))
    }
}

fn set_of(vertices: &[u32]) -> VarSet {
    vertices.iter().fold(VarSet::empty(), |s, &v| s.insert(v))
}

/// Result of exhaustively enumerating the decomposable graphs on `n`
/// vertices.
pub struct ChordalEnumeration {
    n: u32,
    /// Number of decomposable graphs found.
    pub count: u64,
    /// `ln Σ_G exp(score(G))` over all decomposable graphs.
    pub total_score: f64,
    /// Per edge, `ln Σ exp(score)` over the graphs containing it.
    edge_scores: Vec<f64>,
}

impl ChordalEnumeration {
    /// Posterior probability of an edge under the graph distribution.
    pub fn edge_probability(&self, i: u32, j: u32) -> f64 {
        let (i, j) = (i.min(j), i.max(j));
        (self.edge_scores[(i * self.n + j) as usize] - self.total_score).exp()
    }
}

/// Enumerates every decomposable graph on `n` vertices by branching on each
/// vertex pair. Exponential in `n * (n - 1) / 2`; intended for `n ≤ 6`.
pub fn enumerate_chordal(n: u32, scores: &LocalScores) -> ChordalEnumeration {
    let mut graph = Graph::new(n);
    let mut result = ChordalEnumeration {
        n,
        count: 0,
        total_score: f64::NEG_INFINITY,
        edge_scores: vec![f64::NEG_INFINITY; (n * n) as usize],
    };
    branch(&mut graph, 0, 1, scores, &mut result);
    result
}

fn branch(graph: &mut Graph, i: u32, j: u32, scores: &LocalScores, out: &mut ChordalEnumeration) {
    let n = graph.num_vars();
    if i + 1 >= n {
        check(graph, scores, out);
        return;
    }
    if j == n {
        branch(graph, i + 1, i + 2, scores, out);
        return;
    }

    branch(graph, i, j + 1, scores, out);
    graph.add_edge(i, j);
    branch(graph, i, j + 1, scores, out);
    graph.remove_edge(i, j);
}

fn check(graph: &Graph, scores: &LocalScores, out: &mut ChordalEnumeration) {
    let Some((score, _)) = graph.chordal_score(scores) else {
        return;
    };

    out.count += 1;
    out.total_score = log_sum_exp(out.total_score, score);

    let n = graph.num_vars();
    for i in 0..n {
        for j in i + 1..n {
            if graph.has_edge(i, j) {
                let cell = (i * n + j) as usize;
                out.edge_scores[cell] = log_sum_exp(out.edge_scores[cell], score);
            }
        }
    }

    if out.count % 1_000_000 == 0 {
        log::debug!("{} decomposable graphs so far", out.count);
    }
}
