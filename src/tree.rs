//! Junction trees: the result model of maximization and sampling.
//!
//! A [`TreeNode`] is a clique together with the separator it shares with its
//! parent (`∅` at the root) and an ordered list of children. The services on
//! a tree mirror what the tool can print for one: its score, an ASCII
//! rendering, the compact serialization, the projected adjacency graph, and
//! the Thomas & Green (2009) count of junction trees representing the same
//! chordal graph.

use std::fmt::Write as _;

use crate::error::Error;
use crate::graph::Graph;
use crate::scores::LocalScores;
use crate::set::VarSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// The clique of this node.
    pub clique: VarSet,
    /// Intersection with the parent clique; empty at the root.
    pub separator: VarSet,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(clique: VarSet, separator: VarSet) -> Self {
        Self { clique, separator, children: Vec::new() }
    }

    pub fn push(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    /// Maximum clique size in the subtree.
    pub fn width(&self) -> u32 {
        self.children
            .iter()
            .map(TreeNode::width)
            .max()
            .unwrap_or(0)
            .max(self.clique.cardinality())
    }

    /// Length of the longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        self.children.iter().map(|c| c.depth() + 1).max().unwrap_or(0)
    }

    /// Number of nodes (cliques) in the subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    /// Tree score: the clique scores minus the separator scores.
    pub fn score(&self, scores: &LocalScores) -> f64 {
        let mut total = scores.get(self.clique) - scores.get(self.separator);
        for child in &self.children {
            total += child.score(scores);
        }
        total
    }

    /// Preorder traversal of the subtree, parents before children.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Projects the tree onto its adjacency graph: every pair of vertices
    /// sharing a clique is adjacent.
    pub fn to_graph(&self, n: u32) -> Graph {
        let mut graph = Graph::new(n);
        for node in self.iter() {
            let members: Vec<u32> = node.clique.iter().collect();
            for (k, &i) in members.iter().enumerate() {
                for &j in &members[k + 1..] {
                    graph.add_edge(i, j);
                }
            }
        }
        graph
    }

    // ------------------------------------------------------------------
    // Junction-tree counting, essentially Thomas & Green '09 (JCGS).
    // ------------------------------------------------------------------

    fn collect_separators(&self, out: &mut Vec<VarSet>) {
        for child in &self.children {
            if !out.contains(&child.separator) {
                out.push(child.separator);
            }
            child.collect_separators(out);
        }
    }

    /// Walks the subtree induced by cliques containing `sep`, detaching the
    /// components hanging below an occurrence of `sep` as a separator.
    /// Returns the size of the component containing `self`.
    fn separator_subtree(
        &self,
        sep: VarSet,
        n_nodes: &mut usize,
        n_components: &mut usize,
        product: &mut f64,
    ) -> usize {
        if !sep.is_subset_of(self.clique) {
            return 0;
        }

        *n_nodes += 1;
        let mut nodes = 1;

        for child in &self.children {
            let below = child.separator_subtree(sep, n_nodes, n_components, product);
            if child.separator == sep {
                *n_components += 1;
                *product *= below as f64;
            } else {
                nodes += below;
            }
        }

        nodes
    }

    /// The count factor contributed by one distinct separator: found from
    /// the highest node whose clique contains it.
    fn separator_factor(&self, sep: VarSet) -> f64 {
        if sep.is_subset_of(self.clique) {
            let mut n_nodes = 0;
            let mut n_components = 1;
            let mut product = 1.0;
            let own = self.separator_subtree(sep, &mut n_nodes, &mut n_components, &mut product);
            product *= own as f64;
            return (n_nodes as f64).powi(n_components as i32 - 2) * product;
        }

        for child in &self.children {
            let factor = child.separator_factor(sep);
            if factor > 0.0 {
                return factor;
            }
        }

        0.0
    }

    /// Number of distinct labeled junction trees representing the same
    /// chordal graph as this one.
    pub fn count_junction_trees(&self) -> f64 {
        let mut separators = Vec::new();
        self.collect_separators(&mut separators);
        separators.iter().map(|&sep| self.separator_factor(sep)).product()
    }

    /// Number of rooted partition trees for the same chordal graph.
    pub fn count_rooted(&self) -> f64 {
        self.count_junction_trees() * self.node_count() as f64
    }

    // ------------------------------------------------------------------
    // Compact form: `clique-bitmask ('{' child '}')*`
    // ------------------------------------------------------------------

    /// Serializes the subtree in the compact form, e.g. `3{22}{513{1792}}`.
    pub fn to_compact(&self) -> String {
        let mut out = String::new();
        self.write_compact(&mut out);
        out
    }

    fn write_compact(&self, out: &mut String) {
        write!(out, "{}", self.clique.bits()).expect("writing to a String cannot fail");
        for child in &self.children {
            out.push('{');
            child.write_compact(out);
            out.push('}');
        }
    }

    /// Parses a tree in the compact form. Separators are recomputed as the
    /// intersection of each clique with its parent clique.
    pub fn parse_compact(input: &str) -> Result<TreeNode, Error> {
        let bytes = input.as_bytes();
        let mut pos = 0;
        let node = Self::parse_node(bytes, &mut pos, VarSet::empty())?;
        if pos != bytes.len() {
            return Err(Error::MalformedTree(pos));
        }
        Ok(node)
    }

    fn parse_node(bytes: &[u8], pos: &mut usize, parent: VarSet) -> Result<TreeNode, Error> {
        let start = *pos;
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
        if *pos == start {
            return Err(Error::MalformedTree(start));
        }
        let digits = std::str::from_utf8(&bytes[start..*pos]).expect("digits are ASCII");
        let bits: u32 = digits.parse().map_err(|_| Error::MalformedTree(start))?;
        let clique = VarSet::from_bits(bits);

        let mut node = TreeNode::new(clique, clique & parent);
        while *pos < bytes.len() && bytes[*pos] == b'{' {
            *pos += 1;
            let child = Self::parse_node(bytes, pos, clique)?;
            if *pos >= bytes.len() || bytes[*pos] != b'}' {
                return Err(Error::MalformedTree(*pos));
            }
            *pos += 1;
            node.push(child);
        }
        Ok(node)
    }

    // ------------------------------------------------------------------
    // ASCII rendering
    // ------------------------------------------------------------------

    /// Renders the tree with `+--` connectors; each non-root line carries
    /// its separator in a column past the clique text.
    pub fn render(&self) -> String {
        let pad = 3 * self.depth() + 3 * self.width() as usize + 1;
        let mut bars = vec![false; self.depth() + 1];
        let mut out = String::new();
        self.render_node(&mut out, pad, 0, &mut bars);
        out
    }

    fn render_node(&self, out: &mut String, pad: usize, level: usize, bars: &mut [bool]) {
        let mut line = String::new();
        for (i, &bar) in bars.iter().enumerate().take(level) {
            if i == level - 1 {
                line.push_str("+--");
            } else {
                line.push_str(if bar { "|  " } else { "   " });
            }
        }
        line.push_str(&self.clique.to_string());

        if !self.separator.is_empty() {
            while line.len() < pad {
                line.push(' ');
            }
            line.push_str(&self.separator.to_string());
        }

        out.push_str(&line);
        out.push('\n');

        for (i, child) in self.children.iter().enumerate() {
            bars[level] = i < self.children.len() - 1;
            child.render_node(out, pad, level + 1, bars);
        }
    }
}

/// Preorder iterator over tree nodes.
pub struct Preorder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<&'a TreeNode> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}
