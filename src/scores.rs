//! Local subset scores and the DMST score-file format.
//!
//! A score file is an ASCII stream of whitespace-separated tokens: the
//! header `DMST <N> subset_scores colex_order <M>`, followed by one
//! floating-point log-score for every subset of `{0, .., N-1}` with at most
//! `M` elements, listed in colex order from `∅` up to the last `M`-subset.

use crate::error::Error;
use crate::set::{VarSet, MAX_VARS};
use crate::subsets::SubsetRangeK;

/// Dense map from vertex subsets to log-scores.
///
/// Subsets larger than [`LocalScores::max_size`] carry no score; reading one
/// yields NaN, which deliberately poisons any value computed from it.
#[derive(Debug)]
pub struct LocalScores {
    n: u32,
    max_size: u32,
    values: Vec<f64>,
}

impl LocalScores {
    /// Number of vertices `N`.
    pub fn num_vars(&self) -> u32 {
        self.n
    }

    /// Largest subset size `M` carrying a score.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// The log-score of a subset.
    #[inline]
    pub fn get(&self, s: VarSet) -> f64 {
        self.values[s.bits() as usize]
    }

    /// Builds a score table by evaluating `score` on every subset of size at
    /// most `max_size`, in colex order.
    pub fn from_fn(n: u32, max_size: u32, score: impl Fn(VarSet) -> f64) -> Self {
        assert!(n <= MAX_VARS, "at most {} variables are supported", MAX_VARS);
        let mut values = vec![f64::NAN; 1 << n];
        for s in SubsetRangeK::new(VarSet::empty(), VarSet::complete(n), max_size) {
            values[s.bits() as usize] = score(s);
        }
        Self { n, max_size, values }
    }

    /// Parses a score file.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut tokens = input.split_ascii_whitespace();

        match tokens.next() {
            Some("DMST") => {}
            _ => return Err(Error::UnknownFileType),
        }

        let n: u32 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or(Error::MissingHeaderField("the number of variables"))?;

        match tokens.next() {
            Some("subset_scores") => {}
            Some(other) => return Err(Error::UnsupportedScoreType(other.to_string())),
            None => return Err(Error::MissingHeaderField("the score type")),
        }

        match tokens.next() {
            Some("colex_order") => {}
            Some(other) => return Err(Error::UnsupportedScoreOrder(other.to_string())),
            None => return Err(Error::MissingHeaderField("the score order")),
        }

        let max_size: u32 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or(Error::MissingHeaderField("the maximum subset size"))?;

        if n > MAX_VARS || max_size > MAX_VARS {
            return Err(Error::TooManyVariables(n.max(max_size)));
        }

        log::debug!("score file: {} variables, scores up to size {}", n, max_size);

        let mut values = vec![f64::NAN; 1 << n];
        for s in SubsetRangeK::new(VarSet::empty(), VarSet::complete(n), max_size) {
            let score = tokens
                .next()
                .and_then(|t| t.parse::<f64>().ok())
                .ok_or_else(|| Error::MissingScore(s.to_string()))?;
            values[s.bits() as usize] = score;
        }

        Ok(Self { n, max_size, values })
    }
}
