//! Discrete sampling by Walker's alias method: O(n) construction, O(1) per
//! draw.

use rand::Rng;

/// An alias table over a finite discrete distribution.
///
/// Construction scales the probabilities by `n` and repeatedly pairs an
/// underfull cell with an overfull one, so every cell ends up holding its
/// own index with probability `prob[i]` and an alias otherwise.
pub struct AliasTable {
    prob: Vec<f64>,
    alias: Vec<usize>,
}

impl AliasTable {
    /// Builds the table from probabilities summing to 1.
    pub fn new(probs: &[f64]) -> Self {
        let n = probs.len();
        assert!(n > 0, "cannot build an alias table over an empty distribution");

        let mut prob: Vec<f64> = probs.iter().map(|&p| p * n as f64).collect();
        let mut alias: Vec<usize> = (0..n).collect();

        let mut small: Vec<usize> = Vec::new();
        let mut large: Vec<usize> = Vec::new();
        for (i, &q) in prob.iter().enumerate() {
            if q < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while !small.is_empty() && !large.is_empty() {
            let s = small.pop().expect("checked non-empty");
            let l = *large.last().expect("checked non-empty");
            alias[s] = l;
            // The grouping fixes the floating-point residue.
            prob[l] = (prob[l] + prob[s]) - 1.0;
            if prob[l] < 1.0 {
                large.pop();
                small.push(l);
            }
        }

        // Stragglers of either list are saturated cells.
        for i in large {
            prob[i] = 1.0;
        }
        for i in small {
            prob[i] = 1.0;
        }

        Self { prob, alias }
    }

    pub fn len(&self) -> usize {
        self.prob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }

    /// Draws an index distributed according to the construction
    /// probabilities.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let u = rng.random::<f64>() * self.len() as f64;
        let j = u as usize;
        debug_assert!(j < self.len());
        let fraction = u - j as f64;
        if fraction <= self.prob[j] {
            j
        } else {
            self.alias[j]
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_cells_stay_in_unit_range() {
        let table = AliasTable::new(&[0.5, 0.3, 0.1, 0.1]);
        for &q in &table.prob {
            assert!((0.0..=1.0 + 1e-12).contains(&q));
        }
        for &a in &table.alias {
            assert!(a < table.len());
        }
    }

    #[test]
    fn test_single_outcome() {
        let table = AliasTable::new(&[1.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(table.draw(&mut rng), 0);
        }
    }

    #[test]
    fn test_degenerate_distribution() {
        let table = AliasTable::new(&[0.0, 1.0, 0.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            assert_eq!(table.draw(&mut rng), 1);
        }
    }

    #[test]
    fn test_empirical_frequencies() {
        let probs = [0.5, 0.3, 0.2];
        let table = AliasTable::new(&probs);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let draws = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..draws {
            counts[table.draw(&mut rng)] += 1;
        }

        for (i, &p) in probs.iter().enumerate() {
            let observed = counts[i] as f64 / draws as f64;
            // Three-sigma band of the binomial.
            let sigma = (p * (1.0 - p) / draws as f64).sqrt();
            assert!(
                (observed - p).abs() < 3.0 * sigma + 1e-3,
                "outcome {}: observed {:.4}, expected {:.4}",
                i,
                observed,
                p
            );
        }
    }

    #[test]
    #[should_panic(expected = "empty distribution")]
    fn test_empty_distribution_panics() {
        AliasTable::new(&[]);
    }
}
