//! CART classification tree with Gini impurity, used by the forest models.
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// How a split threshold is chosen for a candidate feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Exhaustive scan of the midpoints between sorted distinct values.
    Best,
    /// One uniform threshold between the node's min and max value.
    Random,
}

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn per split.
    pub max_features: usize,
    pub split: SplitStrategy,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        distribution: Vec<f32>,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f32,
    score: f64,
}

/// A fitted classification tree; leaves hold class distributions.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
}

struct Builder<'a> {
    x: &'a Array2<f32>,
    y: &'a [usize],
    n_classes: usize,
    params: &'a TreeParams,
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `samples` (duplicates allowed).
    pub fn fit(
        x: &Array2<f32>,
        y: &[usize],
        samples: Vec<usize>,
        n_classes: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut builder = Builder {
            x,
            y,
            n_classes,
            params,
            nodes: Vec::new(),
        };
        builder.grow(samples, 0, rng);
        DecisionTree {
            nodes: builder.nodes,
            n_classes,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Class distribution of the leaf reached by `row`.
    pub fn predict_row(&self, row: ArrayView1<f32>) -> &[f32] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

impl<'a> Builder<'a> {
    fn counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize], n: usize) -> usize {
        let distribution = counts
            .iter()
            .map(|&c| if n > 0 { c as f32 / n as f32 } else { 0.0 })
            .collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn grow(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let n = samples.len();
        let counts = self.counts(&samples);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        if pure
            || depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
        {
            return self.leaf(&counts, n);
        }

        let Some(split) = self.find_split(&samples, rng) else {
            return self.leaf(&counts, n);
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        // Reserve the slot so children are numbered after their parent.
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.grow(left_samples, depth + 1, rng);
        let right = self.grow(right_samples, depth + 1, rng);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Draw features in random order until `max_features` have been examined
    /// and at least one valid split is found (or features run out).
    fn find_split(&self, samples: &[usize], rng: &mut StdRng) -> Option<Candidate> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<Candidate> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            let candidate = match self.params.split {
                SplitStrategy::Best => self.best_threshold(samples, feature),
                SplitStrategy::Random => self.random_threshold(samples, feature, rng),
            };
            if let Some(c) = candidate {
                if best.map_or(true, |b| c.score > b.score) {
                    best = Some(c);
                }
            }
        }
        best
    }

    /// Gini proxy: sum over children of `sum_k count_k^2 / n_child`.
    /// Maximising it minimises the weighted Gini impurity.
    fn proxy(left: &[usize], n_left: usize, right: &[usize], n_right: usize) -> f64 {
        let part = |counts: &[usize], n: usize| {
            if n == 0 {
                0.0
            } else {
                counts.iter().map(|&c| (c * c) as f64).sum::<f64>() / n as f64
            }
        };
        part(left, n_left) + part(right, n_right)
    }

    fn best_threshold(&self, samples: &[usize], feature: usize) -> Option<Candidate> {
        let mut sorted: Vec<(f32, usize)> = samples
            .iter()
            .map(|&i| (self.x[[i, feature]], self.y[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut left = vec![0usize; self.n_classes];
        let mut right = vec![0usize; self.n_classes];
        for &(_, label) in &sorted {
            right[label] += 1;
        }

        let mut best: Option<Candidate> = None;
        for pos in 0..n.saturating_sub(1) {
            let (value, label) = sorted[pos];
            left[label] += 1;
            right[label] -= 1;

            let next = sorted[pos + 1].0;
            let n_left = pos + 1;
            let n_right = n - n_left;
            if next <= value || n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let score = Self::proxy(&left, n_left, &right, n_right);
            if best.map_or(true, |b| score > b.score) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
        best
    }

    fn random_threshold(&self, samples: &[usize], feature: usize, rng: &mut StdRng) -> Option<Candidate> {
        let (lo, hi) = samples.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &i| {
            let v = self.x[[i, feature]];
            (lo.min(v), hi.max(v))
        });
        if !(hi > lo) {
            return None;
        }
        let threshold = rng.gen_range(lo..hi);

        let mut left = vec![0usize; self.n_classes];
        let mut right = vec![0usize; self.n_classes];
        let mut n_left = 0;
        for &i in samples {
            if self.x[[i, feature]] <= threshold {
                left[self.y[i]] += 1;
                n_left += 1;
            } else {
                right[self.y[i]] += 1;
            }
        }
        let n_right = samples.len() - n_left;
        let min_leaf = self.params.min_samples_leaf.max(1);
        if n_left < min_leaf || n_right < min_leaf {
            return None;
        }
        Some(Candidate {
            feature,
            threshold,
            score: Self::proxy(&left, n_left, &right, n_right),
        })
    }
}
