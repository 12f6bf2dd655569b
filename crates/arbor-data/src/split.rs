//! Impurity-reducing binary split search.
//!
//! Three search variants, one per candidate-feature kind, sharing the same
//! contract: the node's sample-index list is compacted to the
//! missing-filtered set in place (relative order preserved), and the
//! return value is `Some` with the best admissible partition or `None`
//! when no split clears the admissibility rules — the caller's signal to
//! try another feature or stop splitting. The impurity-reduction formula
//! is keyed by the *target's* kind: between-group variance for numeric
//! targets, weighted Gini gain for categorical ones.

use std::collections::{BTreeMap, BTreeSet};

use crate::gain::{
    DI_EPSILON, RunningMean, SquaredFrequency, category_code, delta_impurity_frequency,
    delta_impurity_mean,
};
use crate::table::FeatureTable;

/// Best threshold split of a numeric feature.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NumericSplit {
    /// Impurity reduction achieved by the split.
    pub delta_impurity: f64,
    /// Samples with feature value `<= split_value` go left.
    pub split_value: f64,
    /// Left sample indices, ascending by feature value.
    pub left: Vec<usize>,
    /// Right sample indices, ascending by feature value.
    pub right: Vec<usize>,
}

/// Best two-way category partition of a categorical feature.
///
/// Every category present in the filtered sample set lands in exactly one
/// of the two code sets.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CategoricalSplit {
    /// Impurity reduction achieved by the partition.
    pub delta_impurity: f64,
    /// Category codes routed left.
    pub left_categories: BTreeSet<u32>,
    /// Category codes routed right.
    pub right_categories: BTreeSet<u32>,
    /// Left sample indices, grouped by ascending category code.
    pub left: Vec<usize>,
    /// Right sample indices, grouped by ascending category code.
    pub right: Vec<usize>,
}

/// Membership split of a textual feature on one pre-selected token.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TextualSplit {
    /// Impurity reduction achieved by the split.
    pub delta_impurity: f64,
    /// The token tested for membership.
    pub token: u32,
    /// Samples whose token set contains the token.
    pub left: Vec<usize>,
    /// Samples whose token set lacks the token.
    pub right: Vec<usize>,
}

impl FeatureTable {
    /// Find the best threshold split of a numeric feature against a
    /// numeric or categorical target over the node's current sample set.
    ///
    /// `samples` is compacted in place to the pairwise non-missing set
    /// (input order preserved) whether or not a split is found. Candidate
    /// boundaries lie between adjacent *distinct* feature values of the
    /// ascending-sorted column; a boundary is admissible when both sides
    /// hold at least `min_samples` entries. `None` when fewer than
    /// `2 * min_samples` real samples exist or no boundary improves
    /// impurity.
    pub fn numeric_split(
        &self,
        target_idx: usize,
        feature_idx: usize,
        min_samples: usize,
        samples: &mut Vec<usize>,
    ) -> Option<NumericSplit> {
        let (targets, features) = self.filtered_value_pair(target_idx, feature_idx, samples);
        let n_tot = features.len();
        if n_tot < 2 * min_samples || n_tot < 2 {
            return None;
        }

        // Stable sort permutation by feature value; ties keep filtered order.
        let mut order: Vec<usize> = (0..n_tot).collect();
        order.sort_by(|&a, &b| features[a].total_cmp(&features[b]));
        let sorted_features: Vec<f64> = order.iter().map(|&p| features[p]).collect();
        let sorted_targets: Vec<f64> = order.iter().map(|&p| targets[p]).collect();

        let (best_idx, delta_impurity) = if self.is_numeric(target_idx) {
            best_boundary_mean(&sorted_targets, &sorted_features, min_samples)?
        } else {
            best_boundary_frequency(&sorted_targets, &sorted_features, min_samples)?
        };

        let split_value = sorted_features[best_idx];
        let left = order[..=best_idx].iter().map(|&p| samples[p]).collect();
        let right = order[best_idx + 1..].iter().map(|&p| samples[p]).collect();

        Some(NumericSplit {
            delta_impurity,
            split_value,
            left,
            right,
        })
    }

    /// Find the best two-way category partition of a categorical feature
    /// against a numeric or categorical target.
    ///
    /// The partition search orders categories by their mean target value
    /// (numeric targets) or by ascending category code (categorical
    /// targets), then runs the same boundary scan as the numeric split
    /// over whole category blocks, so no category is ever divided across
    /// sides. `samples` is compacted in place as in
    /// [`FeatureTable::numeric_split`]. The partition must improve
    /// impurity by more than a near-zero epsilon to be admissible.
    pub fn categorical_split(
        &self,
        target_idx: usize,
        feature_idx: usize,
        min_samples: usize,
        samples: &mut Vec<usize>,
    ) -> Option<CategoricalSplit> {
        let (targets, features) = self.filtered_value_pair(target_idx, feature_idx, samples);
        let n_tot = features.len();
        if n_tot < 2 * min_samples || n_tot < 2 {
            return None;
        }

        // Positions (into the filtered arrays) grouped by category code.
        let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (pos, &value) in features.iter().enumerate() {
            groups.entry(category_code(value)).or_default().push(pos);
        }
        if groups.len() < 2 {
            return None;
        }

        let numeric_target = self.is_numeric(target_idx);
        let mut blocks: Vec<(u32, &[usize])> =
            groups.iter().map(|(&code, positions)| (code, positions.as_slice())).collect();
        if numeric_target {
            let means: BTreeMap<u32, f64> = blocks
                .iter()
                .map(|&(code, positions)| {
                    let sum: f64 = positions.iter().map(|&p| targets[p]).sum();
                    (code, sum / positions.len() as f64)
                })
                .collect();
            // Stable sort; equal means fall back to the ascending-code order.
            blocks.sort_by(|a, b| means[&a.0].total_cmp(&means[&b.0]));
        }

        let best = if numeric_target {
            best_block_boundary_mean(&blocks, &targets, min_samples)
        } else {
            best_block_boundary_frequency(&blocks, &targets, min_samples)
        };
        let (best_block, delta_impurity) = best?;

        let left_categories: BTreeSet<u32> =
            blocks[..=best_block].iter().map(|&(code, _)| code).collect();
        let right_categories: BTreeSet<u32> =
            blocks[best_block + 1..].iter().map(|&(code, _)| code).collect();

        // Assemble the index partition by ascending category code,
        // preserving within-category filtered order.
        let mut left = Vec::new();
        let mut right = Vec::new();
        for (code, positions) in &groups {
            let side = if left_categories.contains(code) {
                &mut left
            } else {
                &mut right
            };
            side.extend(positions.iter().map(|&p| samples[p]));
        }

        Some(CategoricalSplit {
            delta_impurity,
            left_categories,
            right_categories,
            left,
            right,
        })
    }

    /// Evaluate the membership split of a textual feature on one
    /// pre-selected token (see [`FeatureTable::token_at`] for selecting
    /// candidates).
    ///
    /// A single pass routes each sample left when its token set contains
    /// `token`, right otherwise, accumulating the target aggregate for
    /// both sides as it goes. `samples` is compacted in place to the
    /// target-non-missing set. `None` when either side ends below
    /// `min_samples` or the split yields no impurity reduction.
    pub fn textual_split(
        &self,
        target_idx: usize,
        feature_idx: usize,
        token: u32,
        min_samples: usize,
        samples: &mut Vec<usize>,
    ) -> Option<TextualSplit> {
        let targets = self.filtered_values(target_idx, samples);
        let n_tot = targets.len();
        if n_tot < 2 * min_samples || n_tot < 2 {
            return None;
        }

        let mut left = Vec::new();
        let mut right = Vec::new();

        let delta_impurity = if self.is_numeric(target_idx) {
            let mut mean_left = RunningMean::default();
            let mut mean_right = RunningMean::default();
            for (pos, &sample_idx) in samples.iter().enumerate() {
                if self.has_token(feature_idx, sample_idx, token) {
                    left.push(sample_idx);
                    mean_left.add(targets[pos]);
                } else {
                    right.push(sample_idx);
                    mean_right.add(targets[pos]);
                }
            }
            delta_impurity_mean(&mean_left, &mean_right)
        } else {
            let mut freq_left = SquaredFrequency::default();
            let mut freq_right = SquaredFrequency::default();
            let mut freq_total = SquaredFrequency::default();
            for (pos, &sample_idx) in samples.iter().enumerate() {
                let code = category_code(targets[pos]);
                if self.has_token(feature_idx, sample_idx, token) {
                    left.push(sample_idx);
                    freq_left.add(code);
                } else {
                    right.push(sample_idx);
                    freq_right.add(code);
                }
                freq_total.add(code);
            }
            delta_impurity_frequency(&freq_total, &freq_left, &freq_right)
        };

        if left.len() < min_samples || right.len() < min_samples || delta_impurity <= 0.0 {
            return None;
        }

        Some(TextualSplit {
            delta_impurity,
            token,
            left,
            right,
        })
    }
}

/// Scan boundaries of a sorted column for the best variance-reduction
/// split of a numeric target. Returns the boundary index (last position of
/// the left side) and its impurity reduction.
fn best_boundary_mean(
    targets: &[f64],
    features: &[f64],
    min_samples: usize,
) -> Option<(usize, f64)> {
    let n = targets.len();
    let mut left = RunningMean::default();
    let mut right = RunningMean::default();
    for &t in targets {
        right.add(t);
    }

    let mut best = None;
    let mut best_di = 0.0;
    for i in 0..n - 1 {
        left.add(targets[i]);
        right.remove(targets[i]);
        // Never split between two equal feature values.
        if features[i] == features[i + 1] {
            continue;
        }
        if left.n() < min_samples || right.n() < min_samples {
            continue;
        }
        let di = delta_impurity_mean(&left, &right);
        if di > best_di {
            best_di = di;
            best = Some((i, di));
        }
    }
    best
}

/// Scan boundaries of a sorted column for the best Gini-gain split of a
/// categorical target.
fn best_boundary_frequency(
    targets: &[f64],
    features: &[f64],
    min_samples: usize,
) -> Option<(usize, f64)> {
    let n = targets.len();
    let mut total = SquaredFrequency::default();
    for &t in targets {
        total.add(category_code(t));
    }
    let mut left = SquaredFrequency::default();
    let mut right = total.clone();

    let mut best = None;
    let mut best_di = 0.0;
    for i in 0..n - 1 {
        let code = category_code(targets[i]);
        left.add(code);
        right.remove(code);
        if features[i] == features[i + 1] {
            continue;
        }
        if left.n() < min_samples || right.n() < min_samples {
            continue;
        }
        let di = delta_impurity_frequency(&total, &left, &right);
        if di > best_di {
            best_di = di;
            best = Some((i, di));
        }
    }
    best
}

/// Boundary scan over whole category blocks, numeric target. Returns the
/// index of the last block on the left side and the impurity reduction.
fn best_block_boundary_mean(
    blocks: &[(u32, &[usize])],
    targets: &[f64],
    min_samples: usize,
) -> Option<(usize, f64)> {
    let mut left = RunningMean::default();
    let mut right = RunningMean::default();
    for &(_, positions) in blocks {
        for &p in positions {
            right.add(targets[p]);
        }
    }

    let mut best = None;
    let mut best_di = 0.0;
    for (b, &(_, positions)) in blocks[..blocks.len() - 1].iter().enumerate() {
        for &p in positions {
            left.add(targets[p]);
            right.remove(targets[p]);
        }
        if left.n() < min_samples || right.n() < min_samples {
            continue;
        }
        let di = delta_impurity_mean(&left, &right);
        if di > best_di {
            best_di = di;
            best = Some((b, di));
        }
    }
    // The partition must clear the epsilon threshold, not merely be
    // non-negative.
    best.filter(|&(_, di)| di > DI_EPSILON)
}

/// Boundary scan over whole category blocks, categorical target.
fn best_block_boundary_frequency(
    blocks: &[(u32, &[usize])],
    targets: &[f64],
    min_samples: usize,
) -> Option<(usize, f64)> {
    let mut total = SquaredFrequency::default();
    for &(_, positions) in blocks {
        for &p in positions {
            total.add(category_code(targets[p]));
        }
    }
    let mut left = SquaredFrequency::default();
    let mut right = total.clone();

    let mut best = None;
    let mut best_di = 0.0;
    for (b, &(_, positions)) in blocks[..blocks.len() - 1].iter().enumerate() {
        for &p in positions {
            let code = category_code(targets[p]);
            left.add(code);
            right.remove(code);
        }
        if left.n() < min_samples || right.n() < min_samples {
            continue;
        }
        let di = delta_impurity_frequency(&total, &left, &right);
        if di > best_di {
            best_di = di;
            best = Some((b, di));
        }
    }
    best.filter(|&(_, di)| di > DI_EPSILON)
}
