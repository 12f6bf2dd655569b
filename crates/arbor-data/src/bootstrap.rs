//! Bootstrap resampling from the real samples of a designated feature.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::DataError;
use crate::table::FeatureTable;

/// An in-bag / out-of-bag draw.
///
/// Both lists are sorted ascending. With replacement the in-bag list may
/// contain duplicates; the out-of-bag list never does.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Bootstrap {
    /// The drawn sample indices.
    pub in_bag: Vec<usize>,
    /// The real samples not drawn.
    pub out_of_bag: Vec<usize>,
}

impl FeatureTable {
    /// Draw a bootstrap sample from the indices where `target_idx` is
    /// non-missing.
    ///
    /// With `R` real samples, `floor(sample_fraction * R)` indices are
    /// drawn: independently and uniformly with replacement, or as the
    /// first `k` of a uniformly shuffled copy of the real set without.
    /// The out-of-bag set is the sorted difference of the real set and
    /// the draw.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidSampleFraction`] when the fraction is
    /// non-positive or non-finite, or exceeds 1.0 while sampling without
    /// replacement.
    pub fn bootstrap_from_real(
        &self,
        rng: &mut impl Rng,
        with_replacement: bool,
        sample_fraction: f64,
        target_idx: usize,
    ) -> Result<Bootstrap, DataError> {
        if !sample_fraction.is_finite() || sample_fraction <= 0.0 {
            return Err(DataError::InvalidSampleFraction {
                fraction: sample_fraction,
            });
        }
        if !with_replacement && sample_fraction > 1.0 {
            return Err(DataError::InvalidSampleFraction {
                fraction: sample_fraction,
            });
        }

        let target = self.feature(target_idx);
        let real: Vec<usize> = (0..self.sample_count())
            .filter(|&i| !target.value_at(i).is_nan())
            .collect();
        let n_real = real.len();
        let n_draw = (sample_fraction * n_real as f64).floor() as usize;

        let mut in_bag: Vec<usize> = if with_replacement {
            (0..n_draw).map(|_| real[rng.gen_range(0..n_real)]).collect()
        } else {
            let mut shuffled = real.clone();
            shuffled.shuffle(rng);
            shuffled.truncate(n_draw);
            shuffled
        };
        in_bag.sort_unstable();

        let out_of_bag = sorted_difference(&real, &in_bag);

        debug!(
            n_real,
            n_in_bag = in_bag.len(),
            n_out_of_bag = out_of_bag.len(),
            with_replacement,
            "bootstrap drawn"
        );

        Ok(Bootstrap { in_bag, out_of_bag })
    }
}

/// Elements of the sorted, duplicate-free `all` that do not occur in the
/// sorted (possibly duplicated) `drawn`.
fn sorted_difference(all: &[usize], drawn: &[usize]) -> Vec<usize> {
    let mut difference = Vec::with_capacity(all.len());
    let mut j = 0;
    for &idx in all {
        while j < drawn.len() && drawn[j] < idx {
            j += 1;
        }
        if j < drawn.len() && drawn[j] == idx {
            continue;
        }
        difference.push(idx);
    }
    difference
}
