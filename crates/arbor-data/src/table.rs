//! The feature table: an ordered collection of typed columns plus sample
//! labels, with contrast-feature augmentation.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument};

use crate::error::DataError;
use crate::feature::{Categories, Feature, MISSING_RENDERING};
use crate::filter;

/// Suffix appended to a feature's name for its shadow copy.
pub const CONTRAST_SUFFIX: &str = "_CONTRAST";

/// Placeholder used when no sample labels are supplied.
pub const DEFAULT_SAMPLE_LABEL: &str = "NO_SAMPLE_ID";

/// An in-memory table of samples by typed features.
///
/// Columns are owned [`Feature`]s in insertion order (the index is the
/// feature id) with a name → index lookup. The table's shape is fixed at
/// construction; afterwards only feature *data* is replaced in place and
/// contrast columns permuted.
///
/// With contrasts enabled, the column sequence is doubled: indices
/// `[0, n)` are the real features, `[n, 2n)` their shadow copies.
/// [`FeatureTable::feature_count`] reports only `n`; every per-index
/// operation still accepts the full range.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FeatureTable {
    features: Vec<Feature>,
    name_index: HashMap<String, usize>,
    sample_labels: Vec<String>,
    use_contrasts: bool,
}

impl FeatureTable {
    /// Build a table from typed columns.
    ///
    /// Pass `None` for `sample_labels` to synthesize placeholders. When
    /// `use_contrasts` is set, the constructor appends one shadow copy per
    /// feature (see [`FeatureTable::create_contrasts`]).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataError::EmptyTable`] | `features` is empty |
    /// | [`DataError::NoSamples`] | columns have zero samples |
    /// | [`DataError::SampleCountMismatch`] | a column's length differs from the first column's |
    /// | [`DataError::DuplicateFeatureName`] | two columns share a name |
    /// | [`DataError::SampleLabelCountMismatch`] | supplied labels do not match the sample count |
    #[instrument(skip_all, fields(n_features = features.len(), use_contrasts = use_contrasts))]
    pub fn new(
        features: Vec<Feature>,
        sample_labels: Option<Vec<String>>,
        use_contrasts: bool,
    ) -> Result<Self, DataError> {
        if features.is_empty() {
            return Err(DataError::EmptyTable);
        }

        let n_samples = features[0].sample_len();
        if n_samples == 0 {
            return Err(DataError::NoSamples);
        }

        let mut name_index = HashMap::with_capacity(2 * features.len());
        for (idx, feature) in features.iter().enumerate() {
            if feature.sample_len() != n_samples {
                return Err(DataError::SampleCountMismatch {
                    name: feature.name().to_string(),
                    expected: n_samples,
                    got: feature.sample_len(),
                });
            }
            if name_index
                .insert(feature.name().to_string(), idx)
                .is_some()
            {
                return Err(DataError::DuplicateFeatureName {
                    name: feature.name().to_string(),
                });
            }
        }

        let sample_labels = match sample_labels {
            Some(labels) if labels.is_empty() => {
                vec![DEFAULT_SAMPLE_LABEL.to_string(); n_samples]
            }
            Some(labels) => {
                if labels.len() != n_samples {
                    return Err(DataError::SampleLabelCountMismatch {
                        expected: n_samples,
                        got: labels.len(),
                    });
                }
                labels
            }
            None => vec![DEFAULT_SAMPLE_LABEL.to_string(); n_samples],
        };

        let mut table = Self {
            features,
            name_index,
            sample_labels,
            use_contrasts,
        };

        if use_contrasts {
            table.create_contrasts();
        }

        info!(
            n_features = table.feature_count(),
            n_samples,
            use_contrasts,
            "feature table constructed"
        );

        Ok(table)
    }

    /// Return the number of public (non-contrast) features.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        if self.use_contrasts {
            self.features.len() / 2
        } else {
            self.features.len()
        }
    }

    /// Return the number of samples.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_labels.len()
    }

    /// Return `true` when the table carries contrast columns.
    #[must_use]
    pub fn has_contrasts(&self) -> bool {
        self.use_contrasts
    }

    /// Look up a feature's index by name. `None` when no feature (real or
    /// contrast) carries the name.
    #[must_use]
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// Return the feature at `idx` (contrast indices included).
    #[must_use]
    pub fn feature(&self, idx: usize) -> &Feature {
        &self.features[idx]
    }

    /// Return the name of the feature at `idx`.
    #[must_use]
    pub fn feature_name(&self, idx: usize) -> &str {
        self.features[idx].name()
    }

    /// Return the label of the sample at `sample_idx`.
    #[must_use]
    pub fn sample_label(&self, sample_idx: usize) -> &str {
        &self.sample_labels[sample_idx]
    }

    /// Return `true` if the feature at `idx` is numeric.
    #[must_use]
    pub fn is_numeric(&self, idx: usize) -> bool {
        self.features[idx].is_numeric()
    }

    /// Return `true` if the feature at `idx` is categorical.
    #[must_use]
    pub fn is_categorical(&self, idx: usize) -> bool {
        self.features[idx].is_categorical()
    }

    /// Return `true` if the feature at `idx` is textual.
    #[must_use]
    pub fn is_textual(&self, idx: usize) -> bool {
        self.features[idx].is_textual()
    }

    /// Read one cell through the numeric lens (NaN = missing; textual
    /// features always read as missing).
    #[must_use]
    pub fn value(&self, idx: usize, sample_idx: usize) -> f64 {
        self.features[idx].value_at(sample_idx)
    }

    /// Return a feature's numeric sequence, `None` for textual features.
    #[must_use]
    pub fn values(&self, idx: usize) -> Option<&[f64]> {
        self.features[idx].values()
    }

    /// Gather a feature's values at the given sample indices.
    #[must_use]
    pub fn values_at(&self, idx: usize, sample_indices: &[usize]) -> Vec<f64> {
        let feature = &self.features[idx];
        sample_indices.iter().map(|&i| feature.value_at(i)).collect()
    }

    /// Count the samples with a non-missing value for one feature.
    #[must_use]
    pub fn n_real_samples(&self, idx: usize) -> usize {
        let feature = &self.features[idx];
        (0..self.sample_count())
            .filter(|&i| !feature.value_at(i).is_nan())
            .count()
    }

    /// Count the samples non-missing on *both* features.
    #[must_use]
    pub fn n_real_samples_pair(&self, first_idx: usize, second_idx: usize) -> usize {
        let first = &self.features[first_idx];
        let second = &self.features[second_idx];
        (0..self.sample_count())
            .filter(|&i| !first.value_at(i).is_nan() && !second.value_at(i).is_nan())
            .count()
    }

    /// Filter one feature's values over an index list, dropping missing
    /// entries and shrinking the list in place to match.
    pub fn filtered_values(&self, idx: usize, sample_indices: &mut Vec<usize>) -> Vec<f64> {
        let feature = &self.features[idx];
        filter::compact(sample_indices, |i| feature.value_at(i))
    }

    /// Filter two features pairwise over an index list, dropping an index
    /// when either value is missing. The returned arrays and the shrunk
    /// list are index-aligned.
    pub fn filtered_value_pair(
        &self,
        first_idx: usize,
        second_idx: usize,
        sample_indices: &mut Vec<usize>,
    ) -> (Vec<f64>, Vec<f64>) {
        let first = &self.features[first_idx];
        let second = &self.features[second_idx];
        filter::compact_pair(sample_indices, |i| first.value_at(i), |i| second.value_at(i))
    }

    /// Render one cell as its original string form.
    ///
    /// Missing renders as `"NaN"`; numeric values via the canonical
    /// float-to-string conversion; categorical codes through the back-map.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnmappedCategory`] when a categorical code has
    /// no label — this indicates a value not produced by this table.
    pub fn raw_value(&self, idx: usize, sample_idx: usize) -> Result<String, DataError> {
        let feature = &self.features[idx];
        let value = feature.value_at(sample_idx);
        if value.is_nan() {
            return Ok(MISSING_RENDERING.to_string());
        }
        match feature.categories() {
            None => Ok(value.to_string()),
            Some(categories) => categories
                .label(value as u32)
                .map(str::to_string)
                .ok_or_else(|| DataError::UnmappedCategory {
                    name: feature.name().to_string(),
                    code: value,
                }),
        }
    }

    /// Render a whole column as strings.
    ///
    /// # Errors
    ///
    /// Propagates [`DataError::UnmappedCategory`] from
    /// [`FeatureTable::raw_value`].
    pub fn raw_values(&self, idx: usize) -> Result<Vec<String>, DataError> {
        (0..self.sample_count())
            .map(|i| self.raw_value(idx, i))
            .collect()
    }

    /// Return the distinct category labels of a categorical feature
    /// (empty for other kinds).
    #[must_use]
    pub fn categories(&self, idx: usize) -> Vec<String> {
        self.features[idx]
            .categories()
            .map(|c| c.labels().to_vec())
            .unwrap_or_default()
    }

    /// Return the number of distinct categories (0 for other kinds).
    #[must_use]
    pub fn n_categories(&self, idx: usize) -> usize {
        self.features[idx].categories().map_or(0, Categories::len)
    }

    /// Return the largest category count over the public features.
    #[must_use]
    pub fn n_max_categories(&self) -> usize {
        (0..self.feature_count())
            .map(|i| self.n_categories(i))
            .max()
            .unwrap_or(0)
    }

    /// Sum of per-token binary entropies of a textual feature; `None` for
    /// other kinds.
    #[must_use]
    pub fn feature_entropy(&self, idx: usize) -> Option<f64> {
        self.features[idx].entropy()
    }

    /// Deterministically select one token from a sample's token set.
    #[must_use]
    pub fn token_at(&self, idx: usize, sample_idx: usize, key: usize) -> Option<u32> {
        self.features[idx].token_at(sample_idx, key)
    }

    /// Test a sample's token set for membership of a token hash.
    #[must_use]
    pub fn has_token(&self, idx: usize, sample_idx: usize, token: u32) -> bool {
        self.features[idx].has_token(sample_idx, token)
    }

    /// Replace a feature's data with numeric values, rebuilding it as a
    /// numeric feature under the same name.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::ReplacementLengthMismatch`] when the value
    /// count differs from the sample count.
    pub fn replace_numeric_data(&mut self, idx: usize, values: Vec<f64>) -> Result<(), DataError> {
        if values.len() != self.sample_count() {
            return Err(DataError::ReplacementLengthMismatch {
                name: self.features[idx].name().to_string(),
                expected: self.sample_count(),
                got: values.len(),
            });
        }
        let name = self.features[idx].name().to_string();
        self.features[idx] = Feature::numeric(name, values);
        Ok(())
    }

    /// Replace a feature's data with raw string labels, rebuilding it as a
    /// categorical feature under the same name.
    ///
    /// The category mapping is re-derived from scratch; codes assigned by
    /// the previous feature do not survive replacement.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::ReplacementLengthMismatch`] when the value
    /// count differs from the sample count.
    pub fn replace_categorical_data(
        &mut self,
        idx: usize,
        raw: Vec<String>,
    ) -> Result<(), DataError> {
        if raw.len() != self.sample_count() {
            return Err(DataError::ReplacementLengthMismatch {
                name: self.features[idx].name().to_string(),
                expected: self.sample_count(),
                got: raw.len(),
            });
        }
        let name = self.features[idx].name().to_string();
        self.features[idx] = Feature::categorical(name, &raw);
        Ok(())
    }

    /// Append one shadow copy per current feature, named
    /// `<original>_CONTRAST` with identical data.
    ///
    /// Not idempotent: calling twice doubles the sequence again. The
    /// constructor invokes this at most once, from the `use_contrasts`
    /// flag.
    pub fn create_contrasts(&mut self) {
        let n = self.features.len();
        self.features.reserve(n);
        for i in 0..n {
            let shadow = self.features[i].contrast_copy(CONTRAST_SUFFIX);
            self.name_index
                .insert(shadow.name().to_string(), self.features.len());
            self.features.push(shadow);
        }
        debug!(n_contrasts = n, "contrast features created");
    }

    /// Permute each contrast column in place, decorrelating it from any
    /// target while preserving its marginal value distribution and its
    /// missing-value pattern.
    ///
    /// Only the non-missing entries are shuffled; missing entries keep
    /// their positions.
    #[instrument(skip_all, fields(n_contrasts = self.features.len() - self.feature_count()))]
    pub fn permute_contrasts(&mut self, rng: &mut impl Rng) {
        let first_contrast = self.feature_count();
        for idx in first_contrast..self.features.len() {
            let mut sample_indices: Vec<usize> = (0..self.sample_count()).collect();
            let mut filtered = self.filtered_values(idx, &mut sample_indices);
            filtered.shuffle(rng);
            if let Some(values) = self.features[idx].values_mut() {
                for (pos, &sample_idx) in sample_indices.iter().enumerate() {
                    values[sample_idx] = filtered[pos];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{CONTRAST_SUFFIX, DEFAULT_SAMPLE_LABEL, FeatureTable};
    use crate::error::DataError;
    use crate::feature::Feature;

    fn small_table(use_contrasts: bool) -> FeatureTable {
        FeatureTable::new(
            vec![
                Feature::numeric("age", vec![1.0, 2.0, f64::NAN, 4.0]),
                Feature::categorical("color", &["red", "blue", "red", "NA"]),
            ],
            None,
            use_contrasts,
        )
        .unwrap()
    }

    #[test]
    fn construction_counts() {
        let table = small_table(false);
        assert_eq!(table.feature_count(), 2);
        assert_eq!(table.sample_count(), 4);
        assert_eq!(table.sample_label(0), DEFAULT_SAMPLE_LABEL);
    }

    #[test]
    fn empty_table_error() {
        let err = FeatureTable::new(vec![], None, false).unwrap_err();
        assert!(matches!(err, DataError::EmptyTable));
    }

    #[test]
    fn zero_samples_error() {
        let err = FeatureTable::new(vec![Feature::numeric("x", vec![])], None, false).unwrap_err();
        assert!(matches!(err, DataError::NoSamples));
    }

    #[test]
    fn duplicate_name_error() {
        let err = FeatureTable::new(
            vec![
                Feature::numeric("x", vec![1.0]),
                Feature::numeric("x", vec![2.0]),
            ],
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::DuplicateFeatureName { name } if name == "x"));
    }

    #[test]
    fn sample_count_mismatch_error() {
        let err = FeatureTable::new(
            vec![
                Feature::numeric("x", vec![1.0, 2.0]),
                Feature::numeric("y", vec![1.0]),
            ],
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DataError::SampleCountMismatch { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn textual_column_satisfies_sample_invariant() {
        // Textual storage is its token sets; mixed tables construct fine.
        let table = FeatureTable::new(
            vec![
                Feature::numeric("x", vec![1.0, 2.0]),
                Feature::textual("notes", &["a b", "c"]),
            ],
            None,
            false,
        )
        .unwrap();
        assert_eq!(table.sample_count(), 2);
        assert!(table.is_textual(1));
    }

    #[test]
    fn sample_label_mismatch_error() {
        let err = FeatureTable::new(
            vec![Feature::numeric("x", vec![1.0, 2.0])],
            Some(vec!["s1".into()]),
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DataError::SampleLabelCountMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn empty_labels_synthesize_placeholders() {
        let table = FeatureTable::new(
            vec![Feature::numeric("x", vec![1.0, 2.0])],
            Some(vec![]),
            false,
        )
        .unwrap();
        assert_eq!(table.sample_label(1), DEFAULT_SAMPLE_LABEL);
    }

    #[test]
    fn feature_index_lookup() {
        let table = small_table(false);
        assert_eq!(table.feature_index("age"), Some(0));
        assert_eq!(table.feature_index("color"), Some(1));
        assert_eq!(table.feature_index("nope"), None);
    }

    #[test]
    fn raw_value_rendering() {
        let table = small_table(false);
        assert_eq!(table.raw_value(0, 0).unwrap(), "1");
        assert_eq!(table.raw_value(0, 2).unwrap(), "NaN");
        assert_eq!(table.raw_value(1, 0).unwrap(), "red");
        assert_eq!(table.raw_value(1, 3).unwrap(), "NaN");
    }

    #[test]
    fn raw_value_idempotent() {
        let table = small_table(false);
        assert_eq!(table.raw_value(1, 1).unwrap(), table.raw_value(1, 1).unwrap());
    }

    #[test]
    fn raw_value_roundtrips_categories() {
        let table = small_table(false);
        for sample in 0..table.sample_count() {
            let rendered = table.raw_value(1, sample).unwrap();
            if rendered != "NaN" {
                let code = table.feature(1).categories().unwrap().code(&rendered);
                assert!((f64::from(code.unwrap()) - table.value(1, sample)).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn categories_listing() {
        let table = small_table(false);
        assert_eq!(table.categories(1), vec!["red".to_string(), "blue".to_string()]);
        assert!(table.categories(0).is_empty());
        assert_eq!(table.n_categories(1), 2);
        assert_eq!(table.n_max_categories(), 2);
    }

    #[test]
    fn real_sample_counts() {
        let table = small_table(false);
        assert_eq!(table.n_real_samples(0), 3);
        assert_eq!(table.n_real_samples(1), 3);
        // Sample 2 misses "age", sample 3 misses "color".
        assert_eq!(table.n_real_samples_pair(0, 1), 2);
    }

    #[test]
    fn replace_numeric_rebuilds_in_place() {
        let mut table = small_table(false);
        table.replace_numeric_data(0, vec![9.0, 8.0, 7.0, 6.0]).unwrap();
        assert!((table.value(0, 0) - 9.0).abs() < f64::EPSILON);
        assert_eq!(table.feature_name(0), "age");
    }

    #[test]
    fn replace_wrong_length_error() {
        let mut table = small_table(false);
        let err = table.replace_numeric_data(0, vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            DataError::ReplacementLengthMismatch { expected: 4, got: 1, .. }
        ));
    }

    #[test]
    fn replace_categorical_rederives_codes() {
        let mut table = small_table(false);
        table
            .replace_categorical_data(1, vec!["z".into(), "z".into(), "y".into(), "y".into()])
            .unwrap();
        assert_eq!(table.categories(1), vec!["z".to_string(), "y".to_string()]);
        assert!((table.value(1, 0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn contrasts_double_and_mirror() {
        let table = small_table(true);
        let n = table.feature_count();
        assert_eq!(n, 2);
        for i in 0..n {
            let shadow = n + i;
            assert_eq!(
                table.feature_name(shadow),
                format!("{}{}", table.feature_name(i), CONTRAST_SUFFIX)
            );
            for sample in 0..table.sample_count() {
                let original = table.value(i, sample);
                let copy = table.value(shadow, sample);
                assert!(original.is_nan() == copy.is_nan());
                if !original.is_nan() {
                    assert!((original - copy).abs() < f64::EPSILON);
                }
            }
        }
        assert_eq!(table.feature_index("age_CONTRAST"), Some(2));
    }

    #[test]
    fn permute_contrasts_preserves_marginals_and_missing() {
        let mut table = small_table(true);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        table.permute_contrasts(&mut rng);

        for i in 0..table.feature_count() {
            let shadow = table.feature_count() + i;
            let mut originals: Vec<f64> = (0..table.sample_count())
                .map(|s| table.value(i, s))
                .filter(|v| !v.is_nan())
                .collect();
            let mut permuted: Vec<f64> = (0..table.sample_count())
                .map(|s| table.value(shadow, s))
                .filter(|v| !v.is_nan())
                .collect();
            originals.sort_by(f64::total_cmp);
            permuted.sort_by(f64::total_cmp);
            assert_eq!(originals, permuted);

            for s in 0..table.sample_count() {
                assert_eq!(table.value(i, s).is_nan(), table.value(shadow, s).is_nan());
            }
        }
    }

    #[test]
    fn filtered_values_shrink_in_place() {
        let table = small_table(false);
        let mut indices = vec![0, 1, 2, 3];
        let values = table.filtered_values(0, &mut indices);
        assert_eq!(indices, vec![0, 1, 3]);
        assert_eq!(values, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn filtered_pair_drops_either_missing() {
        let table = small_table(false);
        let mut indices = vec![0, 1, 2, 3];
        let (age, color) = table.filtered_value_pair(0, 1, &mut indices);
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(age, vec![1.0, 2.0]);
        assert_eq!(color.len(), 2);
    }
}
