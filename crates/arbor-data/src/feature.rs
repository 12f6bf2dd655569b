//! Typed feature columns: numeric, categorical, and textual.

use std::collections::HashMap;

use crate::hash::TokenSet;

/// String forms accepted as "missing" in raw column data.
const MISSING_MARKERS: [&str; 5] = ["NA", "NaN", "nan", "NULL", "?"];

/// Canonical string rendering of a missing value.
pub(crate) const MISSING_RENDERING: &str = "NaN";

/// Return `true` if a raw string field denotes a missing value.
pub(crate) fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Bijective mapping between category labels and dense numeric codes.
///
/// Codes are assigned 0, 1, 2, … in order of first appearance within one
/// feature. Decoding goes through a checked lookup — nothing else may
/// assume the codes are contiguous.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Categories {
    codes: HashMap<String, u32>,
    labels: Vec<String>,
}

impl Categories {
    /// Look up or assign the code for a label.
    fn encode(&mut self, label: &str) -> u32 {
        if let Some(&code) = self.codes.get(label) {
            return code;
        }
        let code = self.labels.len() as u32;
        self.codes.insert(label.to_string(), code);
        self.labels.push(label.to_string());
        code
    }

    /// Return the label for a code, or `None` if the code is unmapped.
    #[must_use]
    pub fn label(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    /// Return the code for a label, if the label has been seen.
    #[must_use]
    pub fn code(&self, label: &str) -> Option<u32> {
        self.codes.get(label).copied()
    }

    /// Return all labels, indexed by code.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Return the number of distinct categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Return `true` if no category has been mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Per-kind storage of a feature column.
///
/// Numeric and categorical columns share one numeric representation with
/// `f64::NAN` as the missing sentinel; categorical values are the codes
/// from the column's [`Categories`] mapping. Textual columns carry one
/// [`TokenSet`] per sample and no numeric sequence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FeatureKind {
    /// Continuous values, missing entries encoded as NaN.
    Numeric {
        /// One value per sample.
        values: Vec<f64>,
    },
    /// Category codes, missing entries encoded as NaN.
    Categorical {
        /// One code per sample, stored as `f64`.
        values: Vec<f64>,
        /// Label ↔ code mapping for this column.
        categories: Categories,
    },
    /// Hashed bags of tokens, one set per sample.
    Textual {
        /// One token set per sample; an empty set is an empty field, not
        /// a missing one.
        token_sets: Vec<TokenSet>,
    },
}

/// A single named, typed column owned by a
/// [`FeatureTable`](crate::FeatureTable).
///
/// The kind is fixed at construction; replacing a feature's data always
/// rebuilds the `Feature` rather than mutating the kind in place.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Feature {
    name: String,
    kind: FeatureKind,
}

impl Feature {
    /// Build a numeric feature from raw values (missing = NaN).
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Numeric { values },
        }
    }

    /// Build a categorical feature by encoding raw string labels.
    ///
    /// Fields matching the missing-value vocabulary (`NA`, `NaN`, `nan`,
    /// `NULL`, `?`) encode to the missing sentinel and get no code.
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, raw: &[S]) -> Self {
        let mut categories = Categories::default();
        let values = raw
            .iter()
            .map(|field| {
                let field = field.as_ref();
                if is_missing_marker(field) {
                    f64::NAN
                } else {
                    f64::from(categories.encode(field.trim()))
                }
            })
            .collect();
        Self {
            name: name.into(),
            kind: FeatureKind::Categorical { values, categories },
        }
    }

    /// Build a textual feature by hashing each sample's text into a token set.
    pub fn textual<S: AsRef<str>>(name: impl Into<String>, raw: &[S]) -> Self {
        let token_sets = raw
            .iter()
            .map(|text| TokenSet::from_text(text.as_ref()))
            .collect();
        Self {
            name: name.into(),
            kind: FeatureKind::Textual { token_sets },
        }
    }

    /// Return the feature's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clone this feature under its contrast name (`<name><suffix>`),
    /// with identical data.
    pub(crate) fn contrast_copy(&self, suffix: &str) -> Self {
        Self {
            name: format!("{}{}", self.name, suffix),
            kind: self.kind.clone(),
        }
    }

    /// Return the feature's storage.
    #[must_use]
    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    /// Return `true` for numeric features.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, FeatureKind::Numeric { .. })
    }

    /// Return `true` for categorical features.
    #[must_use]
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }

    /// Return `true` for textual features.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self.kind, FeatureKind::Textual { .. })
    }

    /// Return the number of samples this column stores, regardless of kind.
    #[must_use]
    pub fn sample_len(&self) -> usize {
        match &self.kind {
            FeatureKind::Numeric { values } | FeatureKind::Categorical { values, .. } => {
                values.len()
            }
            FeatureKind::Textual { token_sets } => token_sets.len(),
        }
    }

    /// Read one sample through the numeric lens.
    ///
    /// Textual features have no numeric storage and always read as missing.
    #[must_use]
    pub fn value_at(&self, sample_idx: usize) -> f64 {
        match &self.kind {
            FeatureKind::Numeric { values } | FeatureKind::Categorical { values, .. } => {
                values[sample_idx]
            }
            FeatureKind::Textual { .. } => f64::NAN,
        }
    }

    /// Return the numeric value sequence, or `None` for textual features.
    #[must_use]
    pub fn values(&self) -> Option<&[f64]> {
        match &self.kind {
            FeatureKind::Numeric { values } | FeatureKind::Categorical { values, .. } => {
                Some(values)
            }
            FeatureKind::Textual { .. } => None,
        }
    }

    /// Mutable numeric storage; `None` for textual features.
    pub(crate) fn values_mut(&mut self) -> Option<&mut [f64]> {
        match &mut self.kind {
            FeatureKind::Numeric { values } | FeatureKind::Categorical { values, .. } => {
                Some(values)
            }
            FeatureKind::Textual { .. } => None,
        }
    }

    /// Return the categorical mapping, or `None` for other kinds.
    #[must_use]
    pub fn categories(&self) -> Option<&Categories> {
        match &self.kind {
            FeatureKind::Categorical { categories, .. } => Some(categories),
            _ => None,
        }
    }

    /// Return a sample's token set, or `None` for non-textual features.
    #[must_use]
    pub fn token_set(&self, sample_idx: usize) -> Option<&TokenSet> {
        match &self.kind {
            FeatureKind::Textual { token_sets } => Some(&token_sets[sample_idx]),
            _ => None,
        }
    }

    /// Deterministically select one token from a sample's set by
    /// `key % set_len`; `None` for non-textual features or empty sets.
    #[must_use]
    pub fn token_at(&self, sample_idx: usize, key: usize) -> Option<u32> {
        self.token_set(sample_idx).and_then(|set| set.select(key))
    }

    /// Test whether a sample's token set contains a token hash.
    ///
    /// Always `false` for non-textual features.
    #[must_use]
    pub fn has_token(&self, sample_idx: usize, token: u32) -> bool {
        self.token_set(sample_idx)
            .is_some_and(|set| set.contains(token))
    }

    /// Sum of per-token binary entropies over the tokens observed anywhere
    /// in this column.
    ///
    /// For each token `t` with occurrence fraction `p` over all samples,
    /// the contribution is `-(p·ln p + (1-p)·ln(1-p))`; the `p = 0` and
    /// `p = 1` endpoints contribute their limit, zero. Returns `None` for
    /// non-textual features.
    #[must_use]
    pub fn entropy(&self) -> Option<f64> {
        let FeatureKind::Textual { token_sets } = &self.kind else {
            return None;
        };
        let n_samples = token_sets.len();
        if n_samples == 0 {
            return Some(0.0);
        }

        let mut occurrences: HashMap<u32, usize> = HashMap::new();
        for set in token_sets {
            for token in set.iter() {
                *occurrences.entry(token).or_insert(0) += 1;
            }
        }

        let n = n_samples as f64;
        let entropy = occurrences
            .values()
            .map(|&count| {
                let p = count as f64 / n;
                binary_entropy(p)
            })
            .sum();
        Some(entropy)
    }
}

/// Entropy of a Bernoulli(p) variable in nats, zero at both endpoints.
fn binary_entropy(p: f64) -> f64 {
    let mut h = 0.0;
    if p > 0.0 {
        h -= p * p.ln();
    }
    if p < 1.0 {
        h -= (1.0 - p) * (1.0 - p).ln();
    }
    h
}
