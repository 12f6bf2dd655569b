//! The ingestion hand-off: parsed artifacts in, a table out.
//!
//! File parsing itself lives outside the engine. A parser hands over four
//! parallel artifacts — a feature-major raw string matrix, the feature
//! headers, one type tag per feature, and sample labels (empty when the
//! format carries none) — and the table is built from them here. Type
//! tags come either from the parser's own metadata or from the
//! single-letter header convention handled by [`TypeTag::of_header`].

use tracing::info;

use crate::error::DataError;
use crate::feature::{Feature, is_missing_marker};
use crate::table::FeatureTable;

/// Per-feature type tag handed over by the ingestion layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeTag {
    /// Continuous values.
    Numeric,
    /// String labels encoded to category codes.
    Categorical,
    /// Free text encoded to hashed token sets.
    Textual,
}

impl TypeTag {
    /// Classify a header of the form `<letter><delimiter><name>`:
    /// `N` numeric, `C` or `B` categorical, `T` textual. `None` when the
    /// header does not follow the convention.
    #[must_use]
    pub fn of_header(header: &str, delimiter: char) -> Option<Self> {
        let mut chars = header.chars();
        let tag = chars.next()?;
        if chars.next() != Some(delimiter) {
            return None;
        }
        match tag {
            'N' => Some(Self::Numeric),
            'C' | 'B' => Some(Self::Categorical),
            'T' => Some(Self::Textual),
            _ => None,
        }
    }
}

/// The four parallel artifacts an ingestion layer produces.
///
/// `matrix` is feature-major: `matrix[feature][sample]`. `sample_labels`
/// may be empty, in which case the table synthesizes placeholders.
#[derive(Debug, Clone)]
pub struct RawArtifacts {
    /// Raw string matrix, one row per feature.
    pub matrix: Vec<Vec<String>>,
    /// Feature headers, used verbatim as feature names.
    pub headers: Vec<String>,
    /// One type tag per feature.
    pub tags: Vec<TypeTag>,
    /// Sample labels, or empty.
    pub sample_labels: Vec<String>,
}

impl RawArtifacts {
    /// Assemble artifacts from a matrix whose headers carry their own type
    /// tags (`N:age`, `C:color`, `T:notes`, …).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownTypeTag`] for any header that does not
    /// follow the convention.
    pub fn with_header_tags(
        matrix: Vec<Vec<String>>,
        headers: Vec<String>,
        sample_labels: Vec<String>,
        delimiter: char,
    ) -> Result<Self, DataError> {
        let tags = headers
            .iter()
            .map(|header| {
                TypeTag::of_header(header, delimiter).ok_or_else(|| DataError::UnknownTypeTag {
                    header: header.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            matrix,
            headers,
            tags,
            sample_labels,
        })
    }

    /// Build a [`FeatureTable`] from the artifacts.
    ///
    /// Numeric fields matching the missing-value vocabulary, or failing
    /// to parse as a float, read as missing.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DataError::ArtifactShapeMismatch`] | matrix or tag count disagrees with the header count |
    /// | construction errors | propagated from [`FeatureTable::new`] |
    pub fn into_table(self, use_contrasts: bool) -> Result<FeatureTable, DataError> {
        let n_features = self.headers.len();
        if self.matrix.len() != n_features {
            return Err(DataError::ArtifactShapeMismatch {
                what: "raw matrix",
                expected: n_features,
                got: self.matrix.len(),
            });
        }
        if self.tags.len() != n_features {
            return Err(DataError::ArtifactShapeMismatch {
                what: "type tags",
                expected: n_features,
                got: self.tags.len(),
            });
        }

        let features = self
            .headers
            .into_iter()
            .zip(self.matrix)
            .zip(self.tags)
            .map(|((header, column), tag)| match tag {
                TypeTag::Numeric => {
                    let values = column.iter().map(|field| parse_numeric(field)).collect();
                    Feature::numeric(header, values)
                }
                TypeTag::Categorical => Feature::categorical(header, &column),
                TypeTag::Textual => Feature::textual(header, &column),
            })
            .collect::<Vec<_>>();

        info!(n_features, "ingestion artifacts converted");

        FeatureTable::new(features, Some(self.sample_labels), use_contrasts)
    }
}

/// Parse one raw numeric field; missing markers and unparseable fields
/// read as the missing sentinel.
fn parse_numeric(field: &str) -> f64 {
    if is_missing_marker(field) {
        return f64::NAN;
    }
    field.trim().parse().unwrap_or(f64::NAN)
}
