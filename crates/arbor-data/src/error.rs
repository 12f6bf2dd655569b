/// Errors from table construction, data replacement, and sampling.
///
/// Every variant is unrecoverable for the operation that produced it: the
/// call either fully succeeds or fails without partial state. Lookup misses
/// and inadmissible splits are not errors — those surface as `None` from
/// the respective methods.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Returned when a table is constructed with zero feature columns.
    #[error("table must have at least one feature")]
    EmptyTable,

    /// Returned when a table is constructed with zero samples.
    #[error("table must have at least one sample")]
    NoSamples,

    /// Returned when two feature columns share a name.
    #[error("duplicate feature name \"{name}\"")]
    DuplicateFeatureName {
        /// The name that appeared more than once.
        name: String,
    },

    /// Returned when a feature column's length differs from the table's sample count.
    #[error("feature \"{name}\" has {got} samples, expected {expected}")]
    SampleCountMismatch {
        /// Name of the offending feature.
        name: String,
        /// The table's sample count.
        expected: usize,
        /// The feature's actual length.
        got: usize,
    },

    /// Returned when supplied sample labels do not match the sample count.
    #[error("{got} sample labels supplied, expected {expected}")]
    SampleLabelCountMismatch {
        /// The table's sample count.
        expected: usize,
        /// The number of labels supplied.
        got: usize,
    },

    /// Returned when replacement data does not match the current sample count.
    #[error("replacement data for \"{name}\" has {got} values, expected {expected}")]
    ReplacementLengthMismatch {
        /// Name of the feature being replaced.
        name: String,
        /// The table's sample count.
        expected: usize,
        /// The replacement data's length.
        got: usize,
    },

    /// Returned when a categorical code has no label in the back-map.
    ///
    /// Should not occur for codes produced by this table.
    #[error("feature \"{name}\" has no label for category code {code}")]
    UnmappedCategory {
        /// Name of the categorical feature.
        name: String,
        /// The unmapped numeric code.
        code: f64,
    },

    /// Returned when an ingestion header carries an unknown type tag.
    #[error("unknown feature type tag in header \"{header}\"")]
    UnknownTypeTag {
        /// The full header that failed to classify.
        header: String,
    },

    /// Returned when the four ingestion artifacts disagree on counts.
    #[error("ingestion artifact mismatch: {what} has {got} entries, expected {expected}")]
    ArtifactShapeMismatch {
        /// Which artifact disagreed (e.g. "type tags").
        what: &'static str,
        /// The count implied by the header list.
        expected: usize,
        /// The artifact's actual count.
        got: usize,
    },

    /// Returned when the bootstrap fraction is non-positive, non-finite,
    /// or exceeds 1.0 when sampling without replacement.
    #[error("invalid sample fraction {fraction}: must be > 0, and <= 1.0 without replacement")]
    InvalidSampleFraction {
        /// The invalid fraction.
        fraction: f64,
    },
}
