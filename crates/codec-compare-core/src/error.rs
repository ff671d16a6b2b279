//! Error types for batch comparison
//!
//! Degenerate inputs (empty match sets, zero divisors, ambiguous rows) are not
//! errors; only broken invariants and self-comparison requests are.

/// Batch comparison errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompareError {
    /// A batch was asked to be matched against itself
    #[error("batch {batch_index} cannot be compared with itself")]
    SelfComparison { batch_index: usize },

    /// No batch is loaded at this index
    #[error("unknown batch index {0}")]
    UnknownBatch(usize),

    /// Batch index does not match its position among the loaded batches
    #[error("batch at position {position} has index {index}")]
    BatchIndexMismatch { position: usize, index: usize },

    /// Row width differs from the field count
    #[error("row {row}: expected {expected} values, got {actual}")]
    RowWidthMismatch { row: usize, expected: usize, actual: usize },

    /// Numeric field holding a non-numeric value
    #[error("row {row}: field {field} is numeric but holds a non-numeric value")]
    NonNumericValue { row: usize, field: usize },

    /// Filter count differs from the field count
    #[error("expected {expected} filters, got {actual}")]
    FilterCountMismatch { expected: usize, actual: usize },

    /// Range filter on a categorical field or value filter on a numeric field
    #[error("filter kind does not match field {field}")]
    FilterKindMismatch { field: usize },

    /// Field index outside the batch schema
    #[error("field index {field} out of range for batch {batch_index}")]
    FieldOutOfRange { batch_index: usize, field: usize },

    /// Metric field index count differs from the batch count
    #[error("metric references {actual} batches, {expected} are loaded")]
    MetricBatchCountMismatch { expected: usize, actual: usize },

    /// Metric fields are not mutually comparable numeric fields
    #[error("metric field {field} of batch {batch_index} is not comparable")]
    IncomparableMetricField { batch_index: usize, field: usize },

    /// No metric at this index
    #[error("unknown metric index {0}")]
    UnknownMetric(usize),
}

/// Result type for batch comparison
pub type Result<T> = std::result::Result<T, CompareError>;
