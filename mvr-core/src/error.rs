use thiserror::Error;

/// The reasons a [`TransformModel`](crate::TransformModel) can fail to fit or invert.
///
/// A failed fit never modifies the model it was called on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Fewer matches were supplied than the model needs to be determined.
    #[error("not enough data points to fit the model: found {found}, required {required}")]
    NotEnoughData { required: usize, found: usize },
    /// Enough matches were supplied, but they are degenerate (collinear, coplanar or zero weight).
    #[error("ill-defined data points: the normal equations are singular")]
    IllDefinedData,
    /// The model has no inverse.
    #[error("the model is not invertible")]
    Noninvertible,
}
