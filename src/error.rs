use crate::qp::QpError;
use thiserror::Error;

/// Failure kinds reported by [`crate::hybrid_astar::HybridAStar::plan`].
///
/// None of these are fatal to the planner instance; the caller may retry
/// with different poses or tuning.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("start pose is out of bounds or in collision")]
    InvalidStart,
    #[error("end pose is out of bounds or in collision")]
    InvalidEnd,
    #[error("open set exhausted before reaching the goal")]
    SearchExhausted,
    #[error("node with an empty pose sequence met during path reconstruction")]
    EmptyNodeSequence,
    #[error("path too short to derive a speed profile")]
    ProfileTooShort,
    #[error("piecewise jerk speed optimization failed: {0}")]
    QpFailure(#[from] QpError),
    #[error("result size mismatch: {0}")]
    SizeMismatch(String),
}
