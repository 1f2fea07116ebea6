//! Run correlation ids

use uuid::Uuid;

/// Generate a new run ID using UUID v4
///
/// Attached to the root span of a simulation so every log line of one run can
/// be correlated, including lines from the per-vehicle tasks.
///
/// # Examples
///
/// ```
/// use hazard::logging::generate_run_id;
///
/// let run_id = generate_run_id();
/// assert!(!run_id.is_empty());
/// ```
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}
