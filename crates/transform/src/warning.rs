use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A recoverable data-quality problem in one record.
///
/// Collected on the [`TransformResult`](crate::TransformResult) and reported
/// to the operator; never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataWarning {
    pub natural_key: String,
    /// Source field the warning is about.
    pub field: String,
    pub message: String,
}
impl Display for DataWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}: {}", self.natural_key, self.field, self.message)
    }
}
