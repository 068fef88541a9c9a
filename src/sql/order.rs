//! Ordering strategies for paginated queries.

use super::trusted::TrustedExpression;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OrderBy {
    /// Primary key ascending.
    #[default]
    Default,
    /// A mapped column, validated against the entity's metadata.
    Column { field: String, descending: bool },
    /// A verbatim ORDER BY body.
    Trusted(TrustedExpression),
}

impl OrderBy {
    pub fn column(field: impl Into<String>, descending: bool) -> Self {
        Self::Column {
            field: field.into(),
            descending,
        }
    }

    pub fn trusted(expression: TrustedExpression) -> Self {
        Self::Trusted(expression)
    }

    /// Combine the optional ordering inputs of a paginated call.
    ///
    /// A trusted expression wins over a column name; with neither, the
    /// default ordering applies.
    pub fn from_parts(
        column: Option<&str>,
        descending: bool,
        trusted: Option<TrustedExpression>,
    ) -> Self {
        match (trusted, column) {
            (Some(expression), _) => Self::Trusted(expression),
            (None, Some(field)) => Self::column(field, descending),
            (None, None) => Self::Default,
        }
    }
}
