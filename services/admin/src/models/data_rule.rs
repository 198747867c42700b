//! Data rule model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row-level data restriction a role can be granted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DataRule {
    pub id: i64,
    pub name: String,
    /// Model the rule filters
    pub model: String,
    pub column: String,
    /// `and` / `or` when combined with other rules
    pub operator: String,
    /// Comparison such as `eq`, `ne`, `gt`, `in`
    pub expression: String,
    pub value: String,
}
