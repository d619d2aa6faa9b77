//! Query Abstract Syntax Tree
//!
//! Defines the AST for the skill query language, a small SQL-like language
//! over catalogued action records.
//!
//! # Example Queries
//!
//! ```text
//! DamageAction where baseDamage > 200
//! baseDamage between 100 and 300
//! SELECT COUNT(*), AVG(baseDamage) FROM DamageAction GROUP BY damageType
//! ```

use crate::document::ParamValue;
use serde::{Deserialize, Serialize};

/// Comparison operators for leaf conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
    /// Equal to (case-insensitive for strings)
    Eq,
    /// Not equal to
    Neq,
    /// Case-insensitive substring match
    Contains,
    /// Inclusive numeric range
    Between,
    /// Membership in a value list
    In,
}

impl Operator {
    /// Parse a symbolic operator token
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Neq),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Eq => write!(f, "="),
            Self::Neq => write!(f, "!="),
            Self::Contains => write!(f, "contains"),
            Self::Between => write!(f, "between"),
            Self::In => write!(f, "in"),
        }
    }
}

/// A leaf filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCondition {
    /// Field or parameter name being tested
    pub parameter: String,
    /// Comparison operator
    pub op: Operator,
    /// Comparison value
    pub value: ParamValue,
    /// Upper bound for `between`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<ParamValue>,
    /// Candidate list for `in`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ParamValue>,
}

impl QueryCondition {
    /// Create a simple binary condition
    pub fn new(parameter: impl Into<String>, op: Operator, value: impl Into<ParamValue>) -> Self {
        Self {
            parameter: parameter.into(),
            op,
            value: value.into(),
            value2: None,
            values: Vec::new(),
        }
    }

    /// Create an inclusive `between` condition
    pub fn between(
        parameter: impl Into<String>,
        low: impl Into<ParamValue>,
        high: impl Into<ParamValue>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            op: Operator::Between,
            value: low.into(),
            value2: Some(high.into()),
            values: Vec::new(),
        }
    }

    /// Create an `in` condition
    pub fn in_list(parameter: impl Into<String>, values: Vec<ParamValue>) -> Self {
        Self {
            parameter: parameter.into(),
            op: Operator::In,
            value: ParamValue::Null,
            value2: None,
            values,
        }
    }
}

/// Boolean connectives for compound conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    /// All children must hold
    And,
    /// At least one child must hold
    Or,
    /// The single child must not hold
    Not,
}

/// A node in the condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionNode {
    /// A leaf comparison
    Leaf(QueryCondition),
    /// A boolean combination of sub-conditions
    Compound {
        /// Connective
        op: LogicalOp,
        /// Child conditions (exactly one for `Not`)
        children: Vec<ConditionNode>,
    },
}

impl ConditionNode {
    /// Combine nodes with `and`; a single node passes through unchanged
    pub fn all(mut children: Vec<ConditionNode>) -> ConditionNode {
        if children.len() == 1 {
            children.remove(0)
        } else {
            ConditionNode::Compound {
                op: LogicalOp::And,
                children,
            }
        }
    }

    /// Combine nodes with `or`; a single node passes through unchanged
    pub fn any(mut children: Vec<ConditionNode>) -> ConditionNode {
        if children.len() == 1 {
            children.remove(0)
        } else {
            ConditionNode::Compound {
                op: LogicalOp::Or,
                children,
            }
        }
    }

    /// Negate a node
    pub fn negate(child: ConditionNode) -> ConditionNode {
        ConditionNode::Compound {
            op: LogicalOp::Not,
            children: vec![child],
        }
    }
}

/// Aggregation functions available in queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunc {
    /// Row count
    Count,
    /// Sum of numeric values
    Sum,
    /// Average of numeric values
    Avg,
    /// Minimum numeric value
    Min,
    /// Maximum numeric value
    Max,
}

impl AggregateFunc {
    /// Parse from a function name
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "avg" | "average" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// Fold a slice of numeric values; `None` on an empty slice
    ///
    /// `Count` is handled by the evaluator (it counts rows, not values).
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(match self {
            Self::Count => values.len() as f64,
            Self::Sum => values.iter().sum(),
            Self::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Self::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

impl std::fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count => write!(f, "COUNT"),
            Self::Sum => write!(f, "SUM"),
            Self::Avg => write!(f, "AVG"),
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
        }
    }
}

/// One aggregate in the SELECT clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateClause {
    /// The function
    pub func: AggregateFunc,
    /// Field to aggregate; `None` means `COUNT(*)`
    pub field: Option<String>,
    /// Optional `AS` alias
    pub alias: Option<String>,
}

impl AggregateClause {
    /// Create a clause without an alias
    pub fn new(func: AggregateFunc, field: Option<&str>) -> Self {
        Self {
            func,
            field: field.map(str::to_string),
            alias: None,
        }
    }

    /// Output column name: alias, else `count` / `count_<field>` /
    /// `<func>_<field>`
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match (&self.func, &self.field) {
            (AggregateFunc::Count, None) => "count".to_string(),
            (AggregateFunc::Count, Some(field)) => format!("count_{}", field),
            (func, Some(field)) => format!("{}_{}", func.to_string().to_lowercase(), field),
            (func, None) => func.to_string().to_lowercase(),
        }
    }
}

/// GROUP BY clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByClause {
    /// Grouping fields; the group key is the tuple of their values
    pub fields: Vec<String>,
}

/// ORDER BY entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByClause {
    /// Field to sort on
    pub field: String,
    /// Sort descending when set
    pub descending: bool,
}

/// A parsed query ready for evaluation
///
/// The parser never fails: unparseable text produces an expression where
/// [`QueryExpression::is_empty`] is true and `parse_warning` explains why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryExpression {
    /// Restrict to one action type
    pub action_type: Option<String>,
    /// Restrict to one track name
    pub track_name: Option<String>,
    /// Filter tree
    pub condition: Option<ConditionNode>,
    /// Plain fields in the SELECT clause
    pub select_fields: Vec<String>,
    /// Aggregates in the SELECT clause
    pub aggregates: Vec<AggregateClause>,
    /// Grouping
    pub group_by: Option<GroupByClause>,
    /// HAVING filter over aggregated rows
    pub having: Option<ConditionNode>,
    /// Sort order
    pub order_by: Vec<OrderByClause>,
    /// Result limit
    pub limit: Option<usize>,
    /// Result offset
    pub offset: usize,
    /// Set when the input degraded to an empty expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_warning: Option<String>,
}

impl QueryExpression {
    /// An expression that filters nothing (matches every record)
    pub fn match_all() -> Self {
        Self::default()
    }

    /// The degraded result of an unparseable input
    pub fn degraded(warning: impl Into<String>) -> Self {
        Self {
            parse_warning: Some(warning.into()),
            ..Self::default()
        }
    }

    /// True when no clause carries any filtering or selection intent
    ///
    /// This is the "parsed but empty" signal callers must check instead of
    /// catching parse errors.
    pub fn is_empty(&self) -> bool {
        self.action_type.is_none()
            && self.track_name.is_none()
            && self.condition.is_none()
            && self.select_fields.is_empty()
            && self.aggregates.is_empty()
            && self.group_by.is_none()
    }

    /// True when the expression carries aggregation
    pub fn is_aggregate(&self) -> bool {
        !self.aggregates.is_empty() || self.group_by.is_some()
    }

    /// Builder method: set the action type filter
    pub fn with_action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = Some(action_type.into());
        self
    }

    /// Builder method: set the track name filter
    pub fn with_track_name(mut self, track_name: impl Into<String>) -> Self {
        self.track_name = Some(track_name.into());
        self
    }

    /// Builder method: set the condition tree
    pub fn with_condition(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Builder method: set the limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_from_symbol() {
        assert_eq!(Operator::from_symbol(">="), Some(Operator::Gte));
        assert_eq!(Operator::from_symbol("=="), Some(Operator::Eq));
        assert_eq!(Operator::from_symbol("<>"), Some(Operator::Neq));
        assert_eq!(Operator::from_symbol("~"), None);
    }

    #[test]
    fn test_aggregate_apply() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(AggregateFunc::Sum.apply(&values), Some(10.0));
        assert_eq!(AggregateFunc::Avg.apply(&values), Some(2.5));
        assert_eq!(AggregateFunc::Min.apply(&values), Some(1.0));
        assert_eq!(AggregateFunc::Max.apply(&values), Some(4.0));
        assert_eq!(AggregateFunc::Sum.apply(&[]), None);
    }

    #[test]
    fn test_aggregate_output_names() {
        assert_eq!(
            AggregateClause::new(AggregateFunc::Count, None).output_name(),
            "count"
        );
        assert_eq!(
            AggregateClause::new(AggregateFunc::Count, Some("baseDamage")).output_name(),
            "count_baseDamage"
        );
        assert_eq!(
            AggregateClause::new(AggregateFunc::Avg, Some("baseDamage")).output_name(),
            "avg_baseDamage"
        );

        let aliased = AggregateClause {
            alias: Some("dmg".to_string()),
            ..AggregateClause::new(AggregateFunc::Avg, Some("baseDamage"))
        };
        assert_eq!(aliased.output_name(), "dmg");
    }

    #[test]
    fn test_condition_node_collapse() {
        let leaf = ConditionNode::Leaf(QueryCondition::new("frame", Operator::Gt, 10i64));
        // A single child collapses to itself
        assert_eq!(ConditionNode::all(vec![leaf.clone()]), leaf);

        let both = ConditionNode::all(vec![leaf.clone(), leaf.clone()]);
        assert!(matches!(
            both,
            ConditionNode::Compound { op: LogicalOp::And, .. }
        ));
    }

    #[test]
    fn test_expression_emptiness() {
        assert!(QueryExpression::match_all().is_empty());
        assert!(QueryExpression::degraded("nope").is_empty());
        assert!(!QueryExpression::match_all()
            .with_action_type("DamageAction")
            .is_empty());

        let degraded = QueryExpression::degraded("bad input");
        assert_eq!(degraded.parse_warning.as_deref(), Some("bad input"));
    }
}
