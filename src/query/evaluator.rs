//! Query Evaluator
//!
//! Walks a [`ConditionNode`] against one record and performs
//! grouping/aggregation over matched sets.
//!
//! Comparison semantics:
//! - numeric operators coerce both operands to f64; a failed coercion makes
//!   the condition false, never an error
//! - string equality and `contains` are case-insensitive
//! - `between` is inclusive on both bounds
//! - `in` matches when the actual value equals any listed element
//!
//! Field resolution checks the record's top-level fields first
//! (`action_type`, `frame`, `duration`, ...), then its `parameters` map,
//! including dotted paths into nested parameter maps.

use crate::document::ParamValue;
use crate::index::CataloguedAction;
use crate::query::ast::{
    AggregateClause, AggregateFunc, ConditionNode, GroupByClause, LogicalOp, Operator,
    QueryCondition,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anything a condition can be evaluated against
pub trait FieldLookup {
    /// Resolve a field by name; `None` when the record has no such field
    fn field(&self, name: &str) -> Option<ParamValue>;
}

impl FieldLookup for CataloguedAction<'_> {
    fn field(&self, name: &str) -> Option<ParamValue> {
        let record = self.record;
        match name {
            "action_type" | "type" => Some(ParamValue::Str(record.action_type.clone())),
            "action_index" => Some(ParamValue::Int(record.action_index as i64)),
            "frame" => Some(ParamValue::Int(record.frame)),
            "duration" => Some(ParamValue::Int(record.duration)),
            "track_name" | "track" => Some(ParamValue::Str(self.track_name.to_string())),
            "json_path" => Some(ParamValue::Str(record.json_path.clone())),
            "line_number" => Some(
                record
                    .line_number
                    .map_or(ParamValue::Null, |l| ParamValue::Int(i64::from(l))),
            ),
            "summary" => Some(ParamValue::Str(record.summary.clone())),
            "file_path" | "file" => Some(ParamValue::Str(self.file_path.to_string())),
            "skill_name" | "skill" => Some(ParamValue::Str(self.skill_name.to_string())),
            _ => lookup_parameter(&record.parameters, name),
        }
    }
}

/// Plain parameter lookup, falling back to dotted traversal into nested maps
fn lookup_parameter(parameters: &BTreeMap<String, ParamValue>, name: &str) -> Option<ParamValue> {
    if let Some(value) = parameters.get(name) {
        return Some(value.clone());
    }
    if !name.contains('.') {
        return None;
    }
    let mut segments = name.split('.');
    let mut current = parameters.get(segments.next()?)?;
    for segment in segments {
        current = current.as_nested()?.get(segment)?;
    }
    Some(current.clone())
}

/// Evaluate a condition tree against one record
pub fn evaluate(node: &ConditionNode, record: &dyn FieldLookup) -> bool {
    match node {
        ConditionNode::Leaf(cond) => evaluate_leaf(cond, record),
        ConditionNode::Compound { op, children } => match op {
            LogicalOp::And => children.iter().all(|c| evaluate(c, record)),
            LogicalOp::Or => children.iter().any(|c| evaluate(c, record)),
            LogicalOp::Not => !children.iter().any(|c| evaluate(c, record)),
        },
    }
}

fn evaluate_leaf(cond: &QueryCondition, record: &dyn FieldLookup) -> bool {
    let actual = record.field(&cond.parameter).unwrap_or(ParamValue::Null);

    match cond.op {
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            compare_numeric(cond.op, &actual, &cond.value)
        }
        Operator::Eq => values_equal(&actual, &cond.value),
        Operator::Neq => !values_equal(&actual, &cond.value),
        Operator::Contains => {
            if actual.is_null() {
                return false;
            }
            actual
                .as_str_lossy()
                .to_lowercase()
                .contains(&cond.value.as_str_lossy().to_lowercase())
        }
        Operator::Between => {
            let (Some(v), Some(low)) = (actual.as_f64(), cond.value.as_f64()) else {
                return false;
            };
            let Some(high) = cond.value2.as_ref().and_then(ParamValue::as_f64) else {
                return false;
            };
            low <= v && v <= high
        }
        Operator::In => cond.values.iter().any(|candidate| values_equal(&actual, candidate)),
    }
}

fn compare_numeric(op: Operator, actual: &ParamValue, expected: &ParamValue) -> bool {
    let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) else {
        return false;
    };
    match op {
        Operator::Gt => a > b,
        Operator::Gte => a >= b,
        Operator::Lt => a < b,
        Operator::Lte => a <= b,
        _ => false,
    }
}

/// Equality: numeric when both sides coerce, else null-aware
/// case-insensitive string comparison
fn values_equal(actual: &ParamValue, expected: &ParamValue) -> bool {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return (a - b).abs() < f64::EPSILON;
    }
    match (actual.is_null(), expected.is_null()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        _ => {}
    }
    actual
        .as_str_lossy()
        .eq_ignore_ascii_case(&expected.as_str_lossy())
}

/// Order two values: numerically when both coerce, else by lowercased string
pub fn compare_values(a: &ParamValue, b: &ParamValue) -> std::cmp::Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
    }
    a.as_str_lossy()
        .to_lowercase()
        .cmp(&b.as_str_lossy().to_lowercase())
}

/// One aggregated output row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Group-by field → group value
    pub group: BTreeMap<String, ParamValue>,
    /// Aggregate output name → value
    pub values: BTreeMap<String, ParamValue>,
}

impl AggregateRow {
    /// Flatten group fields and aggregate outputs into one map
    pub fn to_map(&self) -> BTreeMap<String, ParamValue> {
        let mut map = self.group.clone();
        map.extend(self.values.clone());
        map
    }
}

impl FieldLookup for AggregateRow {
    fn field(&self, name: &str) -> Option<ParamValue> {
        self.values
            .get(name)
            .or_else(|| self.group.get(name))
            .cloned()
    }
}

/// Group records and compute aggregates
///
/// The group key is the tuple of `group_by` field values (stringified); with
/// no `group_by` every record lands in one group. `COUNT(*)` counts rows;
/// `COUNT(field)` counts rows where the field resolves non-null; the numeric
/// folds silently exclude values that do not coerce (they are not zero).
/// With no aggregates given, `COUNT(*)` is implied. Rows come back sorted by
/// group key.
pub fn aggregate<T: FieldLookup>(
    records: &[T],
    aggregates: &[AggregateClause],
    group_by: Option<&GroupByClause>,
) -> Vec<AggregateRow> {
    let implied_count = [AggregateClause::new(AggregateFunc::Count, None)];
    let aggregates: &[AggregateClause] = if aggregates.is_empty() {
        &implied_count
    } else {
        aggregates
    };

    let group_fields: &[String] = group_by.map_or(&[], |g| g.fields.as_slice());

    // Bucket records by stringified group key, keeping keys sorted
    let mut groups: BTreeMap<Vec<String>, Vec<&T>> = BTreeMap::new();
    for record in records {
        let key: Vec<String> = group_fields
            .iter()
            .map(|f| {
                record
                    .field(f)
                    .unwrap_or(ParamValue::Null)
                    .as_str_lossy()
            })
            .collect();
        groups.entry(key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let group: BTreeMap<String, ParamValue> = group_fields
                .iter()
                .zip(key)
                .map(|(field, value)| (field.clone(), ParamValue::Str(value)))
                .collect();

            let mut values = BTreeMap::new();
            for clause in aggregates {
                let value = apply_aggregate(clause, &members);
                values.insert(clause.output_name(), value);
            }

            AggregateRow { group, values }
        })
        .collect()
}

fn apply_aggregate<T: FieldLookup>(clause: &AggregateClause, members: &[&T]) -> ParamValue {
    match (&clause.func, &clause.field) {
        (AggregateFunc::Count, None) => ParamValue::Int(members.len() as i64),
        (AggregateFunc::Count, Some(field)) => {
            let count = members
                .iter()
                .filter(|m| m.field(field).is_some_and(|v| !v.is_null()))
                .count();
            ParamValue::Int(count as i64)
        }
        (func, Some(field)) => {
            let numeric: Vec<f64> = members
                .iter()
                .filter_map(|m| m.field(field))
                .filter_map(|v| v.as_f64())
                .collect();
            func.apply(&numeric).map_or(ParamValue::Null, ParamValue::Float)
        }
        // SUM()/AVG()/... without a field has nothing to fold
        (_, None) => ParamValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::QueryCondition;

    /// Minimal lookup over a plain map
    struct Row(BTreeMap<String, ParamValue>);

    impl Row {
        fn of(pairs: &[(&str, ParamValue)]) -> Self {
            Row(pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect())
        }
    }

    impl FieldLookup for Row {
        fn field(&self, name: &str) -> Option<ParamValue> {
            lookup_parameter(&self.0, name)
        }
    }

    fn damage_row(damage: i64, kind: &str) -> Row {
        Row::of(&[
            ("baseDamage", ParamValue::Int(damage)),
            ("damageType", ParamValue::Str(kind.to_string())),
        ])
    }

    #[test]
    fn test_numeric_comparisons() {
        let row = damage_row(250, "Fire");
        let gt = ConditionNode::Leaf(QueryCondition::new("baseDamage", Operator::Gt, 200i64));
        let lt = ConditionNode::Leaf(QueryCondition::new("baseDamage", Operator::Lt, 200i64));
        let gte = ConditionNode::Leaf(QueryCondition::new("baseDamage", Operator::Gte, 250i64));

        assert!(evaluate(&gt, &row));
        assert!(!evaluate(&lt, &row));
        assert!(evaluate(&gte, &row));
    }

    #[test]
    fn test_numeric_coercion_failure_is_false() {
        let row = damage_row(250, "Fire");
        // "damageType" does not coerce to a number: false, not an error
        let cond = ConditionNode::Leaf(QueryCondition::new("damageType", Operator::Gt, 0i64));
        assert!(!evaluate(&cond, &row));

        // Missing field: false as well
        let cond = ConditionNode::Leaf(QueryCondition::new("missing", Operator::Gt, 0i64));
        assert!(!evaluate(&cond, &row));
    }

    #[test]
    fn test_string_equality_case_insensitive() {
        let row = damage_row(250, "Fire");
        let eq = ConditionNode::Leaf(QueryCondition::new("damageType", Operator::Eq, "fire"));
        let neq = ConditionNode::Leaf(QueryCondition::new("damageType", Operator::Neq, "ICE"));
        assert!(evaluate(&eq, &row));
        assert!(evaluate(&neq, &row));
    }

    #[test]
    fn test_numeric_equality_across_types() {
        let row = Row::of(&[("ratio", ParamValue::Float(2.0))]);
        let eq = ConditionNode::Leaf(QueryCondition::new("ratio", Operator::Eq, 2i64));
        assert!(evaluate(&eq, &row));
    }

    #[test]
    fn test_contains_case_insensitive() {
        let row = Row::of(&[(
            "animationClipName",
            ParamValue::Str("Hero_Attack_01".into()),
        )]);
        let cond = ConditionNode::Leaf(QueryCondition::new(
            "animationClipName",
            Operator::Contains,
            "attack",
        ));
        assert!(evaluate(&cond, &row));

        let cond = ConditionNode::Leaf(QueryCondition::new(
            "animationClipName",
            Operator::Contains,
            "Idle",
        ));
        assert!(!evaluate(&cond, &row));
    }

    #[test]
    fn test_between_inclusive_bounds() {
        let check = |damage: i64| {
            let row = damage_row(damage, "Fire");
            let cond =
                ConditionNode::Leaf(QueryCondition::between("baseDamage", 100i64, 300i64));
            evaluate(&cond, &row)
        };
        assert!(!check(50));
        assert!(check(100));
        assert!(check(150));
        assert!(check(300));
        assert!(!check(350));
    }

    #[test]
    fn test_in_list() {
        let row = damage_row(250, "Fire");
        let cond = ConditionNode::Leaf(QueryCondition::in_list(
            "damageType",
            vec![ParamValue::Str("Ice".into()), ParamValue::Str("fire".into())],
        ));
        assert!(evaluate(&cond, &row));

        let cond = ConditionNode::Leaf(QueryCondition::in_list(
            "damageType",
            vec![ParamValue::Str("Ice".into())],
        ));
        assert!(!evaluate(&cond, &row));
    }

    #[test]
    fn test_null_equality() {
        let row = Row::of(&[("maybe", ParamValue::Null)]);
        let eq_null = ConditionNode::Leaf(QueryCondition::new(
            "maybe",
            Operator::Eq,
            ParamValue::Null,
        ));
        assert!(evaluate(&eq_null, &row));

        // A missing field also reads as null
        let missing_null = ConditionNode::Leaf(QueryCondition::new(
            "missing",
            Operator::Eq,
            ParamValue::Null,
        ));
        assert!(evaluate(&missing_null, &row));
    }

    #[test]
    fn test_compound_and_or_not() {
        let row = damage_row(250, "Fire");
        let high = QueryCondition::new("baseDamage", Operator::Gt, 200i64);
        let ice = QueryCondition::new("damageType", Operator::Eq, "Ice");

        let and = ConditionNode::all(vec![
            ConditionNode::Leaf(high.clone()),
            ConditionNode::Leaf(ice.clone()),
        ]);
        assert!(!evaluate(&and, &row));

        let or = ConditionNode::any(vec![
            ConditionNode::Leaf(high.clone()),
            ConditionNode::Leaf(ice.clone()),
        ]);
        assert!(evaluate(&or, &row));

        let not = ConditionNode::negate(ConditionNode::Leaf(ice));
        assert!(evaluate(&not, &row));
    }

    #[test]
    fn test_dotted_nested_parameter_lookup() {
        let nested: BTreeMap<String, ParamValue> =
            [("radius".to_string(), ParamValue::Float(3.5))].into();
        let row = Row::of(&[("area", ParamValue::Nested(nested))]);

        let cond = ConditionNode::Leaf(QueryCondition::new("area.radius", Operator::Gt, 3i64));
        assert!(evaluate(&cond, &row));
    }

    #[test]
    fn test_aggregate_count_and_avg_by_group() {
        let rows = vec![
            damage_row(100, "Fire"),
            damage_row(200, "Fire"),
            damage_row(50, "Ice"),
        ];
        let aggregates = vec![
            AggregateClause::new(AggregateFunc::Count, None),
            AggregateClause::new(AggregateFunc::Avg, Some("baseDamage")),
        ];
        let group_by = GroupByClause {
            fields: vec!["damageType".to_string()],
        };

        let result = aggregate(&rows, &aggregates, Some(&group_by));
        assert_eq!(result.len(), 2);

        // BTreeMap ordering: Fire before Ice
        let fire = &result[0];
        assert_eq!(fire.group["damageType"], ParamValue::Str("Fire".into()));
        assert_eq!(fire.values["count"], ParamValue::Int(2));
        assert_eq!(fire.values["avg_baseDamage"], ParamValue::Float(150.0));

        let ice = &result[1];
        assert_eq!(ice.group["damageType"], ParamValue::Str("Ice".into()));
        assert_eq!(ice.values["count"], ParamValue::Int(1));
        assert_eq!(ice.values["avg_baseDamage"], ParamValue::Float(50.0));
    }

    #[test]
    fn test_aggregate_excludes_non_numeric_values() {
        let rows = vec![
            Row::of(&[("v", ParamValue::Int(10))]),
            Row::of(&[("v", ParamValue::Str("oops".into()))]),
            Row::of(&[("other", ParamValue::Int(1))]),
        ];
        let aggregates = vec![
            AggregateClause::new(AggregateFunc::Sum, Some("v")),
            AggregateClause::new(AggregateFunc::Count, Some("v")),
        ];

        let result = aggregate(&rows, &aggregates, None);
        assert_eq!(result.len(), 1);
        // Only the coercible 10 participates in SUM; it is not zero-filled
        assert_eq!(result[0].values["sum_v"], ParamValue::Float(10.0));
        // COUNT(v) counts non-null resolutions: 10 and "oops"
        assert_eq!(result[0].values["count_v"], ParamValue::Int(2));
    }

    #[test]
    fn test_aggregate_without_group_or_clauses() {
        let rows = vec![damage_row(1, "A"), damage_row(2, "B")];
        let result = aggregate(&rows, &[], None);
        assert_eq!(result.len(), 1);
        assert!(result[0].group.is_empty());
        assert_eq!(result[0].values["count"], ParamValue::Int(2));
    }

    #[test]
    fn test_aggregate_min_max() {
        let rows = vec![damage_row(5, "A"), damage_row(15, "A"), damage_row(10, "A")];
        let aggregates = vec![
            AggregateClause::new(AggregateFunc::Min, Some("baseDamage")),
            AggregateClause::new(AggregateFunc::Max, Some("baseDamage")),
        ];
        let result = aggregate(&rows, &aggregates, None);
        assert_eq!(result[0].values["min_baseDamage"], ParamValue::Float(5.0));
        assert_eq!(result[0].values["max_baseDamage"], ParamValue::Float(15.0));
    }

    #[test]
    fn test_having_reuses_evaluator_on_rows() {
        let rows = vec![
            damage_row(100, "Fire"),
            damage_row(200, "Fire"),
            damage_row(50, "Ice"),
        ];
        let aggregates = vec![AggregateClause::new(AggregateFunc::Count, None)];
        let group_by = GroupByClause {
            fields: vec!["damageType".to_string()],
        };
        let having = ConditionNode::Leaf(QueryCondition::new("count", Operator::Gt, 1i64));

        let result: Vec<AggregateRow> = aggregate(&rows, &aggregates, Some(&group_by))
            .into_iter()
            .filter(|row| evaluate(&having, row))
            .collect();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].group["damageType"], ParamValue::Str("Fire".into()));
    }
}
