//! Query Parser
//!
//! Parses query strings into [`QueryExpression`]. Two surface grammars share
//! one AST:
//!
//! ```text
//! simple:    [ActionType] [where <cond> [and <cond>]*]
//!            <cond> [and <cond>]*              (bare condition list)
//!
//! extended:  SELECT <field | AGG(field) [AS alias]>, ...
//!            FROM <ActionType>
//!            [WHERE <bool-expr>]
//!            [GROUP BY <field, ...>]
//!            [HAVING <bool-expr>]
//!            [ORDER BY <field> [DESC], ...]
//!            [LIMIT n [OFFSET m]]
//! ```
//!
//! Input starting with `SELECT` takes the extended grammar; anything else the
//! simple one. The simple grammar joins leaves with `and` only — `or` and
//! parenthesized nesting degrade (with a warning) instead of mis-evaluating.
//!
//! `parse` never fails: unparseable text yields an expression whose
//! `is_empty()` is true and whose `parse_warning` says why. Callers check
//! emptiness instead of catching errors.
//!
//! Leaf conditions match `between`/`contains`/`like`/`in` **before** generic
//! operator scanning: a value token may itself contain `<`/`>`/`=`
//! characters, so scanning operators first would misparse.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, recognize, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult,
};

use crate::document::ParamValue;
use crate::query::ast::{
    AggregateClause, AggregateFunc, ConditionNode, GroupByClause, Operator, OrderByClause,
    QueryCondition, QueryExpression,
};

/// Parse a query string; never fails
pub fn parse(input: &str) -> QueryExpression {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return QueryExpression::match_all();
    }
    if starts_with_keyword(trimmed, "select") {
        parse_extended(trimmed)
    } else {
        parse_simple(trimmed)
    }
}

fn starts_with_keyword(input: &str, keyword: &str) -> bool {
    let head: String = input
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    head.eq_ignore_ascii_case(keyword)
}

// ---------------------------------------------------------------------------
// Simple grammar
// ---------------------------------------------------------------------------

/// Parse the simple grammar (`[ActionType] [where conds]` or a bare
/// condition list); degrades instead of failing
pub fn parse_simple(input: &str) -> QueryExpression {
    let input = input.trim();

    match parse_simple_forms(input) {
        Ok((remaining, expr)) if remaining.trim().is_empty() => expr,
        _ => {
            if contains_bare_word(input, "or") {
                QueryExpression::degraded(
                    "simple queries join conditions with 'and' only; use the SELECT form for 'or'",
                )
            } else {
                QueryExpression::degraded(format!("unparseable query: '{}'", input))
            }
        }
    }
}

fn parse_simple_forms(input: &str) -> IResult<&str, QueryExpression> {
    alt((
        parse_where_only,
        parse_type_where,
        parse_conditions_only,
        parse_type_only,
    ))(input)
}

/// `where <cond> [and <cond>]*` with the action type omitted
fn parse_where_only(input: &str) -> IResult<&str, QueryExpression> {
    let (input, _) = tag_no_case("where")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, condition) = parse_and_leaf_list(input)?;
    Ok((input, QueryExpression::match_all().with_condition(condition)))
}

/// `<ActionType> where <cond> [and <cond>]*`
fn parse_type_where(input: &str) -> IResult<&str, QueryExpression> {
    let (input, action_type) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("where")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, condition) = parse_and_leaf_list(input)?;
    Ok((
        input,
        QueryExpression::match_all()
            .with_action_type(action_type)
            .with_condition(condition),
    ))
}

/// A bare condition list with no type and no `where`
fn parse_conditions_only(input: &str) -> IResult<&str, QueryExpression> {
    let (input, condition) = parse_and_leaf_list(input)?;
    Ok((input, QueryExpression::match_all().with_condition(condition)))
}

/// A lone action type
fn parse_type_only(input: &str) -> IResult<&str, QueryExpression> {
    let (input, action_type) = parse_identifier(input)?;
    Ok((
        input,
        QueryExpression::match_all().with_action_type(action_type),
    ))
}

/// `<leaf> (and <leaf>)*` — the only combination the simple grammar allows
fn parse_and_leaf_list(input: &str) -> IResult<&str, ConditionNode> {
    map(
        separated_list1(
            delimited(multispace1, tag_no_case("and"), multispace1),
            parse_leaf,
        ),
        ConditionNode::all,
    )(input)
}

/// Whole-word, case-insensitive search outside of quotes
fn contains_bare_word(input: &str, word: &str) -> bool {
    let lower = input.to_lowercase();
    let mut rest = lower.as_str();
    while let Some(pos) = rest.find(word) {
        let before_ok = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        let after_ok = rest[pos + word.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        let quoted = rest[..pos].matches(['\'', '"']).count() % 2 == 1;
        if before_ok && after_ok && !quoted {
            return true;
        }
        rest = &rest[pos + word.len()..];
    }
    false
}

// ---------------------------------------------------------------------------
// Extended grammar
// ---------------------------------------------------------------------------

/// Parse the extended `SELECT ... FROM ...` grammar; degrades instead of
/// failing
pub fn parse_extended(input: &str) -> QueryExpression {
    match parse_select_query(input.trim()) {
        Ok((remaining, expr)) if remaining.trim().is_empty() => expr,
        Ok((remaining, _)) => QueryExpression::degraded(format!(
            "unexpected input after query: '{}'",
            remaining.trim()
        )),
        Err(e) => QueryExpression::degraded(format!("parse error: {:?}", e)),
    }
}

fn parse_select_query(input: &str) -> IResult<&str, QueryExpression> {
    let (input, _) = tag_no_case("select")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, items) = parse_select_items(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("from")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, action_type) = parse_from_target(input)?;
    let (input, _) = multispace0(input)?;
    let (input, condition) = opt(parse_where_clause)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, group_by) = opt(parse_group_by_clause)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, having) = opt(parse_having_clause)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, order_by) = opt(parse_order_by_clause)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, limit_offset) = opt(parse_limit_clause)(input)?;
    let (input, _) = multispace0(input)?;

    let (select_fields, aggregates) = split_select_items(items);
    let (limit, offset) = limit_offset.unwrap_or((None, 0));

    Ok((
        input,
        QueryExpression {
            action_type,
            track_name: None,
            condition,
            select_fields,
            aggregates,
            group_by,
            having,
            order_by: order_by.unwrap_or_default(),
            limit,
            offset,
            parse_warning: None,
        },
    ))
}

enum SelectItem {
    /// Plain field (or `*`)
    Field(String),
    /// Aggregate call
    Aggregate(AggregateClause),
}

fn split_select_items(items: Vec<SelectItem>) -> (Vec<String>, Vec<AggregateClause>) {
    let mut fields = Vec::new();
    let mut aggregates = Vec::new();
    for item in items {
        match item {
            // `*` selects every field, which is the default
            SelectItem::Field(f) if f == "*" => {}
            SelectItem::Field(f) => fields.push(f),
            SelectItem::Aggregate(a) => aggregates.push(a),
        }
    }
    (fields, aggregates)
}

fn parse_select_items(input: &str) -> IResult<&str, Vec<SelectItem>> {
    separated_list1(
        delimited(multispace0, char(','), multispace0),
        parse_select_item,
    )(input)
}

fn parse_select_item(input: &str) -> IResult<&str, SelectItem> {
    alt((
        map(parse_aggregate_item, SelectItem::Aggregate),
        map(parse_identifier, |f| SelectItem::Field(f.to_string())),
        map(tag("*"), |_| SelectItem::Field("*".to_string())),
    ))(input)
}

/// `AGG(field)` or `COUNT(*)`, with an optional `AS alias`
fn parse_aggregate_item(input: &str) -> IResult<&str, AggregateClause> {
    let (input, func) = map_res(parse_identifier, |name| {
        AggregateFunc::from_name(name).ok_or("not an aggregate")
    })(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, field) = alt((
        map(tag("*"), |_| None),
        map(parse_identifier, |f| Some(f.to_string())),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(')')(input)?;
    let (input, alias) = opt(parse_alias)(input)?;

    Ok((input, AggregateClause { func, field, alias }))
}

fn parse_alias(input: &str) -> IResult<&str, String> {
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("as")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, alias) = parse_identifier(input)?;
    Ok((input, alias.to_string()))
}

/// `FROM *` clears the type filter; anything else names one action type
fn parse_from_target(input: &str) -> IResult<&str, Option<String>> {
    alt((
        map(tag("*"), |_| None),
        map(parse_identifier, |t| Some(t.to_string())),
    ))(input)
}

fn parse_where_clause(input: &str) -> IResult<&str, ConditionNode> {
    let (input, _) = tag_no_case("where")(input)?;
    let (input, _) = multispace1(input)?;
    parse_bool_expr(input)
}

fn parse_group_by_clause(input: &str) -> IResult<&str, GroupByClause> {
    let (input, _) = tag_no_case("group")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("by")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, fields) = separated_list1(
        delimited(multispace0, char(','), multispace0),
        map(parse_identifier, str::to_string),
    )(input)?;
    Ok((input, GroupByClause { fields }))
}

fn parse_having_clause(input: &str) -> IResult<&str, ConditionNode> {
    let (input, _) = tag_no_case("having")(input)?;
    let (input, _) = multispace1(input)?;
    parse_bool_expr(input)
}

fn parse_order_by_clause(input: &str) -> IResult<&str, Vec<OrderByClause>> {
    let (input, _) = tag_no_case("order")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("by")(input)?;
    let (input, _) = multispace1(input)?;
    separated_list1(
        delimited(multispace0, char(','), multispace0),
        parse_order_by_entry,
    )(input)
}

fn parse_order_by_entry(input: &str) -> IResult<&str, OrderByClause> {
    let (input, field) = parse_identifier(input)?;
    let (input, direction) = opt(preceded(
        multispace1,
        alt((
            value(true, tag_no_case("desc")),
            value(false, tag_no_case("asc")),
        )),
    ))(input)?;
    Ok((
        input,
        OrderByClause {
            field: field.to_string(),
            descending: direction.unwrap_or(false),
        },
    ))
}

fn parse_limit_clause(input: &str) -> IResult<&str, (Option<usize>, usize)> {
    let (input, _) = tag_no_case("limit")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, limit) = map_res(digit1, str::parse::<usize>)(input)?;
    let (input, offset) = opt(preceded(
        multispace1,
        preceded(
            pair(tag_no_case("offset"), multispace1),
            map_res(digit1, str::parse::<usize>),
        ),
    ))(input)?;
    Ok((input, (Some(limit), offset.unwrap_or(0))))
}

// ---------------------------------------------------------------------------
// Boolean expressions (extended grammar)
// ---------------------------------------------------------------------------

/// `or` level — binds weaker than `and`
fn parse_bool_expr(input: &str) -> IResult<&str, ConditionNode> {
    map(
        separated_list1(
            delimited(multispace1, tag_no_case("or"), multispace1),
            parse_and_expr,
        ),
        ConditionNode::any,
    )(input)
}

/// `and` level
fn parse_and_expr(input: &str) -> IResult<&str, ConditionNode> {
    map(
        separated_list1(
            delimited(multispace1, tag_no_case("and"), multispace1),
            parse_not_expr,
        ),
        ConditionNode::all,
    )(input)
}

/// `not` level
fn parse_not_expr(input: &str) -> IResult<&str, ConditionNode> {
    alt((
        map(
            preceded(pair(tag_no_case("not"), multispace1), parse_not_expr),
            ConditionNode::negate,
        ),
        parse_primary,
    ))(input)
}

/// Parenthesized sub-expression or a leaf
fn parse_primary(input: &str) -> IResult<&str, ConditionNode> {
    alt((
        delimited(
            pair(char('('), multispace0),
            parse_bool_expr,
            pair(multispace0, char(')')),
        ),
        parse_leaf,
    ))(input)
}

// ---------------------------------------------------------------------------
// Leaf conditions
// ---------------------------------------------------------------------------

/// One leaf condition
///
/// Keyword forms come first: a value token may contain operator characters,
/// so generic operator scanning must run last.
fn parse_leaf(input: &str) -> IResult<&str, ConditionNode> {
    map(
        alt((
            parse_between_cond,
            parse_contains_cond,
            parse_in_cond,
            parse_binary_cond,
        )),
        ConditionNode::Leaf,
    )(input)
}

/// `<param> between <v1> and <v2>`
fn parse_between_cond(input: &str) -> IResult<&str, QueryCondition> {
    let (input, param) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("between")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, low) = parse_value_token(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("and")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, high) = parse_value_token(input)?;
    Ok((input, QueryCondition::between(param, low, high)))
}

/// `<param> contains <value>` / `<param> like <value>`
fn parse_contains_cond(input: &str) -> IResult<&str, QueryCondition> {
    let (input, param) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = alt((tag_no_case("contains"), tag_no_case("like")))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, value) = parse_value_token(input)?;
    Ok((input, QueryCondition::new(param, Operator::Contains, value)))
}

/// `<param> in (<v>, ...)`
fn parse_in_cond(input: &str) -> IResult<&str, QueryCondition> {
    let (input, param) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("in")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, values) = delimited(
        pair(char('('), multispace0),
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            parse_value_token,
        ),
        pair(multispace0, char(')')),
    )(input)?;
    Ok((input, QueryCondition::in_list(param, values)))
}

/// `<param> <op> <value>` for symbolic operators
fn parse_binary_cond(input: &str) -> IResult<&str, QueryCondition> {
    let (input, param) = parse_identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, op) = map_res(
        alt((
            tag(">="),
            tag("<="),
            tag("!="),
            tag("<>"),
            tag("=="),
            tag("="),
            tag(">"),
            tag("<"),
        )),
        |s: &str| Operator::from_symbol(s).ok_or("unknown operator"),
    )(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = parse_value_token(input)?;
    Ok((input, QueryCondition::new(param, op, value)))
}

// ---------------------------------------------------------------------------
// Terminals
// ---------------------------------------------------------------------------

/// Field / parameter / type identifier: letter or `_`, then letters, digits,
/// `_` or `.`
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
    ))(input)
}

/// One value literal
///
/// Quoted → string; `true`/`false` → bool; `null` → null; otherwise int,
/// then float, else the bare token as a string.
fn parse_value_token(input: &str) -> IResult<&str, ParamValue> {
    alt((parse_quoted('\''), parse_quoted('"'), parse_bare_value))(input)
}

fn parse_quoted(quote: char) -> impl Fn(&str) -> IResult<&str, ParamValue> {
    move |input| {
        let (input, _) = char(quote)(input)?;
        let (input, content) = take_while(|c| c != quote)(input)?;
        let (input, _) = char(quote)(input)?;
        Ok((input, ParamValue::Str(content.to_string())))
    }
}

fn parse_bare_value(input: &str) -> IResult<&str, ParamValue> {
    let (input, token) =
        take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')' && c != ',')(input)?;
    Ok((input, classify_bare_token(token)))
}

fn classify_bare_token(token: &str) -> ParamValue {
    match token.to_ascii_lowercase().as_str() {
        "true" => return ParamValue::Bool(true),
        "false" => return ParamValue::Bool(false),
        "null" => return ParamValue::Null,
        _ => {}
    }
    if let Ok(i) = token.parse::<i64>() {
        return ParamValue::Int(i);
    }
    if let Ok(f) = token.parse::<f64>() {
        return ParamValue::Float(f);
    }
    ParamValue::Str(token.to_string())
}
