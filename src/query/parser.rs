//! Query Parser
//!
//! Parses MQL statements into the [`Statement`] parse tree.
//!
//! # Supported Syntax
//!
//! ```text
//! statement   := stage (';' stage)* [';']
//! stage       := [name '='] (select | aggregation)
//! select      := SELECT metric [FROM time [TO time]] [WHERE tag = value (, value)* (AND ...)*]
//!                [GROUP BY tag (, tag)*]
//! aggregation := name '(' [OF (ref, ...) | OF ref] [, key = value ...] ')'
//! time        := NOW | <n> <unit> AGO | 'quoted date-time'
//! ```
//!
//! The three select clauses may appear in any order, each at most once.
//! Keywords are case-insensitive.
//!
//! # Examples
//!
//! ```text
//! select cpu from 2h ago to now where host = "h1"
//! a = select cpu where host = "h1", "h2" group by host; b = max(of a)
//! threshold(of load, threshold=5, operator=GREATER_THAN)
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{alpha1, char, digit1, multispace0, multispace1, satisfy},
    combinator::{cut, map, map_opt, map_res, not, opt, recognize, value},
    error::{context, ContextError, ErrorKind, FromExternalError, ParseError},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use std::fmt;

use crate::query::ast::*;
use crate::query::error::{SyntaxError, SyntaxProblem};
use crate::query::literal;

/// Parse a statement string into its parse tree
pub fn parse_statement(input: &str) -> Result<Statement, SyntaxError> {
    match statement(input) {
        Ok((_, statement)) => Ok(statement),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_syntax_error(input)),
        Err(nom::Err::Incomplete(_)) => Err(SyntaxError::single(1, 1, "incomplete statement")),
    }
}

// ============================================
// Error type
// ============================================

type PResult<'a, T> = IResult<&'a str, T, MqlParseError<'a>>;

/// Parser error that remembers where it happened and what was expected
#[derive(Debug, Clone, PartialEq)]
pub struct MqlParseError<'a> {
    input: &'a str,
    message: String,
    /// Set once a message has been written for this failure
    specific: bool,
}

impl<'a> MqlParseError<'a> {
    fn new(input: &'a str, message: impl Into<String>) -> Self {
        Self {
            input,
            message: message.into(),
            specific: true,
        }
    }

    fn into_syntax_error(self, source: &str) -> SyntaxError {
        let position = position_of(source, self.input);
        SyntaxError {
            problems: vec![SyntaxProblem {
                line: position.line,
                column: position.column,
                message: self.message,
            }],
        }
    }
}

impl<'a> ParseError<&'a str> for MqlParseError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        let message = match input.chars().next() {
            Some(c) => format!("unexpected '{}'", c),
            None => "unexpected end of statement".to_string(),
        };
        Self {
            input,
            message,
            specific: false,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn from_char(input: &'a str, expected: char) -> Self {
        Self {
            input,
            message: format!("expected '{}'", expected),
            specific: false,
        }
    }

    fn or(self, other: Self) -> Self {
        // Prefer whichever branch got furthest
        match other.input.len().cmp(&self.input.len()) {
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Equal if other.specific && !self.specific => other,
            std::cmp::Ordering::Equal => self,
        }
    }
}

impl<'a> ContextError<&'a str> for MqlParseError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, other: Self) -> Self {
        if other.specific {
            other
        } else {
            Self::new(input, ctx)
        }
    }
}

impl<'a, E: fmt::Display> FromExternalError<&'a str, E> for MqlParseError<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: E) -> Self {
        Self::new(input, e.to_string())
    }
}

/// 1-based line and column of `rest` within `source`
fn position_of(source: &str, rest: &str) -> Position {
    let offset = source.len().saturating_sub(rest.len());
    let consumed = &source[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.chars().rev().take_while(|c| *c != '\n').count() + 1;
    Position { line, column }
}

// ============================================
// Statement and stages
// ============================================

/// Parse stages separated by `;`, recording where each one starts
fn statement(source: &str) -> PResult<'_, Statement> {
    let mut stages = Vec::new();
    let (mut input, _) = multispace0(source)?;

    loop {
        let position = position_of(source, input);
        let (rest, (binding, kind)) = stage(input)?;
        stages.push(Stage {
            binding,
            kind,
            position,
        });

        let (rest, _) = multispace0(rest)?;
        if rest.is_empty() {
            input = rest;
            break;
        }

        let (rest, _) = context("expected ';' between stages", char(';'))(rest)?;
        let (rest, _) = multispace0(rest)?;
        input = rest;

        // Trailing ';'
        if input.is_empty() {
            break;
        }
    }

    Ok((input, Statement { stages }))
}

fn stage(input: &str) -> PResult<'_, (Option<String>, StageKind)> {
    let (input, binding) = opt(binding)(input)?;
    let (input, kind) = context(
        "expected a select or aggregation stage",
        alt((
            map(select_stage, StageKind::Select),
            map(aggregation_stage, StageKind::Aggregation),
        )),
    )(input)?;

    Ok((input, (binding, kind)))
}

/// Parse `name =` (but not `name ==`)
fn binding(input: &str) -> PResult<'_, String> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = not(char('='))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, name.to_string()))
}

// ============================================
// Select
// ============================================

fn select_stage(input: &str) -> PResult<'_, SelectStage> {
    let (input, _) = keyword("select")(input)?;
    let (input, _) = multispace0(input)?;
    let (mut input, metric) = cut(context("expected metric name", metric_name))(input)?;

    let mut select = SelectStage::new(metric);
    let mut seen_where = false;
    let mut seen_group_by = false;

    loop {
        let (clause, _) = multispace0(input)?;

        if let Ok((rest, _)) = keyword("from")(clause) {
            if select.time_range.is_some() {
                return Err(nom::Err::Failure(MqlParseError::new(
                    clause,
                    "duplicate 'from' clause",
                )));
            }
            let (rest, range) = cut(time_range)(rest)?;
            select.time_range = Some(range);
            input = rest;
        } else if let Ok((rest, _)) = keyword("where")(clause) {
            if seen_where {
                return Err(nom::Err::Failure(MqlParseError::new(
                    clause,
                    "duplicate 'where' clause",
                )));
            }
            let (rest, _) = multispace0(rest)?;
            let (rest, filters) = cut(separated_list1(
                tuple((multispace0, keyword("and"), multispace0)),
                tag_filter,
            ))(rest)?;
            select.filters = filters;
            seen_where = true;
            input = rest;
        } else if let Ok((rest, _)) = keyword("group")(clause) {
            if seen_group_by {
                return Err(nom::Err::Failure(MqlParseError::new(
                    clause,
                    "duplicate 'group by' clause",
                )));
            }
            let (rest, _) = cut(context(
                "expected 'by' after 'group'",
                preceded(multispace1, keyword("by")),
            ))(rest)?;
            let (rest, _) = multispace0(rest)?;
            let (rest, tags) = cut(context(
                "expected tag name",
                separated_list1(comma, tag_key),
            ))(rest)?;
            select.group_by = tags;
            seen_group_by = true;
            input = rest;
        } else {
            break;
        }
    }

    Ok((input, select))
}

fn time_range(input: &str) -> PResult<'_, TimeRangeExpr> {
    let (input, _) = multispace0(input)?;
    let (input, from) = time_expr(input)?;
    let (input, to) = opt(preceded(
        tuple((multispace0, keyword("to"), multispace0)),
        cut(time_expr),
    ))(input)?;

    Ok((input, TimeRangeExpr { from, to }))
}

fn time_expr(input: &str) -> PResult<'_, TimeExpr> {
    context(
        "expected a time: 'now', '<n> <unit> ago' or a quoted date-time",
        alt((
            value(TimeExpr::Now, keyword("now")),
            relative_time,
            map_res(quoted_string, |text| {
                literal::parse_absolute(&text).map(TimeExpr::Absolute)
            }),
        )),
    )(input)
}

/// `<n> <unit> ago`, number and unit may touch (`2h ago`)
fn relative_time(input: &str) -> PResult<'_, TimeExpr> {
    let (input, amount) = map_res(digit1, |digits: &str| digits.parse::<u32>())(input)?;
    let (input, _) = multispace0(input)?;
    let (input, unit) = cut(context(
        "expected a time unit",
        map_opt(alpha1, TimeUnit::parse),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("expected 'ago'", keyword("ago")))(input)?;

    Ok((input, TimeExpr::Ago { amount, unit }))
}

/// `key = value (, value)*`
fn tag_filter(input: &str) -> PResult<'_, TagFilter> {
    let (input, key) = context("expected tag name", tag_key)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("expected '=' after tag name", char('=')))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, values) = cut(context(
        "expected tag value",
        separated_list1(comma, tag_value),
    ))(input)?;

    Ok((input, TagFilter { key, values }))
}

fn tag_key(input: &str) -> PResult<'_, String> {
    alt((quoted_string, map(dotted_name, String::from)))(input)
}

fn tag_value(input: &str) -> PResult<'_, String> {
    alt((
        quoted_string,
        map(
            take_while1(|c: char| c.is_ascii_alphanumeric() || "_.:/*-".contains(c)),
            String::from,
        ),
    ))(input)
}

fn metric_name(input: &str) -> PResult<'_, String> {
    alt((quoted_string, map(dotted_name, String::from)))(input)
}

// ============================================
// Aggregation
// ============================================

fn aggregation_stage(input: &str) -> PResult<'_, AggregationStage> {
    let (input, name) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, sources) = opt(sources)(input)?;

    let (input, arguments) = if sources.is_some() {
        many0(preceded(
            comma,
            cut(context("expected 'key=value' argument", argument)),
        ))(input)?
    } else {
        separated_list0(comma, argument)(input)?
    };

    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("expected ')' to close the aggregation", char(')')))(input)?;

    Ok((
        input,
        AggregationStage {
            name: name.to_lowercase(),
            sources,
            arguments,
        },
    ))
}

/// `of ref` or `of (ref, ref, ...)`
fn sources(input: &str) -> PResult<'_, Vec<String>> {
    let (input, _) = keyword("of")(input)?;
    let (input, _) = multispace0(input)?;
    cut(context(
        "expected a stage name or '(' after 'of'",
        alt((
            delimited(
                pair(char('('), multispace0),
                separated_list1(comma, reference),
                pair(multispace0, char(')')),
            ),
            map(reference, |name| vec![name]),
        )),
    ))(input)
}

fn reference(input: &str) -> PResult<'_, String> {
    map(identifier, String::from)(input)
}

fn argument(input: &str) -> PResult<'_, Argument> {
    let (input, key) = identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("expected '=' after argument name", char('=')))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, value) = cut(context(
        "expected a number, string, boolean or identifier",
        arg_value,
    ))(input)?;

    Ok((
        input,
        Argument {
            key: key.to_string(),
            value,
        },
    ))
}

fn arg_value(input: &str) -> PResult<'_, ArgValue> {
    alt((
        map(number, ArgValue::Number),
        map(quoted_string, ArgValue::String),
        value(ArgValue::Bool(true), keyword("true")),
        value(ArgValue::Bool(false), keyword("false")),
        map(identifier, |s| ArgValue::Identifier(s.to_string())),
    ))(input)
}

// ============================================
// Lexical helpers
// ============================================

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that is not the prefix of a longer word
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag_no_case(word), not(satisfy(is_word_char)))
}

fn comma(input: &str) -> PResult<'_, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_word_char),
    ))(input)
}

/// `[A-Za-z_][A-Za-z0-9_./:-]*`
fn dotted_name(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| is_word_char(c) || ".:/-".contains(c)),
    ))(input)
}

/// Single or double quoted string with backslash escapes
fn quoted_string(input: &str) -> PResult<'_, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c)) if c == '"' || c == '\'' => c,
        _ => return Err(nom::Err::Error(MqlParseError::from_char(input, '"'))),
    };

    let mut escaped = false;
    for (index, c) in chars {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            let raw = &input[1..index];
            let rest = &input[index + c.len_utf8()..];
            return match literal::unescape(raw) {
                Ok(text) => Ok((rest, text)),
                Err(e) => Err(nom::Err::Failure(MqlParseError::from_external_error(
                    input,
                    ErrorKind::MapRes,
                    e,
                ))),
            };
        }
    }

    Err(nom::Err::Failure(MqlParseError::new(
        input,
        "unterminated string literal",
    )))
}

/// Parse floating point number
fn number(input: &str) -> PResult<'_, f64> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((
                alt((char('e'), char('E'))),
                opt(alt((char('+'), char('-')))),
                digit1,
            ))),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select_of(stage: &Stage) -> &SelectStage {
        match &stage.kind {
            StageKind::Select(select) => select,
            other => panic!("expected select, got {:?}", other),
        }
    }

    fn aggregation_of(stage: &Stage) -> &AggregationStage {
        match &stage.kind {
            StageKind::Aggregation(aggregation) => aggregation,
            other => panic!("expected aggregation, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let statement = parse_statement("select cpu").unwrap();
        assert_eq!(statement.stages.len(), 1);

        let stage = &statement.stages[0];
        assert_eq!(stage.binding, None);
        assert_eq!(stage.position, Position { line: 1, column: 1 });
        assert_eq!(select_of(stage), &SelectStage::new("cpu"));
    }

    #[test]
    fn test_parse_bound_select_and_aggregation() {
        let input = r#"a = select cpu where host="h1" from 2h ago to now; b = max(of a)"#;
        let statement = parse_statement(input).unwrap();
        assert_eq!(statement.stages.len(), 2);

        let first = &statement.stages[0];
        assert_eq!(first.binding.as_deref(), Some("a"));
        let select = select_of(first);
        assert_eq!(select.metric, "cpu");
        assert_eq!(
            select.filters,
            vec![TagFilter {
                key: "host".to_string(),
                values: vec!["h1".to_string()],
            }]
        );
        assert_eq!(
            select.time_range,
            Some(TimeRangeExpr {
                from: TimeExpr::Ago {
                    amount: 2,
                    unit: TimeUnit::Hour,
                },
                to: Some(TimeExpr::Now),
            })
        );

        let second = &statement.stages[1];
        assert_eq!(second.binding.as_deref(), Some("b"));
        assert_eq!(
            second.position,
            Position {
                line: 1,
                column: input.find("b =").unwrap() + 1,
            }
        );
        let aggregation = aggregation_of(second);
        assert_eq!(aggregation.name, "max");
        assert_eq!(aggregation.sources, Some(vec!["a".to_string()]));
        assert!(aggregation.arguments.is_empty());
    }

    #[test]
    fn test_parse_clauses_in_any_order() {
        let statement = parse_statement(
            r#"select cpu group by host, zone from 1 day ago where dc = "a", 'b' and env = prod"#,
        )
        .unwrap();

        let select = select_of(&statement.stages[0]);
        assert_eq!(select.group_by, vec!["host", "zone"]);
        assert_eq!(
            select.time_range,
            Some(TimeRangeExpr {
                from: TimeExpr::Ago {
                    amount: 1,
                    unit: TimeUnit::Day,
                },
                to: None,
            })
        );
        assert_eq!(select.filters.len(), 2);
        assert_eq!(select.filters[0].key, "dc");
        assert_eq!(select.filters[0].values, vec!["a", "b"]);
        assert_eq!(select.filters[1].key, "env");
        assert_eq!(select.filters[1].values, vec!["prod"]);
    }

    #[test]
    fn test_parse_duplicate_clause_rejected() {
        let err = parse_statement("select cpu from 1h ago from 2h ago").unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].message.contains("duplicate 'from'"));
        assert_eq!(err.problems[0].column, 24);
    }

    #[test]
    fn test_parse_case_insensitive() {
        let statement =
            parse_statement("A = SELECT cpu FROM 3 Hours Ago TO NOW WHERE host = x; MAX(OF A)")
                .unwrap();

        let select = select_of(&statement.stages[0]);
        assert_eq!(
            select.time_range.as_ref().unwrap().from,
            TimeExpr::Ago {
                amount: 3,
                unit: TimeUnit::Hour,
            }
        );
        let aggregation = aggregation_of(&statement.stages[1]);
        assert_eq!(aggregation.name, "max");
        assert_eq!(aggregation.sources, Some(vec!["A".to_string()]));
    }

    #[test]
    fn test_parse_threshold_arguments() {
        let statement = parse_statement(
            "sel = select load; threshold(of sel, threshold=5, operator=GREATER_THAN)",
        )
        .unwrap();

        let aggregation = aggregation_of(&statement.stages[1]);
        assert_eq!(aggregation.name, "threshold");
        assert_eq!(
            aggregation.arguments,
            vec![
                Argument {
                    key: "threshold".to_string(),
                    value: ArgValue::Number(5.0),
                },
                Argument {
                    key: "operator".to_string(),
                    value: ArgValue::Identifier("GREATER_THAN".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_argument_values() {
        let statement = parse_statement(
            r#"select cpu; percentile(percentile=0.95, align_sampling=false, sampling_unit="hours", x=-1.5e2, y=TRUE)"#,
        )
        .unwrap();

        let aggregation = aggregation_of(&statement.stages[1]);
        assert_eq!(aggregation.sources, None);
        let values: Vec<&ArgValue> = aggregation.arguments.iter().map(|a| &a.value).collect();
        assert_eq!(
            values,
            vec![
                &ArgValue::Number(0.95),
                &ArgValue::Bool(false),
                &ArgValue::String("hours".to_string()),
                &ArgValue::Number(-150.0),
                &ArgValue::Bool(true),
            ]
        );
    }

    #[test]
    fn test_parse_union_sources() {
        let statement =
            parse_statement("cpu = select cpu; mem = select mem; union(of (cpu, mem))").unwrap();
        let aggregation = aggregation_of(&statement.stages[2]);
        assert_eq!(aggregation.name, "union");
        assert_eq!(
            aggregation.sources,
            Some(vec!["cpu".to_string(), "mem".to_string()])
        );

        let statement = parse_statement("select cpu; max()").unwrap();
        let aggregation = aggregation_of(&statement.stages[1]);
        assert_eq!(aggregation.sources, None);
        assert!(aggregation.arguments.is_empty());
    }

    #[test]
    fn test_parse_absolute_times() {
        let statement =
            parse_statement(r#"select cpu from "2024-01-15 00:00:00" to '2024-01-16'"#).unwrap();
        let range = select_of(&statement.stages[0]).time_range.clone().unwrap();

        assert_eq!(
            range.from,
            TimeExpr::Absolute(literal::parse_absolute("2024-01-15T00:00:00Z").unwrap())
        );
        assert_eq!(
            range.to,
            Some(TimeExpr::Absolute(
                literal::parse_absolute("2024-01-16T00:00:00Z").unwrap()
            ))
        );
    }

    #[test]
    fn test_parse_invalid_absolute_time() {
        let err = parse_statement(r#"select cpu from "last tuesday""#).unwrap_err();
        assert!(err.problems[0].message.contains("invalid date-time"));
    }

    #[test]
    fn test_parse_relative_units() {
        let from = |text: &str| {
            let statement = parse_statement(&format!("select cpu from {}", text)).unwrap();
            select_of(&statement.stages[0])
                .time_range
                .as_ref()
                .unwrap()
                .from
        };

        assert_eq!(
            from("1 mo ago"),
            TimeExpr::Ago {
                amount: 1,
                unit: TimeUnit::Month,
            }
        );
        assert_eq!(
            from("2months ago"),
            TimeExpr::Ago {
                amount: 2,
                unit: TimeUnit::Month,
            }
        );
        assert_eq!(
            from("30 s ago"),
            TimeExpr::Ago {
                amount: 30,
                unit: TimeUnit::Second,
            }
        );
        assert_eq!(from("now"), TimeExpr::Now);
    }

    #[test]
    fn test_parse_unknown_time_unit() {
        let err = parse_statement("select cpu from 2 fortnights ago").unwrap_err();
        assert_eq!(err.problems[0].message, "expected a time unit");
        assert_eq!(err.problems[0].column, 19);
    }

    #[test]
    fn test_parse_string_escapes() {
        let statement = parse_statement(r#"select "cpu load" where host = "a\"b", 'c\'d\n'"#).unwrap();
        let select = select_of(&statement.stages[0]);
        assert_eq!(select.metric, "cpu load");
        assert_eq!(select.filters[0].values, vec!["a\"b", "c'd\n"]);
    }

    #[test]
    fn test_parse_bad_escape_is_syntax_error() {
        let input = r#"select cpu where host = "bad\q""#;
        let err = parse_statement(input).unwrap_err();

        assert_eq!(err.problems.len(), 1);
        let problem = &err.problems[0];
        assert_eq!(problem.line, 1);
        assert_eq!(problem.column, input.find('"').unwrap() + 1);
        assert!(problem.message.contains("invalid escape"));
    }

    #[test]
    fn test_parse_unterminated_string() {
        let err = parse_statement(r#"select cpu where host = "h1"#).unwrap_err();
        assert_eq!(err.problems[0].message, "unterminated string literal");
    }

    #[test]
    fn test_parse_positions_across_lines() {
        let statement = parse_statement("a = select cpu;\n  max(of a);\n").unwrap();
        assert_eq!(statement.stages.len(), 2);
        assert_eq!(statement.stages[1].position, Position { line: 2, column: 3 });
    }

    #[test]
    fn test_parse_error_reports_line_and_column() {
        let err = parse_statement("select cpu;\nselect").unwrap_err();
        assert_eq!(
            err.problems[0],
            SyntaxProblem {
                line: 2,
                column: 7,
                message: "expected metric name".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_missing_separator() {
        let err = parse_statement("select cpu select mem").unwrap_err();
        assert_eq!(err.problems[0].message, "expected ';' between stages");
        assert_eq!(err.problems[0].column, 12);
    }

    #[test]
    fn test_parse_error_invalid_statement() {
        assert!(parse_statement("").is_err());
        assert!(parse_statement("INVALID mood").is_err());
        assert!(parse_statement("select cpu;;").is_err());
        assert!(parse_statement("max(of a").is_err());
        assert!(parse_statement("threshold(of a, threshold=)").is_err());
    }

    #[test]
    fn test_parse_trailing_semicolon() {
        let statement = parse_statement("select cpu; select mem;").unwrap();
        assert_eq!(statement.stages.len(), 2);
    }

    #[test]
    fn test_parse_dotted_metric_name() {
        let statement = parse_statement("select kairosdb.jvm.free_memory").unwrap();
        assert_eq!(
            select_of(&statement.stages[0]).metric,
            "kairosdb.jvm.free_memory"
        );
    }
}
