//! Aggregator registry
//!
//! Maps aggregation stage names to typed argument decoders. Two families:
//!
//! - **liftable** aggregators (`min`, `max`, `merge`, `percentile`, `count`,
//!   `avg`, `sum`) are computed by the backend; the compiler pushes them into
//!   the underlying select's metric as an [`Aggregator`]
//! - **registered** aggregators (`union`, `threshold` by default) become
//!   their own execution node
//!
//! Every decoder reads through [`Arguments`], which collects all problems
//! before failing and turns unread keys into warnings.

use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::kairos::{Aggregator, Sampling, SamplingUnit};
use crate::query::ast::{ArgValue, Argument};
use crate::query::error::{ArgumentProblem, CompileError};
use crate::query::execution::{ExecutionKind, NonNumericPolicy, ThresholdAlert, ThresholdOperator};

/// Aggregators the backend computes itself
pub const LIFTABLE_AGGREGATORS: [&str; 7] = ["min", "max", "merge", "percentile", "count", "avg", "sum"];

/// Whether `name` is computed by the backend
pub fn is_liftable(name: &str) -> bool {
    LIFTABLE_AGGREGATORS.contains(&name)
}

/// A decoded value plus the warnings produced while decoding it
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

/// Decoder for a registered aggregator
pub type DecodeFn = fn(&mut Arguments<'_>) -> Option<ExecutionKind>;

/// Name → decoder lookup for aggregators that become their own node
#[derive(Clone)]
pub struct AggregatorRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl AggregatorRegistry {
    /// Registry with no aggregators
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, decoder: DecodeFn) {
        self.decoders.insert(name.into().to_lowercase(), decoder);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode the arguments of registered aggregator `name`.
    ///
    /// Returns `None` when `name` is not registered.
    pub fn decode(
        &self,
        name: &str,
        arguments: &[Argument],
    ) -> Option<Result<Decoded<ExecutionKind>, CompileError>> {
        let decoder = self.decoders.get(name)?;
        Some(decode_arguments(name, arguments, |args| decoder(args)))
    }
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("union", decode_union);
        registry.register("threshold", decode_threshold);
        registry
    }
}

impl std::fmt::Debug for AggregatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorRegistry")
            .field("aggregators", &self.names())
            .finish()
    }
}

fn decode_union(_args: &mut Arguments<'_>) -> Option<ExecutionKind> {
    Some(ExecutionKind::Union)
}

fn decode_threshold(args: &mut Arguments<'_>) -> Option<ExecutionKind> {
    let threshold = args.required_number("threshold");
    let operator = args.required_enum(
        "operator",
        ThresholdOperator::parse,
        &ThresholdOperator::ALL.map(|op| op.as_str()),
    );
    let non_numeric = args
        .optional_enum("non_numeric", NonNumericPolicy::parse, &["skip", "fail"])
        .map(Option::unwrap_or_default);

    Some(ExecutionKind::Threshold(ThresholdAlert {
        threshold: threshold?,
        operator: operator?,
        non_numeric: non_numeric?,
    }))
}

/// Decode the arguments of liftable aggregator `name` into the backend
/// aggregator appended to the select's metric.
pub fn decode_lifted(name: &str, arguments: &[Argument]) -> Result<Decoded<Aggregator>, CompileError> {
    decode_arguments(name, arguments, |args| {
        let align_sampling = args
            .optional_bool("align_sampling")
            .map(|given| given.unwrap_or(true));
        let unit = args
            .optional_enum(
                "sampling_unit",
                SamplingUnit::parse,
                &[
                    "milliseconds",
                    "seconds",
                    "minutes",
                    "hours",
                    "days",
                    "weeks",
                    "months",
                    "years",
                ],
            )
            .map(|given| given.unwrap_or(SamplingUnit::Minutes));
        let value = args
            .optional_positive_integer("sampling_value")
            .map(|given| given.unwrap_or(NonZeroU32::MIN));
        let percentile = if name == "percentile" {
            args.required_fraction("percentile").map(Some)
        } else {
            Some(None)
        };

        Some(Aggregator {
            name: name.to_string(),
            align_sampling: align_sampling?,
            sampling: Sampling::new(unit?, value?),
            percentile: percentile?,
        })
    })
}

fn decode_arguments<T>(
    aggregator: &str,
    arguments: &[Argument],
    decode: impl FnOnce(&mut Arguments<'_>) -> Option<T>,
) -> Result<Decoded<T>, CompileError> {
    let mut args = Arguments::new(arguments);
    let value = decode(&mut args);
    args.finish(aggregator, value)
}

/// Reader over the `key=value` arguments of one stage.
///
/// Getters return `None` when the field is missing or invalid (recording a
/// problem) and for optional fields `Some(None)` means "not given". Keys
/// never read are reported as warnings once decoding finishes.
pub struct Arguments<'a> {
    arguments: &'a [Argument],
    read: Vec<bool>,
    problems: Vec<ArgumentProblem>,
}

impl<'a> Arguments<'a> {
    fn new(arguments: &'a [Argument]) -> Self {
        let mut problems: Vec<ArgumentProblem> = Vec::new();
        for (index, argument) in arguments.iter().enumerate() {
            let repeated = arguments[..index]
                .iter()
                .any(|earlier| earlier.key.eq_ignore_ascii_case(&argument.key));
            let already_reported = problems.iter().any(|p| {
                matches!(p, ArgumentProblem::Duplicate { field } if field.eq_ignore_ascii_case(&argument.key))
            });
            if repeated && !already_reported {
                problems.push(ArgumentProblem::Duplicate {
                    field: argument.key.clone(),
                });
            }
        }

        Self {
            arguments,
            read: vec![false; arguments.len()],
            problems,
        }
    }

    fn take(&mut self, field: &'static str) -> Option<&'a ArgValue> {
        let index = self
            .arguments
            .iter()
            .position(|a| a.key.eq_ignore_ascii_case(field))?;
        // Duplicates are already a problem; mark every copy read
        for (i, argument) in self.arguments.iter().enumerate() {
            if argument.key.eq_ignore_ascii_case(field) {
                self.read[i] = true;
            }
        }
        Some(&self.arguments[index].value)
    }

    fn wrong_type(&mut self, field: &'static str, expected: &'static str, found: &ArgValue) {
        self.problems.push(ArgumentProblem::WrongType {
            field,
            expected,
            found: found.type_name(),
        });
    }

    fn invalid(&mut self, field: &'static str, message: String) {
        self.problems.push(ArgumentProblem::InvalidValue { field, message });
    }

    fn missing(&mut self, field: &'static str) {
        self.problems.push(ArgumentProblem::Missing { field });
    }

    pub fn optional_number(&mut self, field: &'static str) -> Option<Option<f64>> {
        match self.take(field) {
            None => Some(None),
            Some(ArgValue::Number(n)) => Some(Some(*n)),
            Some(other) => {
                self.wrong_type(field, "number", other);
                None
            }
        }
    }

    pub fn required_number(&mut self, field: &'static str) -> Option<f64> {
        let value = self.optional_number(field)?;
        if value.is_none() {
            self.missing(field);
        }
        value
    }

    pub fn optional_bool(&mut self, field: &'static str) -> Option<Option<bool>> {
        match self.take(field) {
            None => Some(None),
            Some(ArgValue::Bool(b)) => Some(Some(*b)),
            Some(other) => {
                self.wrong_type(field, "boolean", other);
                None
            }
        }
    }

    /// A string or identifier naming one of `choices`
    pub fn optional_enum<T>(
        &mut self,
        field: &'static str,
        parse: impl Fn(&str) -> Option<T>,
        choices: &[&str],
    ) -> Option<Option<T>> {
        match self.take(field) {
            None => Some(None),
            Some(value) => match value.as_text() {
                Some(text) => match parse(text) {
                    Some(parsed) => Some(Some(parsed)),
                    None => {
                        self.invalid(
                            field,
                            format!("has unknown value '{}', expected one of {}", text, choices.join(", ")),
                        );
                        None
                    }
                },
                None => {
                    self.wrong_type(field, "string or identifier", value);
                    None
                }
            },
        }
    }

    pub fn required_enum<T>(
        &mut self,
        field: &'static str,
        parse: impl Fn(&str) -> Option<T>,
        choices: &[&str],
    ) -> Option<T> {
        let value = self.optional_enum(field, parse, choices)?;
        if value.is_none() {
            self.missing(field);
        }
        value
    }

    pub fn optional_positive_integer(&mut self, field: &'static str) -> Option<Option<NonZeroU32>> {
        let value = self.optional_number(field)?;
        match value {
            None => Some(None),
            Some(n) if n.fract() == 0.0 && n >= 1.0 && n <= f64::from(u32::MAX) => {
                Some(NonZeroU32::new(n as u32))
            }
            Some(n) => {
                self.invalid(field, format!("must be a positive integer, got {}", n));
                None
            }
        }
    }

    /// A number in `(0, 1]`
    pub fn required_fraction(&mut self, field: &'static str) -> Option<f64> {
        let value = self.required_number(field)?;
        if value > 0.0 && value <= 1.0 {
            Some(value)
        } else {
            self.invalid(field, format!("must be in (0, 1], got {}", value));
            None
        }
    }

    fn finish<T>(self, aggregator: &str, value: Option<T>) -> Result<Decoded<T>, CompileError> {
        match value {
            Some(value) if self.problems.is_empty() => {
                let warnings = self
                    .arguments
                    .iter()
                    .zip(&self.read)
                    .filter(|(_, read)| !**read)
                    .map(|(argument, _)| {
                        format!("Unknown argument '{}' to {}", argument.key, aggregator)
                    })
                    .collect();
                Ok(Decoded { value, warnings })
            }
            _ => Err(CompileError::InvalidArguments {
                aggregator: aggregator.to_string(),
                problems: self.problems,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(key: &str, value: ArgValue) -> Argument {
        Argument {
            key: key.to_string(),
            value,
        }
    }

    fn problems(err: CompileError) -> Vec<ArgumentProblem> {
        match err {
            CompileError::InvalidArguments { problems, .. } => problems,
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_liftable_names() {
        for name in ["min", "max", "merge", "percentile", "count", "avg", "sum"] {
            assert!(is_liftable(name), "{} should be liftable", name);
        }
        assert!(!is_liftable("union"));
        assert!(!is_liftable("threshold"));
    }

    #[test]
    fn test_default_registry() {
        let registry = AggregatorRegistry::default();
        assert_eq!(registry.names(), vec!["threshold", "union"]);
        assert!(registry.decode("median", &[]).is_none());
    }

    #[test]
    fn test_decode_union() {
        let decoded = AggregatorRegistry::default()
            .decode("union", &[])
            .unwrap()
            .unwrap();
        assert_eq!(decoded.value, ExecutionKind::Union);
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_decode_threshold() {
        let args = vec![
            arg("threshold", ArgValue::Number(5.0)),
            arg("operator", ArgValue::Identifier("greater_than".into())),
        ];
        let decoded = AggregatorRegistry::default()
            .decode("threshold", &args)
            .unwrap()
            .unwrap();

        assert_eq!(
            decoded.value,
            ExecutionKind::Threshold(ThresholdAlert::new(5.0, ThresholdOperator::GreaterThan))
        );
    }

    #[test]
    fn test_threshold_missing_fields_all_reported() {
        let err = AggregatorRegistry::default()
            .decode("threshold", &[])
            .unwrap()
            .unwrap_err();

        assert_eq!(
            problems(err),
            vec![
                ArgumentProblem::Missing { field: "threshold" },
                ArgumentProblem::Missing { field: "operator" },
            ]
        );
    }

    #[test]
    fn test_threshold_invalid_values() {
        let args = vec![
            arg("threshold", ArgValue::String("high".into())),
            arg("operator", ArgValue::Identifier("ABOUT".into())),
            arg("non_numeric", ArgValue::Identifier("explode".into())),
        ];
        let err = AggregatorRegistry::default()
            .decode("threshold", &args)
            .unwrap()
            .unwrap_err();

        let problems = problems(err);
        assert_eq!(problems.len(), 3);
        assert_eq!(
            problems[0],
            ArgumentProblem::WrongType {
                field: "threshold",
                expected: "number",
                found: "string",
            }
        );
        assert!(problems[1].to_string().contains("'ABOUT'"));
    }

    #[test]
    fn test_unknown_argument_is_warning() {
        let args = vec![
            arg("threshold", ArgValue::Number(1.0)),
            arg("operator", ArgValue::String("LESS_THAN".into())),
            arg("foo", ArgValue::Bool(true)),
        ];
        let decoded = AggregatorRegistry::default()
            .decode("threshold", &args)
            .unwrap()
            .unwrap();

        assert_eq!(decoded.warnings, vec!["Unknown argument 'foo' to threshold"]);
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let args = vec![
            arg("threshold", ArgValue::Number(1.0)),
            arg("threshold", ArgValue::Number(2.0)),
            arg("operator", ArgValue::Identifier("EQUAL_TO".into())),
        ];
        let err = AggregatorRegistry::default()
            .decode("threshold", &args)
            .unwrap()
            .unwrap_err();

        assert_eq!(
            problems(err),
            vec![ArgumentProblem::Duplicate {
                field: "threshold".to_string(),
            }]
        );
    }

    #[test]
    fn test_decode_lifted_defaults() {
        let decoded = decode_lifted("max", &[]).unwrap();
        assert_eq!(decoded.value, Aggregator::new("max"));
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_decode_lifted_sampling() {
        let args = vec![
            arg("align_sampling", ArgValue::Bool(false)),
            arg("sampling_unit", ArgValue::Identifier("hours".into())),
            arg("sampling_value", ArgValue::Number(5.0)),
        ];
        let aggregator = decode_lifted("avg", &args).unwrap().value;

        assert!(!aggregator.align_sampling);
        assert_eq!(aggregator.sampling.unit, SamplingUnit::Hours);
        assert_eq!(aggregator.sampling.value.get(), 5);
        assert_eq!(aggregator.percentile, None);
    }

    #[test]
    fn test_decode_lifted_rejects_bad_sampling_value() {
        for bad in [0.0, -3.0, 1.5] {
            let args = vec![arg("sampling_value", ArgValue::Number(bad))];
            assert!(decode_lifted("sum", &args).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_percentile_requires_fraction() {
        let err = decode_lifted("percentile", &[]).unwrap_err();
        assert_eq!(
            problems(err),
            vec![ArgumentProblem::Missing { field: "percentile" }]
        );

        let args = vec![arg("percentile", ArgValue::Number(1.5))];
        assert!(decode_lifted("percentile", &args).is_err());

        let args = vec![arg("percentile", ArgValue::Number(0.99))];
        assert_eq!(decode_lifted("percentile", &args).unwrap().value.percentile, Some(0.99));
    }

    #[test]
    fn test_percentile_argument_ignored_elsewhere() {
        let args = vec![arg("percentile", ArgValue::Number(0.5))];
        let decoded = decode_lifted("max", &args).unwrap();
        assert_eq!(decoded.value.percentile, None);
        assert_eq!(decoded.warnings, vec!["Unknown argument 'percentile' to max"]);
    }
}
