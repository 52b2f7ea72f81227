//! Approximation parameters and their declared schemas

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter mapping carried by an approximation spec.
///
/// A `BTreeMap` keeps iteration (and therefore serialization and
/// resolution) deterministic.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Scalar parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view; integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

/// Declared type and range of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Bool,
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    Str { choices: Vec<String> },
}

impl ParamKind {
    /// Human-readable type and range, e.g. `int >= 1`.
    pub fn describe(&self) -> String {
        match self {
            ParamKind::Bool => "bool".to_string(),
            ParamKind::Int { min, max } => describe_range("int", *min, *max),
            ParamKind::Float { min, max } => describe_range("float", *min, *max),
            ParamKind::Str { choices } if choices.is_empty() => "string".to_string(),
            ParamKind::Str { choices } => format!("one of [{}]", choices.join(", ")),
        }
    }
}

fn describe_range<T: fmt::Display>(name: &str, min: Option<T>, max: Option<T>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{name} in [{lo}, {hi}]"),
        (Some(lo), None) => format!("{name} >= {lo}"),
        (None, Some(hi)) => format!("{name} <= {hi}"),
        (None, None) => name.to_string(),
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Int { min: None, max: None })
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Float { min: None, max: None })
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Str { choices: Vec::new() })
    }

    /// Lower bound (inclusive) for numeric parameters.
    pub fn min(mut self, bound: f64) -> Self {
        match &mut self.kind {
            ParamKind::Int { min, .. } => *min = Some(bound as i64),
            ParamKind::Float { min, .. } => *min = Some(bound),
            _ => {}
        }
        self
    }

    /// Upper bound (inclusive) for numeric parameters.
    pub fn max(mut self, bound: f64) -> Self {
        match &mut self.kind {
            ParamKind::Int { max, .. } => *max = Some(bound as i64),
            ParamKind::Float { max, .. } => *max = Some(bound),
            _ => {}
        }
        self
    }

    /// Restrict string parameters to a fixed vocabulary.
    pub fn choices(mut self, values: &[&str]) -> Self {
        if let ParamKind::Str { choices } = &mut self.kind {
            *choices = values.iter().map(|v| (*v).to_string()).collect();
        }
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Check a value against the declared kind, normalizing ints to floats
    /// for float parameters and whole floats to ints for int parameters.
    fn check(&self, value: &ParamValue) -> Result<ParamValue, String> {
        let mismatch = || {
            format!(
                "expected {}, got {} ({value})",
                self.kind.describe(),
                value.type_name()
            )
        };
        match &self.kind {
            ParamKind::Bool => value.as_bool().map(ParamValue::Bool).ok_or_else(mismatch),
            ParamKind::Int { min, max } => {
                let v = value.as_int().or_else(|| whole_float(value)).ok_or_else(mismatch)?;
                if min.is_some_and(|lo| v < lo) || max.is_some_and(|hi| v > hi) {
                    return Err(format!("{v} is out of range ({})", self.kind.describe()));
                }
                Ok(ParamValue::Int(v))
            }
            ParamKind::Float { min, max } => {
                let v = value.as_float().ok_or_else(mismatch)?;
                if !v.is_finite() {
                    return Err(format!("{v} is not a finite number"));
                }
                if min.is_some_and(|lo| v < lo) || max.is_some_and(|hi| v > hi) {
                    return Err(format!("{v} is out of range ({})", self.kind.describe()));
                }
                Ok(ParamValue::Float(v))
            }
            ParamKind::Str { choices } => {
                let v = value.as_str().ok_or_else(mismatch)?;
                if !choices.is_empty() && !choices.iter().any(|c| c == v) {
                    return Err(format!("'{v}' is not {}", self.kind.describe()));
                }
                Ok(ParamValue::Str(v.to_string()))
            }
        }
    }
}

/// `2.0` read as `2`; `None` for fractional, non-finite or out-of-range floats.
fn whole_float(value: &ParamValue) -> Option<i64> {
    match value {
        ParamValue::Float(x)
            if x.is_finite() && x.fract() == 0.0 && *x >= i64::MIN as f64 && *x < i64::MAX as f64 =>
        {
            Some(*x as i64)
        }
        _ => None,
    }
}

/// Schema violation reported by [`ParamSchema::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParamViolation {
    pub parameter: String,
    pub reason: String,
}

/// Declared parameter schema of one approximation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    /// Schema accepting no parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Validate `given` and return the normalized parameters with defaults
    /// filled in.
    pub fn validate(&self, given: &Parameters) -> Result<Parameters, ParamViolation> {
        if let Some(unknown) = given
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            let accepted: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
            return Err(ParamViolation {
                parameter: unknown.clone(),
                reason: if accepted.is_empty() {
                    "this approximation takes no parameters".to_string()
                } else {
                    format!("unknown parameter (accepted: {})", accepted.join(", "))
                },
            });
        }

        let mut normalized = Parameters::new();
        for spec in &self.params {
            match given.get(&spec.name) {
                Some(value) => {
                    let checked = spec.check(value).map_err(|reason| ParamViolation {
                        parameter: spec.name.clone(),
                        reason,
                    })?;
                    normalized.insert(spec.name.clone(), checked);
                }
                None if spec.required => {
                    return Err(ParamViolation {
                        parameter: spec.name.clone(),
                        reason: format!("missing required key ({})", spec.kind.describe()),
                    });
                }
                None => {
                    if let Some(default) = &spec.default {
                        normalized.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(normalized)
    }
}
