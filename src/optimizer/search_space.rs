//! Search space definition for hyperparameters

use crate::error::{PunctualityError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One sampled configuration, keyed by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float { low: f64, high: f64, log_scale: bool },
    /// Integer parameter, both bounds inclusive
    Int { low: i64, high: i64 },
    /// Categorical parameter
    Categorical { choices: Vec<String> },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: false,
            },
        }
    }

    /// Create a float parameter uniform in log10 between `10^low_exp` and `10^high_exp`
    pub fn log10_float(name: impl Into<String>, low_exp: f64, high_exp: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low: 10f64.powf(low_exp),
                high: 10f64.powf(high_exp),
                log_scale: true,
            },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: &[&str]) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        }
    }

    /// Map a point of the unit interval onto the parameter range
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let val = if *log_scale {
                    let (log_low, log_high) = (low.log10(), high.log10());
                    10f64.powf(log_low + u * (log_high - log_low))
                } else {
                    low + u * (high - low)
                };
                ParameterValue::Float(val)
            }
            ParameterType::Int { low, high } => {
                let width = (high - low + 1) as f64;
                let offset = ((u * width).floor() as i64).min(high - low);
                ParameterValue::Int(low + offset)
            }
            ParameterType::Categorical { choices } => {
                let idx = ((u * choices.len() as f64).floor() as usize).min(choices.len().saturating_sub(1));
                ParameterValue::String(choices.get(idx).cloned().unwrap_or_default())
            }
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        self.from_unit(rng.gen::<f64>())
    }

    /// Parse a value written by [`ParameterValue`]'s `Display`
    pub fn parse_value(&self, raw: &str) -> Result<ParameterValue> {
        let invalid = |reason: &str| PunctualityError::InvalidParameter {
            name: self.name.clone(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };
        match &self.param_type {
            ParameterType::Float { .. } => raw
                .trim()
                .parse::<f64>()
                .map(ParameterValue::Float)
                .map_err(|_| invalid("not a number")),
            ParameterType::Int { .. } => raw
                .trim()
                .parse::<i64>()
                .map(ParameterValue::Int)
                .map_err(|_| invalid("not an integer")),
            ParameterType::Categorical { choices } => {
                if choices.iter().any(|c| c == raw) {
                    Ok(ParameterValue::String(raw.to_string()))
                } else {
                    Err(invalid("not one of the allowed choices"))
                }
            }
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add a float parameter on a log10 scale
    pub fn log10_float(self, name: impl Into<String>, low_exp: f64, high_exp: f64) -> Self {
        self.add(Parameter::log10_float(name, low_exp, high_exp))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Add a categorical parameter
    pub fn categorical(self, name: impl Into<String>, choices: &[&str]) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Map a point of the unit hypercube onto a configuration
    pub fn from_unit(&self, point: &[f64]) -> TrialParams {
        self.parameters
            .iter()
            .zip(point.iter())
            .map(|(p, &u)| (p.name.clone(), p.from_unit(u)))
            .collect()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bounds_inclusive() {
        let p = Parameter::int("min_n", 2, 40);
        assert_eq!(p.from_unit(0.0), ParameterValue::Int(2));
        assert_eq!(p.from_unit(1.0), ParameterValue::Int(40));
        assert_eq!(p.from_unit(0.999_999), ParameterValue::Int(40));
    }

    #[test]
    fn test_log10_float_maps_exponents() {
        let p = Parameter::log10_float("learn_rate", -10.0, -1.0);
        let low = p.from_unit(0.0).as_float().unwrap();
        let high = p.from_unit(1.0).as_float().unwrap();
        let mid = p.from_unit(0.5).as_float().unwrap();
        assert!((low.log10() + 10.0).abs() < 1e-9);
        assert!((high.log10() + 1.0).abs() < 1e-9);
        assert!((mid.log10() + 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_categorical_covers_choices() {
        let p = Parameter::categorical("weight_func", &["a", "b", "c"]);
        assert_eq!(p.from_unit(0.0).as_string(), Some("a"));
        assert_eq!(p.from_unit(0.5).as_string(), Some("b"));
        assert_eq!(p.from_unit(1.0).as_string(), Some("c"));
    }

    #[test]
    fn test_display_parses_back() {
        let space = SearchSpace::new()
            .float("sample_size", 0.1, 1.0)
            .int("trees", 1, 2000)
            .categorical("weight_func", &["rank", "optimal"]);
        let params = space.from_unit(&[0.123_456_789, 0.42, 0.9]);
        for p in space.parameters() {
            let value = &params[&p.name];
            assert_eq!(&p.parse_value(&value.to_string()).unwrap(), value);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_choice() {
        let p = Parameter::categorical("weight_func", &["rank"]);
        assert!(p.parse_value("cubic").is_err());
    }
}
