//! Binding request params against a declared method signature
//!
//! Binding is structural and happens before the method runs: positional
//! params fill declared parameters in order, keyword params fill them by
//! name. Surplus arguments are only accepted when the signature declares a
//! variadic tail ([`VarArgs`] / [`KwArgs`]).

use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use quarry_json_rpc::RequestParams;

use crate::method::MethodError;

/// Arity or keyword mismatch between the call and the signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("Expected at most {expected} positional arguments, got {given}")]
    TooManyPositional { expected: usize, given: usize },

    #[error("Unexpected keyword argument '{0}'")]
    UnexpectedKeyword(String),

    #[error("Missing required argument '{0}'")]
    MissingArgument(String),
}

/// A declared parameter. Parameters without a default are required.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    default: Option<Value>,
}

impl Parameter {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The parameter list of an exposed method
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    params: Vec<Parameter>,
    var_positional: bool,
    var_keyword: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature made of required parameters only
    pub fn required<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: names.into_iter().map(Parameter::required).collect(),
            ..Self::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Parameter::required(name));
        self
    }

    pub fn optional_param(mut self, name: impl Into<String>, default: Value) -> Self {
        self.params.push(Parameter::optional(name, default));
        self
    }

    /// Accept surplus positional arguments
    pub fn var_positional(mut self) -> Self {
        self.var_positional = true;
        self
    }

    /// Accept surplus keyword arguments
    pub fn var_keyword(mut self) -> Self {
        self.var_keyword = true;
        self
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn accepts_var_positional(&self) -> bool {
        self.var_positional
    }

    pub fn accepts_var_keyword(&self) -> bool {
        self.var_keyword
    }

    fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|param| param.name == name)
    }

    pub fn bind(&self, params: &RequestParams) -> Result<BoundArgs, BindError> {
        let mut bound = BoundArgs::default();

        match params {
            RequestParams::Array(values) => {
                if values.len() > self.params.len() && !self.var_positional {
                    return Err(BindError::TooManyPositional {
                        expected: self.params.len(),
                        given: values.len(),
                    });
                }
                let mut values = values.iter();
                for (param, value) in self.params.iter().zip(values.by_ref()) {
                    bound.named.insert(param.name.clone(), value.clone());
                }
                bound.rest.extend(values.cloned());
            }
            RequestParams::Object(map) => {
                for (key, value) in map {
                    if self.declares(key) {
                        bound.named.insert(key.clone(), value.clone());
                    } else if self.var_keyword {
                        bound.extra.insert(key.clone(), value.clone());
                    } else {
                        return Err(BindError::UnexpectedKeyword(key.clone()));
                    }
                }
            }
        }

        for param in &self.params {
            if bound.named.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    bound.named.insert(param.name.clone(), default.clone());
                }
                None => return Err(BindError::MissingArgument(param.name.clone())),
            }
        }

        Ok(bound)
    }
}

/// Arguments bound to a signature, ready to be handed to a method body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArgs {
    named: Map<String, Value>,
    rest: Vec<Value>,
    extra: Map<String, Value>,
}

impl BoundArgs {
    /// Convert a bound argument. A value that does not fit `T` is reported
    /// as invalid params; an undeclared name reads as `null`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, MethodError> {
        let value = self.named.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|err| MethodError::invalid_params(format!("argument '{}': {}", name, err)))
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Surplus positional arguments
    pub fn rest(&self) -> &[Value] {
        &self.rest
    }

    /// Surplus keyword arguments
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn var_args(&self) -> VarArgs {
        VarArgs(self.rest.clone())
    }

    pub fn kw_args(&self) -> KwArgs {
        KwArgs(self.extra.clone())
    }
}

/// Variadic positional tail of a signature
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VarArgs(pub Vec<Value>);

impl VarArgs {
    /// Convert every element, failing with invalid params on the first misfit
    pub fn parse<T: DeserializeOwned>(&self) -> Result<Vec<T>, MethodError> {
        self.0
            .iter()
            .enumerate()
            .map(|(index, value)| {
                serde_json::from_value(value.clone()).map_err(|err| {
                    MethodError::invalid_params(format!("variadic argument {}: {}", index, err))
                })
            })
            .collect()
    }
}

impl Deref for VarArgs {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Variadic keyword tail of a signature
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KwArgs(pub Map<String, Value>);

impl KwArgs {
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, MethodError> {
        self.0
            .get(name)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|err| {
                    MethodError::invalid_params(format!("keyword argument '{}': {}", name, err))
                })
            })
            .transpose()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl Deref for KwArgs {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
