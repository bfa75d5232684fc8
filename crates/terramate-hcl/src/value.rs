//! value representation
//!
//! Attribute values stay unevaluated. For output they are rendered into the following data types
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//! - expression (anything that is not a literal, kept as source text)
//!
//! Additionally:
//! - there is no `null`/`None` value, a `null` literal is kept as expression.
//! - integers that do not fit into i64 are kept as expression.
//!
use crate::ast::Attribute;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(indexmap::IndexMap<String, Value>),
    Expression(String),
}

impl Value {
    /// Renders literal expressions, `None` for anything that needs evaluation
    pub fn from_literal(expr: &hcl::Expression) -> Option<Value> {
        use hcl::Expression;

        match expr {
            Expression::Bool(bool) => Some((*bool).into()),
            Expression::Number(num) => Value::from_number(num),
            Expression::String(s) => Some(s.as_str().into()),
            Expression::Array(array) => array
                .iter()
                .map(Value::from_literal)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Expression::Object(object) => object
                .iter()
                .map(|(key, value)| Value::from_literal(value).map(|value| (key.to_string(), value)))
                .collect::<Option<indexmap::IndexMap<_, _>>>()
                .map(Value::Object),
            Expression::Parenthesis(inner) => Value::from_literal(inner),
            _ => None,
        }
    }

    fn from_number(num: &hcl::Number) -> Option<Value> {
        if let Some(int) = num.as_i64() {
            return Some(Value::Integer(int));
        }

        if num.is_f64() {
            return num.as_f64().map(Value::Decimal);
        }

        None
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Attribute> for Value {
    fn from(attribute: &Attribute) -> Self {
        Value::from_literal(&attribute.expr).unwrap_or_else(|| Value::Expression(attribute.text.clone()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Expression(source) => serializer.serialize_str(&format!("${{{source}}}")),
        }
    }
}
