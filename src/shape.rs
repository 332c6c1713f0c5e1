//! Shape and cache-size normalization
//!
//! Both values usually arrive from configuration files or user input, so
//! the normalizers accept dynamic [`serde_json::Value`]s and turn them into
//! typed values. Typed callers can skip the dynamic path through the
//! `From` impls on [`Shape`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// A single dimension of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum Dim {
    /// Dimension with a fixed size
    Known(u64),
    /// Dimension whose size is not known yet
    Unknown,
}

impl Dim {
    /// Size of the dimension, if known
    pub fn size(&self) -> Option<u64> {
        match self {
            Dim::Known(n) => Some(*n),
            Dim::Unknown => None,
        }
    }

    /// Whether the size is fixed
    pub fn is_known(&self) -> bool {
        matches!(self, Dim::Known(_))
    }
}

impl From<Option<u64>> for Dim {
    fn from(size: Option<u64>) -> Self {
        size.map_or(Dim::Unknown, Dim::Known)
    }
}

impl From<Dim> for Option<u64> {
    fn from(dim: Dim) -> Self {
        dim.size()
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Known(n) => write!(f, "{n}"),
            Dim::Unknown => f.write_str("None"),
        }
    }
}

/// Normalized tensor shape, never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Dim>", into = "Vec<Dim>")]
pub struct Shape(Vec<Dim>);

impl Shape {
    /// Shape with one dimension of unknown size
    pub fn unknown() -> Self {
        Shape(vec![Dim::Unknown])
    }

    /// Dimensions in order
    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Whether every dimension has a fixed size
    pub fn is_fully_known(&self) -> bool {
        self.0.iter().all(Dim::is_known)
    }

    /// Number of elements, when every dimension is known
    pub fn num_elements(&self) -> Option<u64> {
        self.0
            .iter()
            .try_fold(1u64, |acc, dim| acc.checked_mul(dim.size()?))
    }
}

impl From<u64> for Shape {
    fn from(size: u64) -> Self {
        Shape(vec![Dim::Known(size)])
    }
}

impl From<Vec<Option<u64>>> for Shape {
    fn from(dims: Vec<Option<u64>>) -> Self {
        if dims.is_empty() {
            return Shape::unknown();
        }
        Shape(dims.into_iter().map(Dim::from).collect())
    }
}

impl From<Vec<Dim>> for Shape {
    fn from(dims: Vec<Dim>) -> Self {
        if dims.is_empty() {
            return Shape::unknown();
        }
        Shape(dims)
    }
}

impl From<Shape> for Vec<Dim> {
    fn from(shape: Shape) -> Self {
        shape.0
    }
}

impl<T: Into<Shape>> From<Option<T>> for Shape {
    fn from(shape: Option<T>) -> Self {
        shape.map_or_else(Shape::unknown, Into::into)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        if self.0.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_dim_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Normalize a shape given as null, a single integer or an array of
/// integers and nulls.
pub fn norm_shape(value: &Value) -> Result<Shape> {
    match value {
        Value::Null => Ok(Shape::unknown()),
        Value::Number(_) => as_dim_size(value).map(Shape::from).ok_or_else(|| {
            Error::type_mismatch(format!(
                "shape must be null, an integer or an array, got {}",
                type_name(value)
            ))
        }),
        Value::Array(elements) if elements.is_empty() => Ok(Shape::unknown()),
        Value::Array(elements) => elements
            .iter()
            .map(|element| match element {
                Value::Null => Ok(Dim::Unknown),
                other => as_dim_size(other).map(Dim::Known).ok_or_else(|| {
                    Error::type_mismatch(format!(
                        "shape elements must be non-negative integers or null, got {value}"
                    ))
                }),
            })
            .collect::<Result<Vec<_>>>()
            .map(Shape),
        // strings iterate into characters, which are never valid dimensions
        Value::String(_) => Err(Error::type_mismatch(format!(
            "shape elements must be non-negative integers or null, got {value}"
        ))),
        other => Err(Error::type_mismatch(format!(
            "shape must be null, an integer or an array, got {}",
            type_name(other)
        ))),
    }
}

/// Normalize a cache size given as null or a non-negative integer
pub fn norm_cache(value: &Value) -> Result<u64> {
    match value {
        Value::Null => Ok(0),
        other => as_dim_size(other).ok_or_else(|| {
            Error::type_mismatch(format!(
                "cache size must be null or a non-negative integer, got {}",
                type_name(other)
            ))
        }),
    }
}
