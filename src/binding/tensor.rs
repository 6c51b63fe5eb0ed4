use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use half::f16;
use num_complex::Complex;

use crate::error::{Error, Result};
use crate::model::ElementKind;

/// Kind-tagged backing storage of a bound tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Float16(Vec<f16>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Uint8(Vec<u8>),
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
    Uint64(Vec<u64>),
    Boolean(Vec<bool>),
    String(Vec<String>),
    Complex64(Vec<Complex<f32>>),
    Complex128(Vec<Complex<f64>>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::Float32(v) => v.len(),
            TensorData::Float64(v) => v.len(),
            TensorData::Float16(v) => v.len(),
            TensorData::Int8(v) => v.len(),
            TensorData::Int16(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::Uint8(v) => v.len(),
            TensorData::Uint16(v) => v.len(),
            TensorData::Uint32(v) => v.len(),
            TensorData::Uint64(v) => v.len(),
            TensorData::Boolean(v) => v.len(),
            TensorData::String(v) => v.len(),
            TensorData::Complex64(v) => v.len(),
            TensorData::Complex128(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_kind(&self) -> ElementKind {
        match self {
            TensorData::Float32(_) => ElementKind::Float32,
            TensorData::Float64(_) => ElementKind::Float64,
            TensorData::Float16(_) => ElementKind::Float16,
            TensorData::Int8(_) => ElementKind::Int8,
            TensorData::Int16(_) => ElementKind::Int16,
            TensorData::Int32(_) => ElementKind::Int32,
            TensorData::Int64(_) => ElementKind::Int64,
            TensorData::Uint8(_) => ElementKind::Uint8,
            TensorData::Uint16(_) => ElementKind::Uint16,
            TensorData::Uint32(_) => ElementKind::Uint32,
            TensorData::Uint64(_) => ElementKind::Uint64,
            TensorData::Boolean(_) => ElementKind::Boolean,
            TensorData::String(_) => ElementKind::String,
            TensorData::Complex64(_) => ElementKind::Complex64,
            TensorData::Complex128(_) => ElementKind::Complex128,
        }
    }

    /// Numeric elements widened to f64, in storage order. `None` for
    /// string data.
    pub fn as_f64_values(&self) -> Option<Vec<f64>> {
        let values = match self {
            TensorData::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Float64(v) => v.clone(),
            TensorData::Float16(v) => v.iter().map(|x| x.to_f64()).collect(),
            TensorData::Int8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Int16(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Int32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Uint8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Uint16(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Uint32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Uint64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Boolean(v) => v.iter().map(|&x| x as u8 as f64).collect(),
            TensorData::Complex64(v) => v.iter().flat_map(|c| [c.re as f64, c.im as f64]).collect(),
            TensorData::Complex128(v) => v.iter().flat_map(|c| [c.re, c.im]).collect(),
            TensorData::String(_) => return None,
        };
        Some(values)
    }

    /// Every element rendered as a CSV cell, in storage order.
    pub fn render_elements(&self) -> Vec<String> {
        match self {
            TensorData::String(v) => v.clone(),
            TensorData::Boolean(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Complex64(v) => v.iter().map(|c| format!("{}+{}i", c.re, c.im)).collect(),
            TensorData::Complex128(v) => v.iter().map(|c| format!("{}+{}i", c.re, c.im)).collect(),
            _ => self
                .as_f64_values()
                .unwrap_or_default()
                .iter()
                .map(|x| x.to_string())
                .collect(),
        }
    }
}

/// A concrete, shape-validated buffer ready to be attached to an
/// evaluation session. Owns its storage exclusively until handed over.
#[derive(Clone, PartialEq)]
pub struct BoundTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl fmt::Debug for BoundTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundTensor {{ name: {:?}, kind: {:?}, shape: {:?}, len: {} }}",
            self.name,
            self.data.element_kind(),
            self.shape,
            self.data.len()
        )
    }
}

impl BoundTensor {
    /// Validate that the buffer length matches the declared shape
    /// product exactly; a mismatch is a hard error, never truncated or
    /// padded.
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(BoundTensor {
            name: name.into(),
            shape,
            data,
        })
    }

    pub fn element_kind(&self) -> ElementKind {
        self.data.element_kind()
    }

    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    /// Content hash for quick equality checks across iterations and
    /// runs. Floats hash by bit pattern, so identical outputs always
    /// collide and NaN payloads are distinguished.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.element_kind().to_string().hash(&mut hasher);
        self.shape.hash(&mut hasher);
        match &self.data {
            TensorData::String(v) => v.hash(&mut hasher),
            TensorData::Boolean(v) => v.hash(&mut hasher),
            data => {
                for value in data.as_f64_values().unwrap_or_default() {
                    value.to_bits().hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    /// Short rendering of the tensor for console output and the
    /// per-iteration report: the maximal element and its index for
    /// float data, the first element otherwise.
    pub fn preview(&self) -> String {
        match &self.data {
            TensorData::String(v) => v
                .first()
                .map(|s| format!("Result: {}", s))
                .unwrap_or_else(|| "<empty>".to_string()),
            data if data.element_kind().is_floating_point() => {
                let values = data.as_f64_values().unwrap_or_default();
                match values
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                {
                    Some((index, value)) => {
                        format!("Result[{}] has the maximal value of {}", index, value)
                    }
                    None => "<empty>".to_string(),
                }
            }
            data => match data.render_elements().first() {
                Some(first) => format!("Result: {}", first),
                None => "<empty>".to_string(),
            },
        }
    }
}
