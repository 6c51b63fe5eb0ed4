use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};

/// Element kinds a tensor feature may declare.
///
/// The discriminants mirror the runtime's wire tags (see `from_tag`);
/// `Undefined` covers any tag the harness does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum ElementKind {
    Undefined,
    Float32,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Int32,
    Int64,
    String,
    Boolean,
    Float16,
    Float64,
    Uint32,
    Uint64,
    Complex64,
    Complex128,
}

impl ElementKind {
    /// Convert from the runtime-reported element-kind tag.
    pub fn from_tag(tag: i32) -> Self {
        match tag {
            1 => ElementKind::Float32,
            2 => ElementKind::Uint8,
            3 => ElementKind::Int8,
            4 => ElementKind::Uint16,
            5 => ElementKind::Int16,
            6 => ElementKind::Int32,
            7 => ElementKind::Int64,
            8 => ElementKind::String,
            9 => ElementKind::Boolean,
            10 => ElementKind::Float16,
            11 => ElementKind::Float64,
            12 => ElementKind::Uint32,
            13 => ElementKind::Uint64,
            14 => ElementKind::Complex64,
            15 => ElementKind::Complex128,
            _ => ElementKind::Undefined,
        }
    }

    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElementKind::Undefined => 0,
            ElementKind::Float32 => 4,
            ElementKind::Float64 => 8,
            ElementKind::Float16 => 2,
            ElementKind::Int8 | ElementKind::Uint8 | ElementKind::Boolean => 1,
            ElementKind::Int16 | ElementKind::Uint16 => 2,
            ElementKind::Int32 | ElementKind::Uint32 => 4,
            ElementKind::Int64 | ElementKind::Uint64 => 8,
            ElementKind::String => std::mem::size_of::<usize>(),
            ElementKind::Complex64 => 8,
            ElementKind::Complex128 => 16,
        }
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self,
            ElementKind::Float32 | ElementKind::Float64 | ElementKind::Float16
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ElementKind::Int8
                | ElementKind::Int16
                | ElementKind::Int32
                | ElementKind::Int64
                | ElementKind::Uint8
                | ElementKind::Uint16
                | ElementKind::Uint32
                | ElementKind::Uint64
        )
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, ElementKind::Complex64 | ElementKind::Complex128)
    }

    /// True for the kinds the binding dispatcher can construct from a
    /// data source. String, boolean and complex features can appear on
    /// outputs but are not bindable as inputs.
    pub fn is_bindable(&self) -> bool {
        self.is_floating_point() || self.is_integer()
    }
}

/// One dimension of a tensor shape. `Free` marks a dynamic dimension
/// whose size the model does not pin down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Fixed(u64),
    Free,
}

/// The kind of a model input or output feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    Tensor {
        element_kind: ElementKind,
        shape: Vec<Dimension>,
    },
    Sequence {
        element: Box<FeatureKind>,
    },
    Map {
        key_kind: ElementKind,
        value: Box<FeatureKind>,
    },
    Image {
        height: u64,
        width: u64,
    },
}

/// Static metadata describing one model input or output.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDescriptor {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureDescriptor {
    pub fn tensor(name: impl Into<String>, element_kind: ElementKind, dims: &[i64]) -> Self {
        let shape = dims
            .iter()
            .map(|&d| {
                if d < 0 {
                    Dimension::Free
                } else {
                    Dimension::Fixed(d as u64)
                }
            })
            .collect();
        FeatureDescriptor {
            name: name.into(),
            kind: FeatureKind::Tensor { element_kind, shape },
        }
    }

    /// Resolve this descriptor to a concrete (kind, shape) pair for
    /// binding. A free leading (batch) dimension defaults to 1; a free
    /// dimension anywhere else fails.
    pub fn bound_tensor_shape(&self) -> Result<(ElementKind, Vec<usize>)> {
        let (element_kind, dims) = match &self.kind {
            FeatureKind::Tensor { element_kind, shape } => (*element_kind, shape),
            other => {
                return Err(Error::Validation(format!(
                    "feature {} is not a tensor (kind: {:?})",
                    self.name, other
                )))
            }
        };

        let mut resolved = Vec::with_capacity(dims.len());
        for (i, dim) in dims.iter().enumerate() {
            match dim {
                Dimension::Fixed(size) => resolved.push(*size as usize),
                Dimension::Free if i == 0 => resolved.push(1),
                Dimension::Free => return Err(Error::UnboundDimension(self.name.clone())),
            }
        }
        Ok((element_kind, resolved))
    }

    /// Total element count implied by the bound shape.
    pub fn element_count(&self) -> Result<usize> {
        let (_, shape) = self.bound_tensor_shape()?;
        Ok(shape.iter().product())
    }

    /// Human-readable rendering for console output, e.g.
    /// `Tensor<Float32>[1, 3, 224, 224]` or `List<Map<Int64, Float32>>`.
    pub fn describe(&self) -> String {
        describe_kind(&self.kind)
    }
}

fn describe_kind(kind: &FeatureKind) -> String {
    match kind {
        FeatureKind::Tensor { element_kind, shape } => {
            let dims: Vec<String> = shape
                .iter()
                .map(|d| match d {
                    Dimension::Fixed(n) => n.to_string(),
                    Dimension::Free => "-1".to_string(),
                })
                .collect();
            format!("Tensor<{}>[{}]", element_kind, dims.join(", "))
        }
        FeatureKind::Sequence { element } => format!("List<{}>", describe_kind(element)),
        FeatureKind::Map { key_kind, value } => {
            format!("Map<{}, {}>", key_kind, describe_kind(value))
        }
        FeatureKind::Image { height, width } => {
            format!("Image (Height: {}, Width: {})", height, width)
        }
    }
}
