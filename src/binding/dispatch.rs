use half::f16;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::binding::element::Element;
use crate::binding::image::PixelBuffer;
use crate::binding::tensor::{BoundTensor, TensorData};
use crate::error::{Error, Result};
use crate::model::{ElementKind, FeatureDescriptor};

/// Explicit, caller-owned generator for synthetic (garbage) tensor
/// data. Seeded per run so tests reproduce exact tensors.
#[derive(Debug)]
pub struct GarbageGenerator {
    rng: StdRng,
    max_value: Option<u32>,
}

impl GarbageGenerator {
    pub fn new(seed: u64) -> Self {
        GarbageGenerator {
            rng: StdRng::seed_from_u64(seed),
            max_value: None,
        }
    }

    /// Bound generated values to `[0, max]` instead of the default
    /// byte-like `[0, 256)` range.
    pub fn with_max_value(seed: u64, max_value: u32) -> Self {
        GarbageGenerator {
            rng: StdRng::seed_from_u64(seed),
            max_value: Some(max_value),
        }
    }

    fn next_value(&mut self) -> f64 {
        match self.max_value {
            Some(max) => self.rng.gen_range(0..=max) as f64,
            None => self.rng.gen_range(0.0..256.0),
        }
    }
}

/// One of the three places tensor data can come from.
pub enum TensorSource<'a> {
    /// Fill with generated garbage data.
    Synthetic(&'a mut GarbageGenerator),
    /// One CSV row, one cell per element.
    Csv(&'a [String]),
    /// A decoded image, tensorized as planar RGB with per-channel
    /// normalization.
    Image {
        pixels: &'a PixelBuffer,
        scale: f32,
        offsets: [f32; 3],
    },
}

fn fill_synthetic<T: Element>(count: usize, rng: &mut GarbageGenerator) -> Result<Vec<T>> {
    Ok((0..count).map(|_| T::narrow(rng.next_value())).collect())
}

fn fill_csv<T: Element>(count: usize, row: &[String]) -> Result<Vec<T>> {
    if row.len() != count {
        return Err(Error::SizeMismatch {
            expected: count,
            actual: row.len(),
        });
    }
    row.iter()
        .map(|cell| {
            T::parse(cell).ok_or_else(|| {
                Error::Validation(format!(
                    "CSV value {:?} is not a valid {}",
                    cell,
                    T::KIND
                ))
            })
        })
        .collect()
}

fn fill_image<T: Element>(count: usize, planar: &[f32]) -> Result<Vec<T>> {
    if planar.len() != count {
        return Err(Error::SizeMismatch {
            expected: count,
            actual: planar.len(),
        });
    }
    Ok(planar.iter().map(|&v| T::narrow(v as f64)).collect())
}

/// The runtime dispatch table over bindable element kinds: one arm per
/// kind, every arm invoking the same generic constructor parameterized
/// only by storage width.
macro_rules! dispatch_numeric {
    ($kind:expr, $feature:expr, $build:ident($($arg:expr),*)) => {
        match $kind {
            ElementKind::Float32 => TensorData::Float32($build::<f32>($($arg),*)?),
            ElementKind::Float64 => TensorData::Float64($build::<f64>($($arg),*)?),
            ElementKind::Float16 => TensorData::Float16($build::<f16>($($arg),*)?),
            ElementKind::Int8 => TensorData::Int8($build::<i8>($($arg),*)?),
            ElementKind::Int16 => TensorData::Int16($build::<i16>($($arg),*)?),
            ElementKind::Int32 => TensorData::Int32($build::<i32>($($arg),*)?),
            ElementKind::Int64 => TensorData::Int64($build::<i64>($($arg),*)?),
            ElementKind::Uint8 => TensorData::Uint8($build::<u8>($($arg),*)?),
            ElementKind::Uint16 => TensorData::Uint16($build::<u16>($($arg),*)?),
            ElementKind::Uint32 => TensorData::Uint32($build::<u32>($($arg),*)?),
            ElementKind::Uint64 => TensorData::Uint64($build::<u64>($($arg),*)?),
            other => {
                return Err(Error::Validation(format!(
                    "element kind {} of feature {} cannot be bound",
                    other, $feature
                )))
            }
        }
    };
}

/// Build a shape-validated tensor for one input feature from the given
/// source. Fails atomically: on any mismatch no partial tensor exists.
pub fn build_tensor(descriptor: &FeatureDescriptor, source: TensorSource<'_>) -> Result<BoundTensor> {
    let (kind, shape) = descriptor.bound_tensor_shape()?;
    let count: usize = shape.iter().product();
    debug!(
        "building {} tensor {:?} ({} elements)",
        kind, descriptor.name, count
    );

    let data = match source {
        TensorSource::Synthetic(rng) => {
            dispatch_numeric!(kind, descriptor.name, fill_synthetic(count, rng))
        }
        TensorSource::Csv(row) => {
            dispatch_numeric!(kind, descriptor.name, fill_csv(count, row))
        }
        TensorSource::Image {
            pixels,
            scale,
            offsets,
        } => {
            let planar = pixels.to_planar(scale, offsets)?;
            dispatch_numeric!(kind, descriptor.name, fill_image(count, &planar))
        }
    };

    BoundTensor::new(descriptor.name.clone(), shape, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::image::PixelFormat;
    use strum::IntoEnumIterator;

    fn csv_row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn synthetic_build_matches_shape_product_for_all_bindable_kinds() {
        for kind in ElementKind::iter().filter(ElementKind::is_bindable) {
            let desc = FeatureDescriptor::tensor("x", kind, &[2, 3, 4]);
            let mut rng = GarbageGenerator::new(1);
            let tensor = build_tensor(&desc, TensorSource::Synthetic(&mut rng)).unwrap();
            assert_eq!(tensor.element_count(), 24, "kind {}", kind);
            assert_eq!(tensor.element_kind(), kind);
        }
    }

    #[test]
    fn unbindable_kinds_fail_validation() {
        for kind in [
            ElementKind::Undefined,
            ElementKind::String,
            ElementKind::Boolean,
            ElementKind::Complex64,
        ] {
            let desc = FeatureDescriptor::tensor("x", kind, &[2]);
            let mut rng = GarbageGenerator::new(1);
            let result = build_tensor(&desc, TensorSource::Synthetic(&mut rng));
            assert!(matches!(result, Err(Error::Validation(_))), "kind {}", kind);
        }
    }

    #[test]
    fn synthetic_data_is_reproducible_per_seed() {
        let desc = FeatureDescriptor::tensor("x", ElementKind::Float32, &[1, 8]);
        let a = build_tensor(&desc, TensorSource::Synthetic(&mut GarbageGenerator::new(5)))
            .unwrap();
        let b = build_tensor(&desc, TensorSource::Synthetic(&mut GarbageGenerator::new(5)))
            .unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn bounded_garbage_respects_max_value() {
        let desc = FeatureDescriptor::tensor("x", ElementKind::Uint32, &[64]);
        let mut rng = GarbageGenerator::with_max_value(3, 5);
        let tensor = build_tensor(&desc, TensorSource::Synthetic(&mut rng)).unwrap();
        if let TensorData::Uint32(values) = &tensor.data {
            assert!(values.iter().all(|&v| v <= 5));
        } else {
            panic!("expected Uint32 data");
        }
    }

    #[test]
    fn csv_row_of_exact_length_binds() {
        let desc = FeatureDescriptor::tensor("x", ElementKind::Float32, &[1, 3, 2, 2]);
        let row = csv_row(&[
            "0.5", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11.25",
        ]);
        let tensor = build_tensor(&desc, TensorSource::Csv(&row)).unwrap();
        assert_eq!(tensor.element_count(), 12);
        if let TensorData::Float32(values) = &tensor.data {
            assert_eq!(values[0], 0.5);
            assert_eq!(values[11], 11.25);
        } else {
            panic!("expected Float32 data");
        }
    }

    #[test]
    fn csv_row_of_wrong_length_never_truncates() {
        let desc = FeatureDescriptor::tensor("x", ElementKind::Float32, &[1, 3, 2, 2]);
        let row = csv_row(&["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
        let err = build_tensor(&desc, TensorSource::Csv(&row)).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn csv_garbage_cell_fails_loudly() {
        let desc = FeatureDescriptor::tensor("x", ElementKind::Int32, &[2]);
        let row = csv_row(&["1", "two"]);
        assert!(matches!(
            build_tensor(&desc, TensorSource::Csv(&row)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn csv_narrows_into_integer_kinds() {
        let desc = FeatureDescriptor::tensor("x", ElementKind::Uint8, &[3]);
        let row = csv_row(&["0", "128", "255"]);
        let tensor = build_tensor(&desc, TensorSource::Csv(&row)).unwrap();
        assert_eq!(tensor.data, TensorData::Uint8(vec![0, 128, 255]));
    }

    #[test]
    fn image_binds_planar_normalized_pixels() {
        // One BGRA pixel (B,G,R,A) = (12, 8, 4, 255).
        let pixels = PixelBuffer::new(PixelFormat::Bgra8, 1, 1, vec![12, 8, 4, 255]).unwrap();
        let desc = FeatureDescriptor::tensor("x", ElementKind::Float32, &[1, 3, 1, 1]);
        let tensor = build_tensor(
            &desc,
            TensorSource::Image {
                pixels: &pixels,
                scale: 2.0,
                offsets: [0.0, 0.0, 0.0],
            },
        )
        .unwrap();
        assert_eq!(
            tensor.data,
            TensorData::Float32(vec![2.0, 4.0, 6.0]) // R, G, B planes
        );
    }

    #[test]
    fn image_of_wrong_dimensions_fails() {
        let pixels = PixelBuffer::garbage(PixelFormat::Bgra8, 2, 2, 0);
        let desc = FeatureDescriptor::tensor("x", ElementKind::Float32, &[1, 3, 4, 4]);
        let err = build_tensor(
            &desc,
            TensorSource::Image {
                pixels: &pixels,
                scale: 1.0,
                offsets: [0.0; 3],
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 48, .. }));
    }

    #[test]
    fn float16_narrows_on_store() {
        let desc = FeatureDescriptor::tensor("x", ElementKind::Float16, &[2]);
        let row = csv_row(&["1.5", "0.1"]);
        let tensor = build_tensor(&desc, TensorSource::Csv(&row)).unwrap();
        assert_eq!(
            tensor.data,
            TensorData::Float16(vec![f16::from_f32(1.5), f16::from_f32(0.1)])
        );
    }
}
