use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pixel layout of a decoded software bitmap. Channel order is the
/// packed byte order within one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 4 bytes per pixel: blue, green, red, alpha.
    Bgra8,
    /// 4 bytes per pixel: red, green, blue, alpha.
    Rgba8,
    /// 3 bytes per pixel: red, green, blue.
    Rgb8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Byte offsets of (red, green, blue) within one packed pixel.
    fn rgb_offsets(&self) -> (usize, usize, usize) {
        match self {
            PixelFormat::Bgra8 => (2, 1, 0),
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => (0, 1, 2),
        }
    }
}

/// A decoded image held in host memory, packed channel-interleaved as
/// the decoder produced it: shape (height, width, channels).
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub format: PixelFormat,
    pixels: Array3<u8>,
}

impl PixelBuffer {
    pub fn new(format: PixelFormat, height: usize, width: usize, bytes: Vec<u8>) -> Result<Self> {
        let channels = format.channels();
        let expected = height * width * channels;
        if bytes.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let pixels = Array3::from_shape_vec((height, width, channels), bytes)
            .map_err(|e| Error::Validation(format!("pixel buffer shape: {}", e)))?;
        Ok(PixelBuffer { format, pixels })
    }

    pub fn height(&self) -> usize {
        self.pixels.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.pixels.shape()[1]
    }

    /// Element count of the tensor this image tensorizes into
    /// (height x width x 3, RGB planes).
    pub fn planar_len(&self) -> usize {
        self.height() * self.width() * 3
    }

    /// Generate a garbage image from a seed, the synthetic stand-in
    /// when no image path is configured. Deterministic per seed.
    pub fn garbage(format: PixelFormat, height: usize, width: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bytes: Vec<u8> = (0..height * width * format.channels())
            .map(|_| rng.gen())
            .collect();
        // Length is correct by construction.
        PixelBuffer::new(format, height, width, bytes)
            .unwrap_or_else(|_| unreachable!("garbage buffer size is exact"))
    }

    /// De-interleave the packed pixels into planar channel-major order
    /// (all red values contiguous, then green, then blue), applying
    /// `(value - offset[c]) / scale` per channel in f32. Narrowing to
    /// the tensor's declared kind happens on store, not here.
    pub fn to_planar(&self, scale: f32, offsets: [f32; 3]) -> Result<Vec<f32>> {
        if scale == 0.0 {
            return Err(Error::Validation(
                "image scale must be non-zero".to_string(),
            ));
        }
        let plane = self.height() * self.width();
        let (r_off, g_off, b_off) = self.format.rgb_offsets();
        let packed = self
            .pixels
            .as_slice()
            .ok_or_else(|| Error::Validation("pixel buffer is not contiguous".to_string()))?;
        let stride = self.format.channels();

        let mut planar = vec![0.0f32; plane * 3];
        for (i, pixel) in packed.chunks_exact(stride).enumerate() {
            planar[i] = (pixel[r_off] as f32 - offsets[0]) / scale;
            planar[i + plane] = (pixel[g_off] as f32 - offsets[1]) / scale;
            planar[i + plane * 2] = (pixel[b_off] as f32 - offsets[2]) / scale;
        }
        Ok(planar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_byte_count() {
        let err = PixelBuffer::new(PixelFormat::Bgra8, 2, 2, vec![0u8; 15]).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 16, .. }));
    }

    #[test]
    fn deinterleaves_bgra_into_rgb_planes() {
        // Two pixels: (B,G,R,A) = (10,20,30,255) and (40,50,60,255).
        let bytes = vec![10, 20, 30, 255, 40, 50, 60, 255];
        let buffer = PixelBuffer::new(PixelFormat::Bgra8, 1, 2, bytes).unwrap();
        let planar = buffer.to_planar(2.0, [1.0, 2.0, 3.0]).unwrap();
        // Red plane, then green, then blue.
        assert_eq!(planar[0], (30.0 - 1.0) / 2.0);
        assert_eq!(planar[1], (60.0 - 1.0) / 2.0);
        assert_eq!(planar[2], (20.0 - 2.0) / 2.0);
        assert_eq!(planar[3], (50.0 - 2.0) / 2.0);
        assert_eq!(planar[4], (10.0 - 3.0) / 2.0);
        assert_eq!(planar[5], (40.0 - 3.0) / 2.0);
    }

    #[test]
    fn deinterleave_covers_every_position() {
        let height = 3;
        let width = 4;
        let buffer = PixelBuffer::garbage(PixelFormat::Rgba8, height, width, 7);
        let planar = buffer.to_planar(1.0, [0.0, 0.0, 0.0]).unwrap();
        assert_eq!(planar.len(), height * width * 3);
        // Round trip against the packed source.
        let packed = buffer.pixels.as_slice().unwrap();
        for i in 0..height * width {
            assert_eq!(planar[i], packed[i * 4] as f32);
            assert_eq!(planar[i + height * width], packed[i * 4 + 1] as f32);
            assert_eq!(planar[i + 2 * height * width], packed[i * 4 + 2] as f32);
        }
    }

    #[test]
    fn garbage_is_deterministic_per_seed() {
        let a = PixelBuffer::garbage(PixelFormat::Bgra8, 2, 2, 42);
        let b = PixelBuffer::garbage(PixelFormat::Bgra8, 2, 2, 42);
        let c = PixelBuffer::garbage(PixelFormat::Bgra8, 2, 2, 43);
        assert_eq!(a.pixels, b.pixels);
        assert_ne!(a.pixels, c.pixels);
    }

    #[test]
    fn zero_scale_is_rejected() {
        let buffer = PixelBuffer::garbage(PixelFormat::Rgb8, 1, 1, 0);
        assert!(buffer.to_planar(0.0, [0.0; 3]).is_err());
    }
}
