pub mod dispatch;
pub mod element;
pub mod image;
pub mod tensor;

pub use dispatch::{build_tensor, GarbageGenerator, TensorSource};
pub use image::{PixelBuffer, PixelFormat};
pub use tensor::{BoundTensor, TensorData};
