use half::f16;
use num_traits::{Bounded, NumCast, ToPrimitive};

use crate::model::ElementKind;

/// One numeric element kind the binding dispatcher can construct.
///
/// Every constructor in the dispatcher runs the same algorithm in f64
/// and differs only in how values narrow on store; this trait is that
/// narrowing seam. Float16 rides the f32 computation path and narrows
/// on output.
pub trait Element: Copy + Send + 'static {
    const KIND: ElementKind;

    /// Narrow an f64 intermediate to this storage width. Integer kinds
    /// round then saturate at the type bounds; NaN maps to zero.
    fn narrow(value: f64) -> Self;

    /// Parse one CSV cell.
    fn parse(text: &str) -> Option<Self>;

    /// Widen back to f64, for hashing and preview rendering.
    fn widen(self) -> f64;
}

/// Round-then-saturate narrowing shared by all integer kinds.
fn narrow_int<T: Bounded + NumCast + ToPrimitive>(value: f64) -> T {
    if value.is_nan() {
        return NumCast::from(0u8).unwrap_or_else(T::min_value);
    }
    let rounded = value.round();
    let min = T::min_value().to_f64().unwrap_or(f64::MIN);
    let max = T::max_value().to_f64().unwrap_or(f64::MAX);
    if rounded <= min {
        T::min_value()
    } else if rounded >= max {
        T::max_value()
    } else {
        NumCast::from(rounded).unwrap_or_else(T::min_value)
    }
}

macro_rules! integer_elements {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl Element for $t {
            const KIND: ElementKind = ElementKind::$kind;

            fn narrow(value: f64) -> Self {
                narrow_int(value)
            }

            fn parse(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }

            fn widen(self) -> f64 {
                self as f64
            }
        }
    )*};
}

integer_elements! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::Float32;

    fn narrow(value: f64) -> Self {
        value as f32
    }

    fn parse(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    fn widen(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::Float64;

    fn narrow(value: f64) -> Self {
        value
    }

    fn parse(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    fn widen(self) -> f64 {
        self
    }
}

impl Element for f16 {
    const KIND: ElementKind = ElementKind::Float16;

    fn narrow(value: f64) -> Self {
        // f32 intermediate keeps the rounding identical to the f32 path.
        f16::from_f32(value as f32)
    }

    fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<f32>().ok().map(f16::from_f32)
    }

    fn widen(self) -> f64 {
        self.to_f64()
    }
}
