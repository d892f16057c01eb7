pub mod mask;
pub mod padding;
mod recenter;

pub use recenter::{bounding_box, recenter, BoundingBox};

use num_traits::{Bounded, NumCast};
use std::any::TypeId;

fn is_floating_point<T: 'static>() -> bool {
    TypeId::of::<T>() == TypeId::of::<f32>() || TypeId::of::<T>() == TypeId::of::<f64>()
}

/// Value of a fully opaque / fully lit channel: 1.0 for floats, MAX otherwise.
pub fn get_max_value<T: Bounded + NumCast + 'static>() -> T {
    if is_floating_point::<T>() {
        T::from(1.0).unwrap_or_else(T::max_value)
    } else {
        T::max_value()
    }
}
