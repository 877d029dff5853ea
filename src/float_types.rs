//! Floating point type selection.
//!
//! `Real` follows the `f64` (default) or `f32` feature, and the matching
//! parry flavor is re-exported as `parry3d` so the rest of the crate can name
//! it without caring which one is compiled in.

#[cfg(all(feature = "f64", feature = "f32"))]
compile_error!("features `f64` and `f32` are mutually exclusive");

#[cfg(not(any(feature = "f64", feature = "f32")))]
compile_error!("one of the features `f64` or `f32` must be enabled");

#[cfg(feature = "f64")]
pub type Real = f64;
#[cfg(feature = "f32")]
pub type Real = f32;

#[cfg(feature = "f64")]
pub use parry3d_f64 as parry3d;
#[cfg(feature = "f32")]
pub use ::parry3d;

/// Default tolerance used to decide whether a point lies on a plane.
pub const EPSILON: Real = 1e-5;

#[cfg(feature = "f64")]
pub const PI: Real = core::f64::consts::PI;
#[cfg(feature = "f32")]
pub const PI: Real = core::f32::consts::PI;

#[cfg(feature = "f64")]
pub const TAU: Real = core::f64::consts::TAU;
#[cfg(feature = "f32")]
pub const TAU: Real = core::f32::consts::TAU;
