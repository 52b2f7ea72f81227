//! Approximation vocabulary and its application to models
//!
//! - [`ApproximationRegistry`]: which `(module, approximation_type)` pairs
//!   exist, their parameter schemas and transforms
//! - [`ApproximationApplier`]: installs a stage's approximations on a model,
//!   all-or-nothing

mod applier;
mod builtin;
mod module;
mod params;
mod registry;

pub use applier::{ApplicationReport, ApproximationApplier};
pub use builtin::register_builtins;
pub use module::{ModuleKind, ModuleSlot, EXACT};
pub use params::{ParamKind, ParamSchema, ParamSpec, ParamValue, ParamViolation, Parameters};
pub use registry::{
    ApproximationForm, ApproximationInfo, ApproximationRegistry, BoundTransform, TransformFn,
};
