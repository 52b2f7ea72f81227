//! Built-in attention approximations
//!
//! | module              | approximation_type       | trainable |
//! |---------------------|--------------------------|-----------|
//! | `softmax`           | `polynomial`             | yes       |
//! | `attn_masking`      | `multiplicative`         | no        |
//! | `query_key_product` | `not_scaled`             | no        |
//! | `multihead`         | `customizable_multihead` | yes       |
//!
//! Only the structural replacement is described here; the numeric kernels
//! belong to the model implementation.

use super::module::{ModuleKind, ModuleSlot};
use super::params::{ParamSchema, ParamSpec, ParamValue, Parameters};
use super::registry::ApproximationRegistry;
#[cfg(test)]
use super::registry::ApproximationForm;

/// Multi-head attributes a `customizable_multihead` inherits from the block it
/// replaces when they are not overridden.
const MULTIHEAD_INHERITED: [&str; 9] = [
    "embed_dim",
    "num_heads",
    "dropout",
    "batch_first",
    "bias",
    "add_bias_kv",
    "add_zero_attn",
    "kdim",
    "vdim",
];

impl ApproximationRegistry {
    /// Registry pre-populated with the built-in attention approximations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }
}

/// Register the built-in approximations into `registry`.
pub fn register_builtins(registry: &mut ApproximationRegistry) {
    registry.register_trainable(
        ModuleKind::Softmax,
        "polynomial",
        ParamSchema::empty()
            .with(ParamSpec::int("order").min(1.0).required())
            .with(ParamSpec::bool("skip_normalization").default_value(false)),
        replace_with_params,
    );

    registry.register(
        ModuleKind::AttnMasking,
        "multiplicative",
        ParamSchema::empty().with(ParamSpec::float("attn_mask_value").default_value(0.0)),
        replace_with_params,
    );

    registry.register(
        ModuleKind::QueryKeyProduct,
        "not_scaled",
        ParamSchema::empty(),
        replace_with_params,
    );

    registry.register_trainable(
        ModuleKind::Multihead,
        "customizable_multihead",
        ParamSchema::empty()
            .with(ParamSpec::int("embed_dim").min(1.0))
            .with(ParamSpec::int("num_heads").min(1.0))
            .with(ParamSpec::float("dropout").min(0.0).max(1.0))
            .with(ParamSpec::bool("batch_first"))
            .with(ParamSpec::bool("bias"))
            .with(ParamSpec::bool("add_bias_kv"))
            .with(ParamSpec::bool("add_zero_attn"))
            .with(ParamSpec::int("kdim").min(1.0))
            .with(ParamSpec::int("vdim").min(1.0)),
        customizable_multihead,
    );
}

/// Replace the module wholesale; the new slot carries only the approximation's
/// own parameters.
fn replace_with_params(current: &ModuleSlot, params: &Parameters) -> Result<ModuleSlot, String> {
    Ok(ModuleSlot {
        kind: current.kind.clone(),
        approximation: String::new(),
        parameters: params.clone(),
        trainable: false,
    })
}

fn customizable_multihead(current: &ModuleSlot, params: &Parameters) -> Result<ModuleSlot, String> {
    let mut merged = Parameters::new();
    for key in MULTIHEAD_INHERITED {
        if let Some(value) = params.get(key).or_else(|| current.param(key)) {
            merged.insert(key.to_string(), value.clone());
        }
    }

    if let (Some(embed_dim), Some(num_heads)) = (
        merged.get("embed_dim").and_then(ParamValue::as_int),
        merged.get("num_heads").and_then(ParamValue::as_int),
    ) {
        if num_heads <= 0 || embed_dim % num_heads != 0 {
            return Err(format!(
                "embed_dim {embed_dim} is not divisible by num_heads {num_heads}"
            ));
        }
    }

    Ok(ModuleSlot {
        kind: current.kind.clone(),
        approximation: String::new(),
        parameters: merged,
        trainable: true,
    })
}
