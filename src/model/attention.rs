//! Structural transformer-encoder model
//!
//! Each encoder layer owns one multi-head attention block with three
//! customizable parts, mirroring how the attention forward pass is composed:
//! query-key product, then masking, then the kernel (softmax).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Model;
use crate::approx::{ModuleKind, ModuleSlot};
use crate::{Error, Result};

/// Transformer encoder described by its approximable sub-modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionModel {
    /// Model name/identifier
    pub name: String,
    /// Number of training epochs this state has seen
    #[serde(default)]
    pub trained_epochs: usize,
    modules: BTreeMap<String, ModuleSlot>,
}

impl AttentionModel {
    /// Build an encoder with `num_layers` exact attention blocks.
    pub fn transformer(
        name: impl Into<String>,
        num_layers: usize,
        embed_dim: i64,
        num_heads: i64,
    ) -> Self {
        let mut modules = BTreeMap::new();
        for layer in 0..num_layers {
            let prefix = format!("encoder.layers.{layer}.self_attn");
            modules.insert(
                prefix.clone(),
                ModuleSlot::exact(ModuleKind::Multihead)
                    .with_param("embed_dim", embed_dim)
                    .with_param("num_heads", num_heads)
                    .with_param("dropout", 0.1)
                    .with_param("batch_first", true)
                    .with_param("bias", true)
                    .with_param("add_bias_kv", false)
                    .with_param("add_zero_attn", false)
                    .with_param("kdim", embed_dim)
                    .with_param("vdim", embed_dim),
            );
            modules.insert(
                format!("{prefix}.query_key_product"),
                ModuleSlot::exact(ModuleKind::QueryKeyProduct),
            );
            modules.insert(
                format!("{prefix}.attn_masking"),
                ModuleSlot::exact(ModuleKind::AttnMasking)
                    .with_param("attn_mask_value", f64::MIN),
            );
            modules.insert(
                format!("{prefix}.kernel_function"),
                ModuleSlot::exact(ModuleKind::Softmax).with_param("dim", -1i64),
            );
        }
        Self {
            name: name.into(),
            trained_epochs: 0,
            modules,
        }
    }

    /// Empty model, for callers that insert their own modules.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trained_epochs: 0,
            modules: BTreeMap::new(),
        }
    }

    /// Insert (or overwrite) a named module.
    pub fn with_module(mut self, name: impl Into<String>, slot: ModuleSlot) -> Self {
        self.modules.insert(name.into(), slot);
        self
    }

    /// Structural configuration: every module's name and installed slot.
    pub fn modules(&self) -> &BTreeMap<String, ModuleSlot> {
        &self.modules
    }
}

impl Model for AttentionModel {
    fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    fn module(&self, name: &str) -> Option<&ModuleSlot> {
        self.modules.get(name)
    }

    fn replace_module(&mut self, name: &str, slot: ModuleSlot) -> Result<ModuleSlot> {
        match self.modules.get_mut(name) {
            Some(existing) => Ok(std::mem::replace(existing, slot)),
            None => Err(Error::Application {
                module: name.to_string(),
                reason: format!("model '{}' has no such module", self.name),
            }),
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Serialization(format!("Failed to encode model: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Serialization(format!("Failed to decode model: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformer_layout() {
        let model = AttentionModel::transformer("vanilla", 2, 64, 8);
        assert_eq!(model.module_names().len(), 8);
        assert_eq!(model.modules_of_kind(&ModuleKind::Softmax).len(), 2);
        assert_eq!(
            model.modules_of_kind(&ModuleKind::Multihead),
            vec![
                "encoder.layers.0.self_attn".to_string(),
                "encoder.layers.1.self_attn".to_string()
            ]
        );
        assert!(model
            .module_names()
            .iter()
            .all(|n| !model.module(n).unwrap().is_approximated()));
    }

    #[test]
    fn test_replace_module_returns_previous() {
        let mut model = AttentionModel::transformer("vanilla", 1, 16, 2);
        let name = "encoder.layers.0.self_attn.kernel_function";
        let mut slot = ModuleSlot::exact(ModuleKind::Softmax);
        slot.approximation = "polynomial".into();

        let previous = model.replace_module(name, slot).unwrap();
        assert!(!previous.is_approximated());
        assert_eq!(model.module(name).unwrap().approximation, "polynomial");
    }

    #[test]
    fn test_replace_missing_module_fails() {
        let mut model = AttentionModel::empty("bare");
        let err = model
            .replace_module("nope", ModuleSlot::exact(ModuleKind::Softmax))
            .unwrap_err();
        assert!(matches!(err, Error::Application { .. }));
    }

    #[test]
    fn test_encode_decode() {
        let mut model = AttentionModel::transformer("vanilla", 1, 16, 2);
        model.trained_epochs = 7;
        let restored = AttentionModel::decode(&model.encode().unwrap()).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = AttentionModel::decode(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
