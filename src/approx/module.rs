//! Approximable module kinds and their structural state

use serde::{Deserialize, Serialize};
use std::fmt;

use super::params::{ParamValue, Parameters};

/// Approximation type recorded on modules that have not been approximated.
pub const EXACT: &str = "exact";

/// Kind of attention sub-module an approximation targets.
///
/// The vocabulary is open: kinds outside the built-in set are carried as
/// [`ModuleKind::Other`] and only become usable once an approximation is
/// registered for them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModuleKind {
    /// Attention kernel function (softmax over masked scores)
    Softmax,
    /// Attention mask application
    AttnMasking,
    /// Query-key product and scaling
    QueryKeyProduct,
    /// Whole multi-head attention block
    Multihead,
    /// Any other module name
    Other(String),
}

impl ModuleKind {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleKind::Softmax => "softmax",
            ModuleKind::AttnMasking => "attn_masking",
            ModuleKind::QueryKeyProduct => "query_key_product",
            ModuleKind::Multihead => "multihead",
            ModuleKind::Other(name) => name,
        }
    }
}

impl From<String> for ModuleKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "softmax" => ModuleKind::Softmax,
            "attn_masking" => ModuleKind::AttnMasking,
            "query_key_product" => ModuleKind::QueryKeyProduct,
            "multihead" => ModuleKind::Multihead,
            _ => ModuleKind::Other(value),
        }
    }
}

impl From<&str> for ModuleKind {
    fn from(value: &str) -> Self {
        ModuleKind::from(value.to_string())
    }
}

impl From<ModuleKind> for String {
    fn from(value: ModuleKind) -> Self {
        match value {
            ModuleKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural state of one named sub-module of a model.
///
/// Numeric weights are owned by the model implementation; the slot records
/// which implementation is installed and how it is parameterized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSlot {
    pub kind: ModuleKind,
    /// `"exact"` or the approximation type currently installed
    pub approximation: String,
    #[serde(default)]
    pub parameters: Parameters,
    /// Whether the installed implementation has trainable parameters
    #[serde(default)]
    pub trainable: bool,
}

impl ModuleSlot {
    /// Slot running the exact (unapproximated) computation.
    pub fn exact(kind: ModuleKind) -> Self {
        Self {
            kind,
            approximation: EXACT.to_string(),
            parameters: Parameters::new(),
            trainable: false,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    pub fn is_approximated(&self) -> bool {
        self.approximation != EXACT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_kind_round_trips_through_strings() {
        for name in ["softmax", "attn_masking", "query_key_product", "multihead", "layer_norm"] {
            let kind = ModuleKind::from(name);
            assert_eq!(kind.as_str(), name);
            assert_eq!(String::from(kind), name);
        }
        assert_eq!(ModuleKind::from("layer_norm"), ModuleKind::Other("layer_norm".into()));
    }

    #[test]
    fn test_module_kind_serde_as_plain_string() {
        let json = serde_json::to_string(&ModuleKind::QueryKeyProduct).unwrap();
        assert_eq!(json, "\"query_key_product\"");
        let back: ModuleKind = serde_json::from_str("\"gelu\"").unwrap();
        assert_eq!(back, ModuleKind::Other("gelu".into()));
    }

    #[test]
    fn test_exact_slot() {
        let slot = ModuleSlot::exact(ModuleKind::Softmax);
        assert!(!slot.is_approximated());
        assert!(!slot.trainable);
        let slot = slot.with_param("dim", -1i64);
        assert_eq!(slot.param("dim"), Some(&ParamValue::Int(-1)));
    }
}
