//! Model abstraction consumed by the pipeline
//!
//! The pipeline never looks inside numeric kernels. It needs three
//! capabilities from a model:
//! - enumerate and look up named sub-modules,
//! - replace a sub-module with an approximated variant,
//! - encode/decode itself for checkpointing.

mod attention;

pub use attention::AttentionModel;

use crate::approx::{ModuleKind, ModuleSlot};
use crate::Result;

/// A model whose attention sub-modules can be approximated.
pub trait Model: Sized {
    /// Names of all approximable sub-modules, in a stable order.
    fn module_names(&self) -> Vec<String>;

    /// Look up a sub-module by name.
    fn module(&self, name: &str) -> Option<&ModuleSlot>;

    /// Replace the named sub-module, returning the previous one.
    ///
    /// Ownership of the sub-module moves to the model; the caller receives
    /// the replaced implementation.
    fn replace_module(&mut self, name: &str, slot: ModuleSlot) -> Result<ModuleSlot>;

    /// Serialize the full model state for a checkpoint.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Restore a model from [`Model::encode`] output.
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Names of the sub-modules of the given kind.
    fn modules_of_kind(&self, kind: &ModuleKind) -> Vec<String> {
        self.module_names()
            .into_iter()
            .filter(|name| self.module(name).is_some_and(|slot| &slot.kind == kind))
            .collect()
    }
}
