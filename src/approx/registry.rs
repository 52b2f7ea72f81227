//! Capability registry keyed by `(module, approximation_type)`
//!
//! New approximations register here without touching the applier, the
//! controller or the driver.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::module::{ModuleKind, ModuleSlot};
use super::params::{ParamSchema, Parameters};
use crate::{Error, Result};

/// Transformation installed by an approximation.
///
/// Receives the module being replaced and the validated parameters, and
/// returns the approximated module or a reason why it cannot be built.
pub type TransformFn =
    dyn Fn(&ModuleSlot, &Parameters) -> std::result::Result<ModuleSlot, String> + Send + Sync;

struct RegistryEntry {
    schema: ParamSchema,
    trainable: bool,
    transform: Arc<TransformFn>,
}

/// Public view of one registered approximation.
#[derive(Debug, Clone)]
pub struct ApproximationInfo<'a> {
    pub module: &'a ModuleKind,
    pub approximation_type: &'a str,
    pub schema: &'a ParamSchema,
    pub trainable: bool,
}

/// Maps `(module, approximation_type)` to a schema and a transform.
#[derive(Default)]
pub struct ApproximationRegistry {
    entries: BTreeMap<(ModuleKind, String), RegistryEntry>,
}

impl ApproximationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an approximation whose result has no trainable parameters.
    ///
    /// Registering an existing pair replaces the previous entry.
    pub fn register<F>(
        &mut self,
        module: ModuleKind,
        approximation_type: impl Into<String>,
        schema: ParamSchema,
        transform: F,
    ) -> &mut Self
    where
        F: Fn(&ModuleSlot, &Parameters) -> std::result::Result<ModuleSlot, String>
            + Send
            + Sync
            + 'static,
    {
        self.insert(module, approximation_type.into(), schema, false, Arc::new(transform))
    }

    /// Register an approximation whose result carries trainable parameters.
    pub fn register_trainable<F>(
        &mut self,
        module: ModuleKind,
        approximation_type: impl Into<String>,
        schema: ParamSchema,
        transform: F,
    ) -> &mut Self
    where
        F: Fn(&ModuleSlot, &Parameters) -> std::result::Result<ModuleSlot, String>
            + Send
            + Sync
            + 'static,
    {
        self.insert(module, approximation_type.into(), schema, true, Arc::new(transform))
    }

    fn insert(
        &mut self,
        module: ModuleKind,
        approximation_type: String,
        schema: ParamSchema,
        trainable: bool,
        transform: Arc<TransformFn>,
    ) -> &mut Self {
        self.entries.insert(
            (module, approximation_type),
            RegistryEntry {
                schema,
                trainable,
                transform,
            },
        );
        self
    }

    /// Whether any approximation is registered for `module`.
    pub fn knows_module(&self, module: &ModuleKind) -> bool {
        self.entries.keys().any(|(m, _)| m == module)
    }

    /// Registered module kinds, deduplicated and sorted.
    pub fn modules(&self) -> Vec<&ModuleKind> {
        let mut modules: Vec<&ModuleKind> = self.entries.keys().map(|(m, _)| m).collect();
        modules.dedup();
        modules
    }

    /// All registered approximations in deterministic order.
    pub fn entries(&self) -> impl Iterator<Item = ApproximationInfo<'_>> {
        self.entries.iter().map(|((module, ty), entry)| ApproximationInfo {
            module,
            approximation_type: ty,
            schema: &entry.schema,
            trainable: entry.trainable,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a spec into a bound transform.
    ///
    /// Pure: the same inputs always produce an equivalent transform.
    pub fn resolve(
        &self,
        module: &ModuleKind,
        approximation_type: &str,
        parameters: &Parameters,
    ) -> Result<BoundTransform> {
        let entry = self
            .entries
            .get(&(module.clone(), approximation_type.to_string()))
            .ok_or_else(|| Error::UnknownApproximation {
                module: module.to_string(),
                approximation_type: approximation_type.to_string(),
            })?;

        let parameters =
            entry
                .schema
                .validate(parameters)
                .map_err(|violation| Error::InvalidParameter {
                    module: module.to_string(),
                    approximation_type: approximation_type.to_string(),
                    parameter: violation.parameter,
                    reason: violation.reason,
                })?;

        Ok(BoundTransform {
            module: module.clone(),
            approximation_type: approximation_type.to_string(),
            parameters,
            trainable: entry.trainable,
            transform: Arc::clone(&entry.transform),
        })
    }
}

impl fmt::Debug for ApproximationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.keys().map(|(m, t)| format!("{m}/{t}")))
            .finish()
    }
}

/// Which form of an approximation to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApproximationForm {
    /// Built fresh from the module it replaces, ready for retraining
    #[default]
    Trainable,
    /// An approximation already installed and trained, kept as is
    Pretrained,
}

/// A resolved approximation ready to be applied to a module.
#[derive(Clone)]
pub struct BoundTransform {
    module: ModuleKind,
    approximation_type: String,
    parameters: Parameters,
    trainable: bool,
    transform: Arc<TransformFn>,
}

impl BoundTransform {
    pub fn module(&self) -> &ModuleKind {
        &self.module
    }

    pub fn approximation_type(&self) -> &str {
        &self.approximation_type
    }

    /// Validated parameters with schema defaults filled in.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn trainable(&self) -> bool {
        self.trainable
    }

    /// Build the replacement for `current` in the requested form.
    ///
    /// The trainable form is built from the module being replaced. The
    /// pretrained form keeps an installed approximation as it was trained, so
    /// `current` must already be this approximation.
    pub fn apply(
        &self,
        name: &str,
        current: &ModuleSlot,
        form: ApproximationForm,
    ) -> Result<ModuleSlot> {
        match form {
            ApproximationForm::Trainable => self.trainable_form(name, current),
            ApproximationForm::Pretrained => self.pretrained_form(name, current),
        }
    }

    fn pretrained_form(&self, name: &str, current: &ModuleSlot) -> Result<ModuleSlot> {
        if current.kind != self.module || current.approximation != self.approximation_type {
            return Err(Error::Application {
                module: name.to_string(),
                reason: format!(
                    "pretrained form needs an installed {}/{} approximation, found {}/{}",
                    self.module, self.approximation_type, current.kind, current.approximation
                ),
            });
        }
        Ok(current.clone())
    }

    /// Every slot it returns records this transform's module kind,
    /// approximation type and trainability.
    fn trainable_form(&self, name: &str, current: &ModuleSlot) -> Result<ModuleSlot> {
        let mut slot =
            (self.transform)(current, &self.parameters).map_err(|reason| Error::Application {
                module: name.to_string(),
                reason,
            })?;
        slot.kind = self.module.clone();
        slot.approximation = self.approximation_type.clone();
        slot.trainable = self.trainable;
        Ok(slot)
    }
}

impl PartialEq for BoundTransform {
    /// Transforms are equivalent when they resolve the same pair with the
    /// same normalized parameters.
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module
            && self.approximation_type == other.approximation_type
            && self.parameters == other.parameters
            && self.trainable == other.trainable
    }
}

impl fmt::Debug for BoundTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTransform")
            .field("module", &self.module)
            .field("approximation_type", &self.approximation_type)
            .field("parameters", &self.parameters)
            .field("trainable", &self.trainable)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::params::{ParamSpec, ParamValue};

    fn registry() -> ApproximationRegistry {
        let mut registry = ApproximationRegistry::new();
        registry.register_trainable(
            ModuleKind::Softmax,
            "polynomial",
            ParamSchema::empty().with(ParamSpec::int("order").min(1.0).required()),
            |_, params| Ok(ModuleSlot::exact(ModuleKind::Softmax).with_param("order", params["order"].clone())),
        );
        registry.register(
            ModuleKind::QueryKeyProduct,
            "not_scaled",
            ParamSchema::empty(),
            |current, _| Ok(current.clone()),
        );
        registry
    }

    fn order(n: i64) -> Parameters {
        let mut p = Parameters::new();
        p.insert("order".into(), ParamValue::Int(n));
        p
    }

    #[test]
    fn test_resolve_known_pair() {
        let bound = registry()
            .resolve(&ModuleKind::Softmax, "polynomial", &order(2))
            .unwrap();
        assert_eq!(bound.module(), &ModuleKind::Softmax);
        assert_eq!(bound.approximation_type(), "polynomial");
        assert!(bound.trainable());
        assert_eq!(bound.parameters()["order"], ParamValue::Int(2));
    }

    #[test]
    fn test_resolve_unknown_pair() {
        let err = registry()
            .resolve(&ModuleKind::Softmax, "taylor", &Parameters::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownApproximation { .. }));

        let err = registry()
            .resolve(&ModuleKind::Other("layer_norm".into()), "polynomial", &order(2))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownApproximation { ref module, .. } if module == "layer_norm"));
    }

    #[test]
    fn test_resolve_invalid_parameter() {
        let err = registry()
            .resolve(&ModuleKind::Softmax, "polynomial", &order(0))
            .unwrap_err();
        match err {
            Error::InvalidParameter {
                module,
                approximation_type,
                parameter,
                ..
            } => {
                assert_eq!(module, "softmax");
                assert_eq!(approximation_type, "polynomial");
                assert_eq!(parameter, "order");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = registry();
        let a = registry.resolve(&ModuleKind::Softmax, "polynomial", &order(4)).unwrap();
        let b = registry.resolve(&ModuleKind::Softmax, "polynomial", &order(4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_apply_stamps_identity() {
        let registry = registry();
        let bound = registry
            .resolve(&ModuleKind::QueryKeyProduct, "not_scaled", &Parameters::new())
            .unwrap();
        let slot = bound
            .apply(
                "attn.query_key_product",
                &ModuleSlot::exact(ModuleKind::QueryKeyProduct),
                ApproximationForm::Trainable,
            )
            .unwrap();
        assert_eq!(slot.approximation, "not_scaled");
        assert!(!slot.trainable);
    }

    #[test]
    fn test_pretrained_form_keeps_installed_approximation() {
        let registry = registry();
        let bound = registry
            .resolve(&ModuleKind::Softmax, "polynomial", &order(2))
            .unwrap();
        let mut installed = ModuleSlot::exact(ModuleKind::Softmax).with_param("order", 7i64);
        installed.approximation = "polynomial".into();
        installed.trainable = true;

        let slot = bound
            .apply("kernel", &installed, ApproximationForm::Pretrained)
            .unwrap();
        // Trained state is kept, not rebuilt from the spec
        assert_eq!(slot, installed);
    }

    #[test]
    fn test_pretrained_form_rejects_exact_module() {
        let registry = registry();
        let bound = registry
            .resolve(&ModuleKind::Softmax, "polynomial", &order(2))
            .unwrap();
        let err = bound
            .apply(
                "kernel",
                &ModuleSlot::exact(ModuleKind::Softmax),
                ApproximationForm::Pretrained,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Application { ref module, ref reason }
            if module == "kernel" && reason.contains("softmax/exact")));
    }

    #[test]
    fn test_modules_listing() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.knows_module(&ModuleKind::Softmax));
        assert!(!registry.knows_module(&ModuleKind::Multihead));
        assert_eq!(
            registry.modules(),
            vec![&ModuleKind::Softmax, &ModuleKind::QueryKeyProduct]
        );
    }
}
