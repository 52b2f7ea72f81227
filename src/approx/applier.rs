//! All-or-nothing application of a stage's approximations
//!
//! Application runs in three phases:
//! 1. resolve every spec through the registry,
//! 2. locate every target module and build the replacements on a pending set,
//! 3. commit the pending set, restoring the originals if a commit fails.
//!
//! Nothing is installed on the model until phases 1 and 2 succeed for every
//! spec, so a failing stage never leaves a partial application behind.
//!
//! Same-module conflicts are last-write-wins: when two specs in one stage
//! target the same module, the later replacement is built from the module as
//! it was before the stage and the earlier one is discarded. The two are
//! never composed.

use super::registry::{ApproximationForm, ApproximationRegistry, BoundTransform};
use super::ModuleSlot;
use crate::model::Model;
use crate::stage::ApproximationSpec;
use crate::{Error, Result};

/// Record of what an application installed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationReport {
    /// `(module name, approximation_type)` installed, in commit order
    pub installed: Vec<(String, String)>,
    /// `(module name, overridden spec position, winning spec position)`
    pub overridden: Vec<(String, usize, usize)>,
}

impl ApplicationReport {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}

/// Applies ordered approximation specs to a model.
#[derive(Debug, Clone, Copy)]
pub struct ApproximationApplier<'r> {
    registry: &'r ApproximationRegistry,
    form: ApproximationForm,
}

impl<'r> ApproximationApplier<'r> {
    pub fn new(registry: &'r ApproximationRegistry) -> Self {
        Self {
            registry,
            form: ApproximationForm::Trainable,
        }
    }

    /// Install approximations in the given form.
    ///
    /// [`ApproximationForm::Pretrained`] fails on any target that does not
    /// already carry the requested approximation.
    pub fn with_form(mut self, form: ApproximationForm) -> Self {
        self.form = form;
        self
    }

    pub fn form(&self) -> ApproximationForm {
        self.form
    }

    /// Resolve every spec without touching any model.
    pub fn resolve_all(&self, specs: &[ApproximationSpec]) -> Result<Vec<BoundTransform>> {
        specs
            .iter()
            .map(|spec| {
                self.registry
                    .resolve(&spec.module, &spec.approximation_type, &spec.parameters)
            })
            .collect()
    }

    /// Apply `specs` in order.
    ///
    /// On error `model` is left exactly as it was.
    pub fn apply<M: Model>(
        &self,
        model: &mut M,
        specs: &[ApproximationSpec],
    ) -> Result<ApplicationReport> {
        let bound = self.resolve_all(specs)?;

        // (module name, replacement, spec position)
        let mut pending: Vec<(String, ModuleSlot, usize)> = Vec::new();
        let mut report = ApplicationReport::default();

        for (position, transform) in bound.iter().enumerate() {
            let targets = model.modules_of_kind(transform.module());
            if targets.is_empty() {
                return Err(Error::Application {
                    module: transform.module().to_string(),
                    reason: format!(
                        "model has no '{}' module (spec #{position}: {})",
                        transform.module(),
                        specs[position].label()
                    ),
                });
            }

            for name in targets {
                let current = model.module(&name).ok_or_else(|| Error::Application {
                    module: name.clone(),
                    reason: "module disappeared during application".to_string(),
                })?;
                let replacement = transform.apply(&name, current, self.form)?;

                match pending.iter_mut().find(|(pending_name, _, _)| *pending_name == name) {
                    Some(entry) => {
                        tracing::warn!(
                            module = %name,
                            overridden = %specs[entry.2].label(),
                            winner = %specs[position].label(),
                            "later approximation replaces an earlier one on the same module"
                        );
                        report.overridden.push((name.clone(), entry.2, position));
                        entry.1 = replacement;
                        entry.2 = position;
                    }
                    None => pending.push((name, replacement, position)),
                }
            }
        }

        let mut committed: Vec<(String, ModuleSlot)> = Vec::with_capacity(pending.len());
        for (name, slot, position) in pending {
            let approximation = slot.approximation.clone();
            match model.replace_module(&name, slot) {
                Ok(previous) => {
                    tracing::debug!(module = %name, %approximation, spec = position, "installed approximation");
                    committed.push((name.clone(), previous));
                    report.installed.push((name, approximation));
                }
                Err(err) => {
                    rollback(model, committed);
                    return Err(err);
                }
            }
        }

        Ok(report)
    }
}

fn rollback<M: Model>(model: &mut M, committed: Vec<(String, ModuleSlot)>) {
    for (name, previous) in committed.into_iter().rev() {
        if let Err(err) = model.replace_module(&name, previous) {
            tracing::error!(module = %name, error = %err, "failed to restore module during rollback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approx::{ModuleKind, ParamSchema, ParamValue, Parameters};
    use crate::model::AttentionModel;

    const SOFTMAX: &str = "encoder.layers.0.self_attn.kernel_function";

    fn polynomial(order: i64) -> ApproximationSpec {
        ApproximationSpec::new("softmax", "polynomial").with_param("order", order)
    }

    #[test]
    fn test_apply_installs_in_order() {
        let registry = ApproximationRegistry::with_builtins();
        let mut model = AttentionModel::transformer("m", 2, 32, 4);
        let specs = vec![
            polynomial(2),
            ApproximationSpec::new("query_key_product", "not_scaled"),
        ];

        let report = ApproximationApplier::new(&registry)
            .apply(&mut model, &specs)
            .unwrap();

        assert_eq!(report.installed.len(), 4);
        assert!(report.overridden.is_empty());
        for name in model.modules_of_kind(&ModuleKind::Softmax) {
            let slot = model.module(&name).unwrap();
            assert_eq!(slot.approximation, "polynomial");
            assert!(slot.trainable);
        }
        for name in model.modules_of_kind(&ModuleKind::QueryKeyProduct) {
            assert_eq!(model.module(&name).unwrap().approximation, "not_scaled");
        }
    }

    #[test]
    fn test_last_write_wins_on_same_module() {
        let registry = ApproximationRegistry::with_builtins();
        let mut model = AttentionModel::transformer("m", 1, 32, 4);

        let report = ApproximationApplier::new(&registry)
            .apply(&mut model, &[polynomial(2), polynomial(4)])
            .unwrap();

        let slot = model.module(SOFTMAX).unwrap();
        assert_eq!(slot.param("order"), Some(&ParamValue::Int(4)));
        assert_eq!(report.installed.len(), 1);
        assert_eq!(report.overridden, vec![(SOFTMAX.to_string(), 0, 1)]);
    }

    #[test]
    fn test_later_spec_does_not_compose_with_earlier() {
        let mut registry = ApproximationRegistry::with_builtins();
        // Records the approximation it was built on top of.
        registry.register(
            ModuleKind::Softmax,
            "tagging",
            ParamSchema::empty(),
            |current, _| {
                let mut params = Parameters::new();
                params.insert("built_on".into(), ParamValue::Str(current.approximation.clone()));
                Ok(ModuleSlot {
                    kind: current.kind.clone(),
                    approximation: String::new(),
                    parameters: params,
                    trainable: false,
                })
            },
        );
        let mut model = AttentionModel::transformer("m", 1, 32, 4);
        let specs = vec![polynomial(2), ApproximationSpec::new("softmax", "tagging")];

        ApproximationApplier::new(&registry)
            .apply(&mut model, &specs)
            .unwrap();

        let slot = model.module(SOFTMAX).unwrap();
        assert_eq!(slot.approximation, "tagging");
        assert_eq!(slot.param("built_on"), Some(&ParamValue::Str("exact".into())));
        assert!(slot.param("order").is_none());
    }

    #[test]
    fn test_missing_module_leaves_model_untouched() {
        let registry = ApproximationRegistry::with_builtins();
        let original = AttentionModel::empty("bare").with_module(
            "kernel",
            ModuleSlot::exact(ModuleKind::Softmax),
        );
        let mut model = original.clone();
        let specs = vec![
            polynomial(3),
            ApproximationSpec::new("query_key_product", "not_scaled"),
        ];

        let err = ApproximationApplier::new(&registry)
            .apply(&mut model, &specs)
            .unwrap_err();

        assert!(matches!(err, Error::Application { ref module, .. } if module == "query_key_product"));
        assert_eq!(model, original);
    }

    #[test]
    fn test_unknown_approximation_fails_before_mutation() {
        let registry = ApproximationRegistry::with_builtins();
        let original = AttentionModel::transformer("m", 1, 32, 4);
        let mut model = original.clone();
        let specs = vec![polynomial(3), ApproximationSpec::new("softmax", "taylor")];

        let err = ApproximationApplier::new(&registry)
            .apply(&mut model, &specs)
            .unwrap_err();

        assert!(matches!(err, Error::UnknownApproximation { .. }));
        assert_eq!(model, original);
    }

    #[test]
    fn test_failing_transform_leaves_model_untouched() {
        let registry = ApproximationRegistry::with_builtins();
        let original = AttentionModel::transformer("m", 1, 30, 3);
        let mut model = original.clone();
        let specs = vec![
            polynomial(3),
            ApproximationSpec::new("multihead", "customizable_multihead").with_param("num_heads", 4i64),
        ];

        let err = ApproximationApplier::new(&registry)
            .apply(&mut model, &specs)
            .unwrap_err();

        assert!(matches!(err, Error::Application { .. }));
        assert_eq!(model, original);
    }

    #[test]
    fn test_resolution_is_structurally_idempotent() {
        let registry = ApproximationRegistry::with_builtins();
        let specs = vec![
            polynomial(2),
            ApproximationSpec::new("attn_masking", "multiplicative"),
            ApproximationSpec::new("multihead", "customizable_multihead"),
        ];
        let applier = ApproximationApplier::new(&registry);

        let mut a = AttentionModel::transformer("m", 3, 32, 4);
        let mut b = a.clone();
        applier.apply(&mut a, &specs).unwrap();
        applier.apply(&mut b, &specs).unwrap();
        assert_eq!(a.modules(), b.modules());
    }

    #[test]
    fn test_pretrained_form_rejects_fresh_model() {
        let registry = ApproximationRegistry::with_builtins();
        let original = AttentionModel::transformer("m", 2, 32, 4);
        let mut model = original.clone();

        let err = ApproximationApplier::new(&registry)
            .with_form(ApproximationForm::Pretrained)
            .apply(&mut model, &[polynomial(2)])
            .unwrap_err();

        assert!(matches!(err, Error::Application { .. }));
        assert_eq!(model, original);
    }

    #[test]
    fn test_pretrained_form_keeps_trained_modules() {
        let registry = ApproximationRegistry::with_builtins();
        let mut model = AttentionModel::transformer("m", 2, 32, 4);
        let specs = vec![ApproximationSpec::new("multihead", "customizable_multihead")];
        ApproximationApplier::new(&registry)
            .apply(&mut model, &specs)
            .unwrap();
        let trained = model.clone();

        let pretrained = ApproximationApplier::new(&registry).with_form(ApproximationForm::Pretrained);
        assert_eq!(pretrained.form(), ApproximationForm::Pretrained);
        let report = pretrained.apply(&mut model, &specs).unwrap();

        assert_eq!(report.installed.len(), 2);
        assert_eq!(model, trained);
    }

    #[test]
    fn test_empty_specs_is_noop() {
        let registry = ApproximationRegistry::with_builtins();
        let original = AttentionModel::transformer("m", 1, 32, 4);
        let mut model = original.clone();
        let report = ApproximationApplier::new(&registry)
            .apply(&mut model, &[])
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(model, original);
    }
}
