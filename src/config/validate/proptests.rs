//! Property-based tests for configuration validation

use super::error::ValidationError;
use super::validator::validate_training_args;
use crate::config::schema::TrainingArgs;
use proptest::prelude::*;

fn arb_valid_args() -> impl Strategy<Value = TrainingArgs> {
    (
        1usize..200,                        // max_epochs
        1usize..20,                         // check_val_every_n_epoch (scaled below)
        proptest::option::of(0usize..10),   // early stopping patience
        any::<bool>(),                      // checkpoint by metric
    )
        .prop_map(|(max_epochs, every, patience, ckpt)| {
            let mut args = TrainingArgs::new(max_epochs);
            args.check_val_every_n_epoch = every.min(max_epochs);
            if let Some(patience) = patience {
                args.early_stopping = true;
                args.early_stopping_monitor = Some("val_loss".to_string());
                args.early_stopping_patience = Some(patience);
            }
            if ckpt {
                args.ckpt_monitor = Some("val_acc".to_string());
            }
            args
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_args_pass(args in arb_valid_args()) {
        let policy = validate_training_args(0, &args).unwrap();
        prop_assert_eq!(policy.max_epochs, args.max_epochs);
        prop_assert_eq!(policy.early_stopping.is_some(), args.early_stopping);
        prop_assert_eq!(policy.checkpoint.is_some(), args.ckpt_monitor.is_some());
    }

    #[test]
    fn prop_policy_roundtrips_through_document(args in arb_valid_args()) {
        let policy = validate_training_args(0, &args).unwrap();
        let again = validate_training_args(0, &TrainingArgs::from_policy(&policy)).unwrap();
        prop_assert_eq!(policy, again);
    }

    #[test]
    fn prop_zero_max_epochs_rejected(stage in any::<i64>()) {
        prop_assert_eq!(
            validate_training_args(stage, &TrainingArgs::new(0)),
            Err(ValidationError::InvalidMaxEpochs { stage })
        );
    }
}
