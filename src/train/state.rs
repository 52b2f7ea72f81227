//! Stage controller state machine

use serde::{Deserialize, Serialize};

/// State of the controller while running one stage.
///
/// ```text
/// Running ⇄ Validating
///    │          │
///    ├──────────┴─→ EarlyStopped
///    ├─→ Completed
///    ├─→ Failed
///    └─→ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Running,
    Validating,
    EarlyStopped,
    Completed,
    Failed,
    Cancelled,
}

impl ControllerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControllerState::EarlyStopped
                | ControllerState::Completed
                | ControllerState::Failed
                | ControllerState::Cancelled
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ControllerState::Running => "Running",
            ControllerState::Validating => "Validating",
            ControllerState::EarlyStopped => "Early stopped",
            ControllerState::Completed => "Completed",
            ControllerState::Failed => "Failed",
            ControllerState::Cancelled => "Cancelled",
        }
    }
}
