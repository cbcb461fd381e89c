//! Restoration state machine using rust-fsm.
//!
//! ```text
//! Idle ──Begin──► InProgress ──Succeeded──► Restored
//!                     │
//!                     └──────Failed──────► NotRestored
//! ```
//!
//! Both terminal states are final for the process lifetime. A later sign-out
//! does not move the machine.

use rust_fsm::*;
use serde::Serialize;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub restoration_machine(Idle)

    Idle => {
        Begin => InProgress
    },
    InProgress => {
        Succeeded => Restored,
        Failed => NotRestored
    }
}

pub use restoration_machine::Input as RestorationInput;
pub use restoration_machine::State as RestorationMachineState;
pub use restoration_machine::StateMachine as RestorationMachine;

/// Externally visible restoration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorationPhase {
    /// No attempt has been made yet.
    Idle,
    /// The restoration sequence is running.
    InProgress,
    /// A session was present or recovered.
    Restored,
    /// Nothing could be recovered.
    NotRestored,
}

impl RestorationPhase {
    pub fn is_settled(&self) -> bool {
        matches!(self, RestorationPhase::Restored | RestorationPhase::NotRestored)
    }
}

impl From<&RestorationMachineState> for RestorationPhase {
    fn from(state: &RestorationMachineState) -> Self {
        match state {
            RestorationMachineState::Idle => RestorationPhase::Idle,
            RestorationMachineState::InProgress => RestorationPhase::InProgress,
            RestorationMachineState::Restored => RestorationPhase::Restored,
            RestorationMachineState::NotRestored => RestorationPhase::NotRestored,
        }
    }
}
