//! Finite state machine for drivers with configurable acquisition

use serde::{Deserialize, Serialize};

/// Acquisition state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionState {
    /// No transaction in flight, configuration applied
    Idle,

    /// Configuration changed, not yet written to the device
    Configuring,

    /// Transaction in flight
    Reading,
}

/// Acquisition event
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    /// Gain, integration time or similar changed
    Configure,

    /// Start a read transaction
    BeginRead,

    /// Read finished
    Complete,

    /// Read failed
    Fail(String),
}

/// Acquisition FSM
#[derive(Debug, Clone)]
pub struct AcquisitionFsm {
    state: AcquisitionState,
    error: Option<String>,
    reads: u64,
}

impl AcquisitionFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: AcquisitionState::Idle,
            error: None,
            reads: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Error of the last failed read, cleared by the next successful one
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Completed reads
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// True when configuration must be written before the next read
    pub fn has_pending_config(&self) -> bool {
        self.state == AcquisitionState::Configuring
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: AcquisitionEvent) -> Result<(), String> {
        let new_state = match (self.state, &event) {
            (AcquisitionState::Idle, AcquisitionEvent::Configure) => AcquisitionState::Configuring,
            (AcquisitionState::Configuring, AcquisitionEvent::Configure) => {
                AcquisitionState::Configuring
            }

            (AcquisitionState::Idle, AcquisitionEvent::BeginRead)
            | (AcquisitionState::Configuring, AcquisitionEvent::BeginRead) => {
                AcquisitionState::Reading
            }

            (AcquisitionState::Reading, AcquisitionEvent::Complete) => {
                self.error = None;
                self.reads += 1;
                AcquisitionState::Idle
            }
            (AcquisitionState::Reading, AcquisitionEvent::Fail(err)) => {
                self.error = Some(err.clone());
                AcquisitionState::Idle
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for AcquisitionFsm {
    fn default() -> Self {
        Self::new()
    }
}
