//! Identifier generation for runs and checkpoints.

use uuid::Uuid;

/// Generates prefixed, collision-free identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Identifier for one `execute` call.
    #[must_use]
    pub fn run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }

    /// Identifier for a persisted checkpoint.
    #[must_use]
    pub fn checkpoint_id(&self) -> String {
        format!("ckpt-{}", Uuid::new_v4())
    }
}
