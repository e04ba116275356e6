//! Progress events emitted while applying migrations.
//!
//! The migrator reports what it is doing through a [`MigrationObserver`]
//! instead of owning any terminal output. The CLI renders these events;
//! embedders can ignore them with [`NoopObserver`].

use crate::resource::ResourceRef;

/// A step in applying or rolling back a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    /// A migration file is about to be applied.
    MigrationStarted {
        /// Migration file name.
        name: String,
    },
    /// A resource is being deleted.
    Deleting(ResourceRef),
    /// A resource was deleted.
    Deleted(ResourceRef),
    /// A resource is being created.
    Creating(ResourceRef),
    /// A resource was created.
    Created(ResourceRef),
    /// A create or delete failed.
    StepFailed {
        /// The resource involved.
        resource: ResourceRef,
        /// Failure detail.
        reason: String,
    },
    /// Undoing the steps taken so far.
    RollbackStarted {
        /// Number of registered rollback steps.
        steps: usize,
    },
    /// A rollback step failed.
    RollbackStepFailed {
        /// The resource whose rollback failed.
        resource: ResourceRef,
        /// Failure detail.
        reason: String,
    },
    /// Rollback finished.
    RollbackFinished {
        /// Steps that succeeded.
        succeeded: usize,
        /// Steps that failed.
        failed: usize,
    },
    /// A migration was applied and recorded.
    MigrationSucceeded {
        /// Migration file name.
        name: String,
    },
    /// A migration failed.
    MigrationErrored {
        /// Migration file name.
        name: String,
        /// Failure detail.
        reason: String,
    },
}

impl MigrationEvent {
    /// Check whether this event reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::StepFailed { .. } | Self::RollbackStepFailed { .. } | Self::MigrationErrored { .. }
        )
    }
}

/// Receives [`MigrationEvent`]s.
pub trait MigrationObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &MigrationEvent);
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MigrationObserver for NoopObserver {
    fn on_event(&self, _event: &MigrationEvent) {}
}

impl<F> MigrationObserver for F
where
    F: Fn(&MigrationEvent) + Send + Sync,
{
    fn on_event(&self, event: &MigrationEvent) {
        self(event)
    }
}
