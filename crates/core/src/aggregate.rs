//! Aggregate contract for the event-sourced catalog models.

/// Aggregate root: identity plus a version used for optimistic concurrency.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far (equals the stream revision).
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an append.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}

/// Decide/evolve split for aggregates.
///
/// - `handle(&self, cmd)` decides which events happen, without mutating.
/// - `apply(&mut self, event)` evolves state and bumps `version()` by one.
///
/// Neither side may perform IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    /// An empty `Vec` means the command is accepted but changes nothing.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
