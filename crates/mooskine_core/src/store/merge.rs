//! Field-level conflict resolution between contexts.
//!
//! A pending edit conflicts when the stored value moved away from the value
//! the edit was based on. The context's policy picks a winner, both when it
//! saves and when it merges another context's save.

/// Per-context conflict rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// In-memory pending edits win over stored values.
    ObjectTrump,
    /// Stored values win over in-memory pending edits.
    StoreTrump,
}

/// Outcome for one conflicting field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    KeepPending,
    TakeStored,
}

impl MergePolicy {
    pub(crate) fn resolve(self) -> Resolution {
        match self {
            Self::ObjectTrump => Resolution::KeepPending,
            Self::StoreTrump => Resolution::TakeStored,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ObjectTrump => "object_trump",
            Self::StoreTrump => "store_trump",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MergePolicy, Resolution};

    #[test]
    fn object_trump_keeps_pending_edit() {
        assert_eq!(MergePolicy::ObjectTrump.resolve(), Resolution::KeepPending);
    }

    #[test]
    fn store_trump_takes_stored_value() {
        assert_eq!(MergePolicy::StoreTrump.resolve(), Resolution::TakeStored);
    }
}
