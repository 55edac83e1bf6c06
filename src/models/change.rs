//! Detected schedule differences.

use std::fmt;

use super::Event;

/// Kind of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        })
    }
}

/// One difference between a baseline and a fresh fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(Event),
    Removed(Event),
    Modified { new: Event, old: Event },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Added(_) => ChangeKind::Added,
            Change::Removed(_) => ChangeKind::Removed,
            Change::Modified { .. } => ChangeKind::Modified,
        }
    }

    /// The event to present: the new one, or the old one for removals.
    pub fn event(&self) -> &Event {
        match self {
            Change::Added(event) | Change::Removed(event) => event,
            Change::Modified { new, .. } => new,
        }
    }

    /// The superseded event, if any.
    pub fn old_event(&self) -> Option<&Event> {
        match self {
            Change::Added(_) => None,
            Change::Removed(event) => Some(event),
            Change::Modified { old, .. } => Some(old),
        }
    }
}
