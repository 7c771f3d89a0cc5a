//! Result diffing: compare two evaluations of the same view.

use std::collections::HashMap;

use vista_types::ObjectKey;

/// How a view's key sequence changed between two evaluations.
///
/// Indices in `deletions` refer to the old sequence, indices in `insertions`
/// to the new one. `moved` holds `(old index, new index)` pairs for keys that
/// are in both sequences but changed position relative to each other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewChange {
    pub insertions: Vec<usize>,
    pub deletions: Vec<usize>,
    pub moved: Vec<(usize, usize)>,
}

impl ViewChange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the sequences were identical.
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.moved.is_empty()
    }

    /// Total number of reported changes.
    pub fn len(&self) -> usize {
        self.insertions.len() + self.deletions.len() + self.moved.len()
    }
}

/// Compute the change from `old` to `new`.
///
/// Keys only in `old` are deletions, keys only in `new` are insertions. Of
/// the keys in both, those whose rank among surviving keys differs are
/// reported as moved.
pub fn diff_keys(old: &[ObjectKey], new: &[ObjectKey]) -> ViewChange {
    if old == new {
        return ViewChange::new();
    }

    let old_pos: HashMap<ObjectKey, usize> = old.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    let new_pos: HashMap<ObjectKey, usize> = new.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let deletions = old
        .iter()
        .enumerate()
        .filter(|(_, k)| !new_pos.contains_key(*k))
        .map(|(i, _)| i)
        .collect();
    let insertions = new
        .iter()
        .enumerate()
        .filter(|(_, k)| !old_pos.contains_key(*k))
        .map(|(i, _)| i)
        .collect();

    let survivors_old: Vec<ObjectKey> = old.iter().filter(|k| new_pos.contains_key(*k)).copied().collect();
    let survivors_new: Vec<ObjectKey> = new.iter().filter(|k| old_pos.contains_key(*k)).copied().collect();
    let moved = survivors_old
        .iter()
        .zip(&survivors_new)
        .filter(|(a, b)| a != b)
        .map(|(a, _)| (old_pos[a], new_pos[a]))
        .collect();

    ViewChange {
        insertions,
        deletions,
        moved,
    }
}
