//! Bidirectional mapping between face profile ids and index positions.

use std::collections::HashMap;

use crate::error::IdentityError;
use crate::ProfileId;

/// `ProfileId <-> position` bijection.
///
/// Positions are dense (`0..len`) and follow insertion order. They are only
/// meaningful until the next [`rebuild`](IdentityMap::rebuild).
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    by_external: HashMap<ProfileId, usize>,
    by_internal: Vec<Option<ProfileId>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound ids.
    pub fn len(&self) -> usize {
        self.by_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_external.is_empty()
    }

    /// Bind `id` to `position`, which must be the next dense position.
    pub fn bind(&mut self, id: ProfileId, position: usize) -> Result<(), IdentityError> {
        if self.by_external.contains_key(&id) {
            return Err(IdentityError::DuplicateIdentity(id));
        }
        let expected = self.by_internal.len();
        if position != expected {
            return Err(IdentityError::PositionOutOfOrder { position, expected });
        }
        self.by_external.insert(id, position);
        self.by_internal.push(Some(id));
        Ok(())
    }

    /// Unbind `id`, returning the position it held.
    ///
    /// Leaves a hole at that position until the next `rebuild`.
    pub fn unbind(&mut self, id: ProfileId) -> Result<usize, IdentityError> {
        let position = self
            .by_external
            .remove(&id)
            .ok_or(IdentityError::NotFound(id))?;
        if let Some(slot) = self.by_internal.get_mut(position) {
            *slot = None;
        }
        Ok(position)
    }

    pub fn lookup_by_external(&self, id: ProfileId) -> Option<usize> {
        self.by_external.get(&id).copied()
    }

    pub fn lookup_by_internal(&self, position: usize) -> Option<ProfileId> {
        self.by_internal.get(position).copied().flatten()
    }

    pub fn contains(&self, id: ProfileId) -> bool {
        self.by_external.contains_key(&id)
    }

    /// Replace the whole map: `ordered_ids[i]` gets position `i`.
    ///
    /// On a repeated id the map is left untouched.
    pub fn rebuild(&mut self, ordered_ids: &[ProfileId]) -> Result<(), IdentityError> {
        let mut by_external = HashMap::with_capacity(ordered_ids.len());
        for (position, &id) in ordered_ids.iter().enumerate() {
            if by_external.insert(id, position).is_some() {
                return Err(IdentityError::DuplicateIdentity(id));
            }
        }
        self.by_external = by_external;
        self.by_internal = ordered_ids.iter().copied().map(Some).collect();
        Ok(())
    }

    /// Bound ids in position order.
    pub fn ids(&self) -> impl Iterator<Item = ProfileId> + '_ {
        self.by_internal.iter().filter_map(|slot| *slot)
    }

    /// `(position, id)` pairs in position order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, ProfileId)> + '_ {
        self.by_internal
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| slot.map(|id| (pos, id)))
    }

    pub fn clear(&mut self) {
        self.by_external.clear();
        self.by_internal.clear();
    }
}
