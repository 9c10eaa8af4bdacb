//! The face index engine.
//!
//! [`FaceIndex`] owns the search structure and the identity map together and
//! is the only thing that mutates them, so the two never drift apart.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{IdentityError, IndexError, IndexResult, SnapshotError};
use crate::flat::{FlatL2Index, SearchStructure};
use crate::identity::IdentityMap;
use crate::metric::{
    self, ConfidenceTier, HIGH_CONFIDENCE_THRESHOLD, MEDIUM_CONFIDENCE_THRESHOLD,
};
use crate::snapshot::{now_millis, Snapshot};
use crate::store::SnapshotStore;
use crate::ProfileId;

/// One scored search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub face_profile_id: ProfileId,
    /// `1 - distance / 4`, in `[0, 1]`.
    pub similarity: f32,
    /// Raw squared L2 distance between unit vectors.
    pub distance: f32,
    pub confidence_level: ConfidenceTier,
}

/// Outcome of [`FaceIndex::check_duplicate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub best_match: Option<Match>,
}

/// A profile id with its raw embedding, as fed to [`FaceIndex::rebuild_all`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: ProfileId,
    pub embedding: Vec<f32>,
}

impl ProfileRecord {
    pub fn new(id: ProfileId, embedding: Vec<f32>) -> Self {
        Self { id, embedding }
    }
}

/// Counts reported by [`FaceIndex::rebuild_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub requested: usize,
    pub inserted: usize,
    /// Records dropped because their id was already re-inserted.
    pub skipped: usize,
}

/// Snapshot of engine state for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub count: usize,
    pub dimension: usize,
    pub high_threshold: f32,
    pub medium_threshold: f32,
    pub persistence_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved_at_ms: Option<u64>,
}

/// What happened to the stored snapshot when the index was constructed.
///
/// Decides whether the index may later replace the stored blob: a blob the
/// index never loaded is never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No store attached.
    Detached,
    /// The store held no snapshot.
    Fresh,
    /// The stored snapshot was loaded.
    Restored,
    /// The store could not be read. Whatever it holds is untouched.
    Unreachable,
    /// An unreadable snapshot was moved aside.
    Quarantined,
    /// An unreadable snapshot could not be moved aside and is still in place.
    Corrupt,
    /// A valid snapshot of another dimension. Left in place.
    Mismatched { found: usize },
}

/// Exact nearest-neighbour index keyed by face profile id.
///
/// Single-writer: mutating operations take `&mut self`. Hosts that serve
/// several callers must put the whole engine behind one lock.
pub struct FaceIndex<S: SearchStructure = FlatL2Index> {
    structure: S,
    identities: IdentityMap,
    store: Option<Arc<dyn SnapshotStore>>,
    persistence_available: bool,
    last_saved_at_ms: Option<u64>,
    load_status: LoadStatus,
}

impl FaceIndex<FlatL2Index> {
    /// Memory-only index for `dimension`-component embeddings.
    pub fn new(dimension: usize) -> IndexResult<Self> {
        Self::build(dimension, None)
    }

    /// Index backed by `store`. Loads the stored snapshot, if any.
    ///
    /// Load problems never fail construction: the index starts empty and the
    /// problem is logged.
    pub fn with_store(dimension: usize, store: Arc<dyn SnapshotStore>) -> IndexResult<Self> {
        Self::build(dimension, Some(store))
    }
}

impl<S: SearchStructure> FaceIndex<S> {
    /// Construct over any [`SearchStructure`] backend.
    pub fn build(dimension: usize, store: Option<Arc<dyn SnapshotStore>>) -> IndexResult<Self> {
        if dimension == 0 {
            return Err(IndexError::InvalidInput(
                "Embedding dimension must be positive".to_string(),
            ));
        }
        if u32::try_from(dimension).is_err() {
            return Err(IndexError::InvalidInput(format!(
                "Embedding dimension {dimension} is too large"
            )));
        }

        let persistence_available = store.is_some();
        let mut index = Self {
            structure: S::with_dimension(dimension),
            identities: IdentityMap::new(),
            store,
            persistence_available,
            last_saved_at_ms: None,
            load_status: LoadStatus::Detached,
        };
        index.load();
        Ok(index)
    }

    pub fn dimension(&self) -> usize {
        self.structure.dimension()
    }

    pub fn len(&self) -> usize {
        self.structure.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ProfileId) -> bool {
        self.identities.contains(id)
    }

    /// Enrolled ids in internal order.
    pub fn profile_ids(&self) -> Vec<ProfileId> {
        self.identities.ids().collect()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Enroll `embedding` under `id`.
    ///
    /// Returns `Ok(false)` if `id` is already enrolled. Saves a snapshot when a
    /// store is attached.
    pub fn insert(&mut self, id: ProfileId, embedding: &[f32]) -> IndexResult<bool> {
        let added = self.insert_unsaved(id, embedding)?;
        if added && self.store.is_some() {
            self.persist();
        }
        Ok(added)
    }

    fn insert_unsaved(&mut self, id: ProfileId, embedding: &[f32]) -> IndexResult<bool> {
        if self.identities.contains(id) {
            warn!(profile_id = %id, "Face profile already in index");
            return Ok(false);
        }

        let unit = metric::normalize(embedding, self.dimension())?;
        let position = self.structure.append(&unit);
        self.identities
            .bind(id, position)
            .map_err(|e| IndexError::Inconsistent(e.to_string()))?;

        info!(profile_id = %id, position, "Added face embedding");
        Ok(true)
    }

    /// Remove `id` from the index.
    ///
    /// The structure has no point delete, so this copies out every other
    /// vector, resets and re-appends them in their original order: O(n) in
    /// the index size. Survivors are renumbered densely from 0.
    ///
    /// Returns `Ok(false)` if `id` is not enrolled.
    pub fn remove(&mut self, id: ProfileId) -> IndexResult<bool> {
        let Some(removed) = self.identities.lookup_by_external(id) else {
            warn!(profile_id = %id, "Face profile not in index");
            return Ok(false);
        };

        let keep = self.len().saturating_sub(1);
        let mut vectors = Vec::with_capacity(keep);
        let mut ids = Vec::with_capacity(keep);
        for (position, other) in self.identities.entries() {
            if position == removed {
                continue;
            }
            let vector = self.structure.reconstruct(position).ok_or_else(|| {
                IndexError::Inconsistent(format!(
                    "face profile {other} is bound to position {position} which holds no vector"
                ))
            })?;
            vectors.push(vector);
            ids.push(other);
        }

        self.structure.reset();
        for vector in &vectors {
            self.structure.append(vector);
        }
        self.identities
            .rebuild(&ids)
            .map_err(|e| IndexError::Inconsistent(e.to_string()))?;

        info!(profile_id = %id, count = self.len(), "Removed face embedding");

        if self.store.is_some() {
            self.persist();
        }
        Ok(true)
    }

    /// Replace the whole index with `records`, in order.
    ///
    /// Every embedding is validated before anything is touched, so an invalid
    /// record leaves the index as it was. Repeated ids keep their first
    /// occurrence. Saves once at the end.
    pub fn rebuild_all(&mut self, records: &[ProfileRecord]) -> IndexResult<RebuildSummary> {
        info!(records = records.len(), "Rebuilding index");

        let dimension = self.dimension();
        for record in records {
            metric::validate(&record.embedding, dimension).map_err(|e| match e {
                IndexError::InvalidInput(msg) => {
                    IndexError::InvalidInput(format!("face profile {}: {msg}", record.id))
                }
                other => other,
            })?;
        }

        self.structure.reset();
        self.identities.clear();

        let mut inserted = 0;
        for record in records {
            if self.insert_unsaved(record.id, &record.embedding)? {
                inserted += 1;
            }
        }

        if self.store.is_some() {
            self.persist();
        }

        let summary = RebuildSummary {
            requested: records.len(),
            inserted,
            skipped: records.len() - inserted,
        };
        info!(
            inserted = summary.inserted,
            requested = summary.requested,
            "Index rebuilt"
        );
        Ok(summary)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Up to `k` enrolled faces nearest to `query`, best first.
    ///
    /// `exclude` drops one profile from the results, e.g. the one being
    /// re-enrolled.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        exclude: Option<ProfileId>,
    ) -> IndexResult<Vec<Match>> {
        let unit = metric::normalize(query, self.dimension())?;

        let count = self.len();
        if count == 0 || k == 0 {
            debug!(count, k, "Nothing to search");
            return Ok(Vec::new());
        }

        // Over-fetch so exclusions and unresolved positions don't starve `k`.
        let candidates = self.structure.query(&unit, k.saturating_mul(2).min(count));

        let mut results = Vec::with_capacity(k.min(candidates.len()));
        for (position, distance) in candidates {
            let Some(id) = self.identities.lookup_by_internal(position) else {
                continue;
            };
            if exclude == Some(id) {
                continue;
            }

            let (similarity, confidence_level) = metric::score(distance);
            results.push(Match {
                face_profile_id: id,
                similarity,
                distance,
                confidence_level,
            });
            if results.len() >= k {
                break;
            }
        }

        debug!(found = results.len(), k, "Search complete");
        Ok(results)
    }

    /// Whether `embedding` matches an enrolled face at high confidence.
    ///
    /// A `true` result should block the enrollment.
    pub fn check_duplicate(
        &self,
        embedding: &[f32],
        exclude: Option<ProfileId>,
    ) -> IndexResult<DuplicateCheck> {
        let best_match = self.search(embedding, 1, exclude)?.into_iter().next();
        let is_duplicate = best_match
            .as_ref()
            .is_some_and(|m| m.similarity >= HIGH_CONFIDENCE_THRESHOLD);

        if let (true, Some(m)) = (is_duplicate, &best_match) {
            warn!(
                profile_id = %m.face_profile_id,
                similarity = m.similarity,
                "Duplicate face detected"
            );
        }

        Ok(DuplicateCheck {
            is_duplicate,
            best_match,
        })
    }

    /// Outcome of loading the stored snapshot at construction.
    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            count: self.len(),
            dimension: self.dimension(),
            high_threshold: HIGH_CONFIDENCE_THRESHOLD,
            medium_threshold: MEDIUM_CONFIDENCE_THRESHOLD,
            persistence_available: self.persistence_available,
            last_saved_at_ms: self.last_saved_at_ms,
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Current contents as a snapshot stamped with the current time.
    pub fn snapshot(&self) -> IndexResult<Snapshot> {
        let ids: Vec<ProfileId> = self.identities.ids().collect();
        if ids.len() != self.len() {
            return Err(IndexError::Inconsistent(format!(
                "{} bound ids for {} stored vectors",
                ids.len(),
                self.len()
            )));
        }

        let mut vectors = Vec::with_capacity(ids.len() * self.dimension());
        for position in 0..self.len() {
            let v = self.structure.reconstruct(position).ok_or_else(|| {
                IndexError::Inconsistent(format!("position {position} holds no vector"))
            })?;
            vectors.extend_from_slice(&v);
        }
        Ok(Snapshot {
            dimension: self.dimension(),
            updated_at_ms: now_millis(),
            vectors,
            ids,
        })
    }

    /// Write a snapshot now. `false` if there is no store or the write failed.
    pub fn save(&mut self) -> bool {
        if self.store.is_none() {
            warn!("No snapshot store attached, skipping save");
            return false;
        }
        self.persist()
    }

    fn persist(&mut self) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };

        if !self.may_overwrite(store.as_ref()) {
            self.persistence_available = false;
            return false;
        }

        let encoded = self.snapshot().and_then(|snapshot| {
            let bytes = snapshot
                .encode()
                .map_err(|e| IndexError::Inconsistent(e.to_string()))?;
            Ok((snapshot, bytes))
        });
        let (snapshot, bytes) = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "Cannot snapshot index");
                return false;
            }
        };

        match store.write(&bytes) {
            Ok(()) => {
                self.persistence_available = true;
                self.last_saved_at_ms = Some(snapshot.updated_at_ms);
                info!(
                    store = %store.describe(),
                    count = snapshot.count(),
                    "Saved index snapshot"
                );
                true
            }
            Err(e) => {
                self.persistence_available = false;
                warn!(
                    store = %store.describe(),
                    error = %e,
                    "Failed to save snapshot, continuing in memory"
                );
                false
            }
        }
    }

    /// Whether the stored blob may be replaced by this index's contents.
    fn may_overwrite(&mut self, store: &dyn SnapshotStore) -> bool {
        match self.load_status {
            LoadStatus::Detached
            | LoadStatus::Fresh
            | LoadStatus::Restored
            | LoadStatus::Quarantined => true,
            LoadStatus::Mismatched { found } => {
                error!(
                    store = %store.describe(),
                    found,
                    dimension = self.dimension(),
                    "Stored snapshot has another dimension, not overwriting it"
                );
                false
            }
            LoadStatus::Corrupt => match store.quarantine() {
                Ok(()) => {
                    self.load_status = LoadStatus::Quarantined;
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Corrupt snapshot still in place, not overwriting it");
                    false
                }
            },
            LoadStatus::Unreachable => match store.read() {
                Ok(None) => {
                    info!(store = %store.describe(), "Snapshot store reachable and empty");
                    self.load_status = LoadStatus::Fresh;
                    true
                }
                Ok(Some(_)) => {
                    error!(
                        store = %store.describe(),
                        "Store holds a snapshot this index never loaded, not overwriting it; restart to load it"
                    );
                    false
                }
                Err(e) => {
                    warn!(store = %store.describe(), error = %e, "Snapshot store still unavailable");
                    false
                }
            },
        }
    }

    fn load(&mut self) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let bytes = match store.read() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.load_status = LoadStatus::Fresh;
                info!(store = %store.describe(), "No existing snapshot, starting empty");
                return;
            }
            Err(e) => {
                self.load_status = LoadStatus::Unreachable;
                self.persistence_available = false;
                warn!(
                    store = %store.describe(),
                    error = %e,
                    "Snapshot store unavailable, running in memory-only mode"
                );
                return;
            }
        };

        match self.restore(&bytes) {
            Ok(snapshot_time) => {
                self.load_status = LoadStatus::Restored;
                self.last_saved_at_ms = Some(snapshot_time);
                info!(
                    store = %store.describe(),
                    count = self.len(),
                    updated_at_ms = snapshot_time,
                    "Loaded index snapshot"
                );
            }
            Err(SnapshotError::DimensionMismatch { expected, found }) => {
                self.load_status = LoadStatus::Mismatched { found };
                self.persistence_available = false;
                error!(
                    store = %store.describe(),
                    expected,
                    found,
                    "Snapshot dimension differs from the index, starting empty and leaving it in place"
                );
            }
            Err(e) => {
                error!(
                    store = %store.describe(),
                    error = %e,
                    "Snapshot is corrupt, starting with an empty index"
                );
                self.load_status = match store.quarantine() {
                    Ok(()) => LoadStatus::Quarantined,
                    Err(e) => {
                        warn!(error = %e, "Could not quarantine corrupt snapshot");
                        LoadStatus::Corrupt
                    }
                };
            }
        }
    }

    /// Swap in the contents of `bytes`. Leaves the index untouched on error.
    fn restore(&mut self, bytes: &[u8]) -> Result<u64, SnapshotError> {
        let snapshot = Snapshot::decode(bytes)?;
        if snapshot.dimension != self.dimension() {
            return Err(SnapshotError::DimensionMismatch {
                expected: self.dimension(),
                found: snapshot.dimension,
            });
        }

        let mut structure = S::with_dimension(snapshot.dimension);
        for position in 0..snapshot.count() {
            structure.append(snapshot.vector(position));
        }
        let mut identities = IdentityMap::new();
        identities.rebuild(&snapshot.ids).map_err(|e| match e {
            IdentityError::DuplicateIdentity(dup) => SnapshotError::DuplicateIdentity(dup),
            other => SnapshotError::Inconsistent(other.to_string()),
        })?;

        self.structure = structure;
        self.identities = identities;
        Ok(snapshot.updated_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySnapshotStore;

    fn id(raw: i64) -> ProfileId {
        ProfileId(raw)
    }

    fn axes() -> FaceIndex {
        let mut idx = FaceIndex::new(4).unwrap();
        assert!(idx.insert(id(1), &[1.0, 0.0, 0.0, 0.0]).unwrap());
        assert!(idx.insert(id(2), &[0.0, 1.0, 0.0, 0.0]).unwrap());
        idx
    }

    fn assert_bijective(idx: &FaceIndex) {
        assert_eq!(idx.identities.len(), idx.structure.count());
        for (position, pid) in idx.identities.entries() {
            assert_eq!(idx.identities.lookup_by_external(pid), Some(position));
        }
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(
            FaceIndex::new(0),
            Err(IndexError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_orthogonal_scenario() {
        let idx = axes();
        let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 2, None).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].face_profile_id, id(1));
        assert_eq!(results[0].similarity, 1.0);
        assert_eq!(results[0].confidence_level, ConfidenceTier::High);
        assert_eq!(results[1].face_profile_id, id(2));
        assert_eq!(results[1].distance, 2.0);
        assert_eq!(results[1].similarity, 0.5);
        assert_eq!(results[1].confidence_level, ConfidenceTier::Low);
    }

    #[test]
    fn test_insert_normalizes() {
        let mut idx = FaceIndex::new(2).unwrap();
        idx.insert(id(7), &[10.0, 0.0]).unwrap();
        let results = idx.search(&[0.5, 0.0], 1, None).unwrap();
        assert!(results[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_insert_returns_false() {
        let mut idx = axes();
        assert!(!idx.insert(id(1), &[0.0, 0.0, 1.0, 0.0]).unwrap());
        assert_eq!(idx.len(), 2);
        assert_bijective(&idx);
    }

    #[test]
    fn test_insert_dimension_mismatch_is_error() {
        let mut idx = axes();
        let err = idx.insert(id(3), &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, IndexError::InvalidInput(_)));
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_search_dimension_mismatch_is_error() {
        let idx = axes();
        assert!(idx.search(&[1.0; 5], 3, None).is_err());
    }

    #[test]
    fn test_search_empty_and_zero_k() {
        let idx = FaceIndex::new(4).unwrap();
        assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 5, None).unwrap().is_empty());

        let idx = axes();
        assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_search_exclude() {
        let idx = axes();
        let results = idx.search(&[1.0, 0.0, 0.0, 0.0], 1, Some(id(1))).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].face_profile_id, id(2));
    }

    #[test]
    fn test_exclude_zero_id_is_honoured() {
        let mut idx = FaceIndex::new(2).unwrap();
        idx.insert(id(0), &[1.0, 0.0]).unwrap();
        let results = idx.search(&[1.0, 0.0], 5, Some(id(0))).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_check_duplicate() {
        let idx = axes();

        let same = idx.check_duplicate(&[2.0, 0.0, 0.0, 0.0], None).unwrap();
        assert!(same.is_duplicate);
        assert_eq!(same.best_match.unwrap().face_profile_id, id(1));

        let other = idx.check_duplicate(&[0.0, 0.0, 1.0, 0.0], None).unwrap();
        assert!(!other.is_duplicate);
        assert_eq!(other.best_match.unwrap().similarity, 0.5);

        let excluded = idx
            .check_duplicate(&[1.0, 0.0, 0.0, 0.0], Some(id(1)))
            .unwrap();
        assert!(!excluded.is_duplicate);
    }

    #[test]
    fn test_check_duplicate_empty_index() {
        let idx = FaceIndex::new(4).unwrap();
        let check = idx.check_duplicate(&[1.0, 0.0, 0.0, 0.0], None).unwrap();
        assert_eq!(
            check,
            DuplicateCheck {
                is_duplicate: false,
                best_match: None
            }
        );
    }

    #[test]
    fn test_remove_renumbers_and_keeps_order() {
        let mut idx = FaceIndex::new(3).unwrap();
        idx.insert(id(10), &[1.0, 0.0, 0.0]).unwrap();
        idx.insert(id(20), &[0.0, 1.0, 0.0]).unwrap();
        idx.insert(id(30), &[0.0, 0.0, 1.0]).unwrap();

        assert!(idx.remove(id(20)).unwrap());
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.profile_ids(), vec![id(10), id(30)]);
        assert_eq!(idx.identities.lookup_by_external(id(30)), Some(1));
        assert_bijective(&idx);

        let hits = idx.search(&[0.0, 1.0, 0.0], 5, None).unwrap();
        assert!(hits.iter().all(|m| m.face_profile_id != id(20)));

        // Positions continue densely after a rebuild.
        idx.insert(id(40), &[1.0, 1.0, 0.0]).unwrap();
        assert_eq!(idx.identities.lookup_by_external(id(40)), Some(2));
    }

    #[test]
    fn test_remove_missing_returns_false() {
        let mut idx = axes();
        assert!(!idx.remove(id(99)).unwrap());
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_remove_last_leaves_empty_index() {
        let mut idx = FaceIndex::new(2).unwrap();
        idx.insert(id(1), &[1.0, 0.0]).unwrap();
        assert!(idx.remove(id(1)).unwrap());
        assert!(idx.is_empty());
        assert!(idx.search(&[1.0, 0.0], 3, None).unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_all_skips_repeated_ids() {
        let mut idx = axes();
        let summary = idx
            .rebuild_all(&[
                ProfileRecord::new(id(5), vec![1.0, 0.0, 0.0, 0.0]),
                ProfileRecord::new(id(6), vec![0.0, 1.0, 0.0, 0.0]),
                ProfileRecord::new(id(5), vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .unwrap();

        assert_eq!(
            summary,
            RebuildSummary {
                requested: 3,
                inserted: 2,
                skipped: 1
            }
        );
        assert_eq!(idx.profile_ids(), vec![id(5), id(6)]);
        assert!(!idx.contains(id(1)));
        // First occurrence wins.
        let top = &idx.search(&[1.0, 0.0, 0.0, 0.0], 1, None).unwrap()[0];
        assert_eq!(top.face_profile_id, id(5));
        assert_bijective(&idx);
    }

    #[test]
    fn test_rebuild_all_invalid_record_leaves_index_untouched() {
        let mut idx = axes();
        let err = idx
            .rebuild_all(&[
                ProfileRecord::new(id(5), vec![1.0, 0.0, 0.0, 0.0]),
                ProfileRecord::new(id(6), vec![1.0, 0.0]),
            ])
            .unwrap_err();

        assert!(err.to_string().contains("face profile 6"));
        assert_eq!(idx.profile_ids(), vec![id(1), id(2)]);
    }

    #[test]
    fn test_stats() {
        let idx = axes();
        let stats = idx.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.high_threshold, 0.85);
        assert_eq!(stats.medium_threshold, 0.70);
        assert!(!stats.persistence_available);
        assert_eq!(stats.last_saved_at_ms, None);
    }

    #[test]
    fn test_insert_persists_through_store() {
        let store = MemorySnapshotStore::new();
        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();
        assert!(idx.stats().persistence_available);

        idx.insert(id(1), &[1.0, 0.0, 0.0, 0.0]).unwrap();
        let saved = Snapshot::decode(&store.raw().unwrap()).unwrap();
        assert_eq!(saved.ids, vec![id(1)]);
        assert!(idx.stats().last_saved_at_ms.is_some());

        idx.remove(id(1)).unwrap();
        let saved = Snapshot::decode(&store.raw().unwrap()).unwrap();
        assert_eq!(saved.count(), 0);
    }

    #[test]
    fn test_store_outage_keeps_memory_state() {
        let store = MemorySnapshotStore::new();
        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();

        store.set_available(false);
        assert!(idx.insert(id(1), &[1.0, 0.0, 0.0, 0.0]).unwrap());
        assert_eq!(idx.len(), 1);
        assert!(!idx.stats().persistence_available);

        // Each save is retried on its own.
        store.set_available(true);
        assert!(idx.save());
        assert!(idx.stats().persistence_available);
    }

    #[test]
    fn test_unavailable_store_at_startup() {
        let store = MemorySnapshotStore::new();
        store.set_available(false);
        let mut idx = FaceIndex::with_store(4, Arc::new(store)).unwrap();
        assert!(!idx.stats().persistence_available);
        assert!(idx.insert(id(1), &[1.0, 0.0, 0.0, 0.0]).unwrap());
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty_and_quarantines() {
        let store = MemorySnapshotStore::new();
        store.put_raw(b"FVIX not really a snapshot".to_vec());

        let idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();
        assert!(idx.is_empty());
        assert_eq!(store.quarantined(), 1);
        assert_eq!(store.raw(), None);
    }

    fn stored_ids(store: &MemorySnapshotStore) -> Vec<ProfileId> {
        Snapshot::decode(&store.raw().unwrap()).unwrap().ids
    }

    #[test]
    fn test_snapshot_with_other_dimension_is_left_in_place() {
        let store = MemorySnapshotStore::new();
        {
            let mut idx = FaceIndex::with_store(2, Arc::new(store.clone())).unwrap();
            idx.insert(id(1), &[1.0, 0.0]).unwrap();
        }

        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();
        assert!(idx.is_empty());
        assert_eq!(idx.load_status(), LoadStatus::Mismatched { found: 2 });
        assert_eq!(store.quarantined(), 0);
        assert!(!idx.stats().persistence_available);

        // Mutations stay in memory; the stored snapshot is not replaced.
        assert!(idx.insert(id(9), &[0.0, 0.0, 1.0, 0.0]).unwrap());
        assert!(!idx.save());
        assert_eq!(stored_ids(&store), vec![id(1)]);
    }

    #[test]
    fn test_unread_snapshot_is_never_overwritten() {
        let store = MemorySnapshotStore::new();
        {
            let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();
            idx.insert(id(1), &[1.0, 0.0, 0.0, 0.0]).unwrap();
            idx.insert(id(2), &[0.0, 1.0, 0.0, 0.0]).unwrap();
        }

        store.set_available(false);
        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();
        assert_eq!(idx.load_status(), LoadStatus::Unreachable);
        store.set_available(true);

        assert!(idx.insert(id(3), &[0.0, 0.0, 1.0, 0.0]).unwrap());
        assert!(idx.remove(id(3)).unwrap());
        assert!(!idx.save());
        assert!(!idx.stats().persistence_available);
        assert_eq!(stored_ids(&store), vec![id(1), id(2)]);

        // A restart picks the durable state back up.
        let idx = FaceIndex::with_store(4, Arc::new(store)).unwrap();
        assert_eq!(idx.profile_ids(), vec![id(1), id(2)]);
    }

    #[test]
    fn test_unreachable_empty_store_accepts_writes_once_back() {
        let store = MemorySnapshotStore::new();
        store.set_available(false);
        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();

        store.set_available(true);
        assert!(idx.insert(id(5), &[1.0, 0.0, 0.0, 0.0]).unwrap());
        assert_eq!(idx.load_status(), LoadStatus::Fresh);
        assert!(idx.stats().persistence_available);
        assert_eq!(stored_ids(&store), vec![id(5)]);
    }

    #[test]
    fn test_corrupt_snapshot_that_cannot_move_is_kept() {
        let store = MemorySnapshotStore::new();
        store.put_raw(b"garbage".to_vec());
        store.set_quarantine_available(false);

        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();
        assert_eq!(idx.load_status(), LoadStatus::Corrupt);

        assert!(idx.insert(id(1), &[1.0, 0.0, 0.0, 0.0]).unwrap());
        assert!(!idx.save());
        assert_eq!(store.raw().as_deref(), Some(&b"garbage"[..]));

        // Once it can be moved aside, saving resumes.
        store.set_quarantine_available(true);
        assert!(idx.save());
        assert_eq!(idx.load_status(), LoadStatus::Quarantined);
        assert_eq!(store.quarantined(), 1);
        assert_eq!(stored_ids(&store), vec![id(1)]);
    }

    #[test]
    fn test_restore_failure_keeps_contents() {
        let store = MemorySnapshotStore::new();
        let mut idx = FaceIndex::with_store(2, Arc::new(store)).unwrap();
        idx.insert(id(1), &[1.0, 0.0]).unwrap();

        let bad = Snapshot {
            dimension: 2,
            updated_at_ms: 0,
            vectors: vec![1.0, 0.0, 0.0, 1.0],
            ids: vec![id(4), id(4)],
        };
        assert_eq!(
            idx.restore(&bad.encode().unwrap()),
            Err(SnapshotError::DuplicateIdentity(id(4)))
        );
        assert_eq!(idx.profile_ids(), vec![id(1)]);
    }

    #[test]
    fn test_snapshot_reports_inconsistency() {
        let mut idx = axes();
        idx.structure.reset();
        assert!(matches!(idx.snapshot(), Err(IndexError::Inconsistent(_))));
    }

    #[test]
    fn test_inconsistent_index_is_not_saved() {
        let store = MemorySnapshotStore::new();
        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();
        idx.insert(id(1), &[1.0, 0.0, 0.0, 0.0]).unwrap();

        idx.structure.reset();
        assert!(!idx.save());
        assert_eq!(stored_ids(&store), vec![id(1)]);
    }

    #[test]
    fn test_save_without_store() {
        let mut idx = axes();
        assert!(!idx.save());
    }
}
