//! Face embedding index with duplicate detection.
//!
//! Keeps every enrolled face embedding in memory, answers exact k-nearest
//! neighbour queries, and flags a new embedding as a duplicate when it matches
//! an enrolled one at high confidence. This is what stops one physical face
//! from being enrolled under two identities.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   embedding ──▶ │ FaceIndex                    │
//!                 │  metric::normalize / score   │
//!                 │  ┌────────────┐ ┌──────────┐ │
//!                 │  │ FlatL2Index│ │IdentityMap│ │
//!                 │  │ (positions)│◀▶│(ProfileId)│ │
//!                 │  └────────────┘ └──────────┘ │
//!                 └──────────────┬───────────────┘
//!                                │ Snapshot (FVIX envelope)
//!                                ▼
//!                     ┌─────────────────────┐
//!                     │ SnapshotStore        │
//!                     │ (file / memory)      │
//!                     └─────────────────────┘
//! ```
//!
//! Profile ids are the only durable handle. Internal positions are renumbered
//! whenever an entry is removed.

pub mod engine;
pub mod error;
pub mod flat;
pub mod identity;
pub mod metric;
pub mod snapshot;
pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use engine::{
    DuplicateCheck, FaceIndex, IndexStats, LoadStatus, Match, ProfileRecord, RebuildSummary,
};
pub use error::{IdentityError, IndexError, IndexResult, SnapshotError, StoreError};
pub use flat::{FlatL2Index, SearchStructure};
pub use identity::IdentityMap;
pub use metric::{ConfidenceTier, HIGH_CONFIDENCE_THRESHOLD, MEDIUM_CONFIDENCE_THRESHOLD};
pub use snapshot::Snapshot;
pub use store::{
    FileSnapshotStore, MemorySnapshotStore, SnapshotStore, DEFAULT_IO_TIMEOUT, MAX_QUEUED_JOBS,
};

/// Default embedding dimension.
pub const DEFAULT_DIMENSION: usize = 512;

/// Dense floating-point vector representing a face.
pub type Embedding = Vec<f32>;

/// Caller-owned identifier of an enrolled face profile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProfileId(pub i64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProfileId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Integration tests
// ───────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn embedding(rng: &mut StdRng, dim: usize) -> Embedding {
        (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn random_index(n: usize, dim: usize) -> (FaceIndex, Vec<(ProfileId, Embedding)>) {
        let mut rng = StdRng::seed_from_u64(0x9E37_79B9_7F4A_7C15);
        let mut idx = FaceIndex::new(dim).unwrap();
        let mut enrolled = Vec::new();
        for i in 0..n {
            let id = ProfileId(1000 + i as i64);
            let emb = embedding(&mut rng, dim);
            assert!(idx.insert(id, &emb).unwrap());
            enrolled.push((id, emb));
        }
        (idx, enrolled)
    }

    // -- Self-search --

    #[test]
    fn test_every_embedding_finds_itself() {
        let (idx, enrolled) = random_index(40, 64);
        for (id, emb) in &enrolled {
            let top = &idx.search(emb, 3, None).unwrap()[0];
            assert_eq!(top.face_profile_id, *id);
            assert!(top.similarity >= 0.999, "similarity {}", top.similarity);
        }
    }

    // -- Remove keeps survivors intact --

    #[test]
    fn test_remove_preserves_survivor_scores() {
        let (mut idx, enrolled) = random_index(25, 32);
        let query = &enrolled[7].1;

        let before: Vec<Match> = idx.search(query, 25, None).unwrap();
        let victim = enrolled[3].0;

        assert!(idx.remove(victim).unwrap());
        assert_eq!(idx.len(), 24);

        let after = idx.search(query, 25, None).unwrap();
        assert!(after.iter().all(|m| m.face_profile_id != victim));

        for m in &after {
            let old = before
                .iter()
                .find(|b| b.face_profile_id == m.face_profile_id)
                .unwrap();
            assert!((old.similarity - m.similarity).abs() < 1e-6);
        }

        // The removed face itself no longer matches.
        let own = idx.search(&enrolled[3].1, 5, None).unwrap();
        assert!(own.iter().all(|m| m.face_profile_id != victim));
    }

    #[test]
    fn test_identity_round_trip_after_mixed_operations() {
        let (mut idx, enrolled) = random_index(12, 16);
        idx.remove(enrolled[0].0).unwrap();
        idx.remove(enrolled[11].0).unwrap();
        idx.remove(enrolled[5].0).unwrap();
        idx.insert(ProfileId(1), &enrolled[0].1).unwrap();

        assert_eq!(idx.len(), 10);
        assert_eq!(idx.profile_ids().len(), idx.len());
        for (id, emb) in enrolled.iter().skip(1).filter(|(id, _)| idx.contains(*id)) {
            assert_eq!(idx.search(emb, 1, None).unwrap()[0].face_profile_id, *id);
        }
    }

    // -- Persistence via FileSnapshotStore --

    #[test]
    fn test_file_snapshot_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.fvix");

        let mut rng = StdRng::seed_from_u64(42);
        let enrolled: Vec<(ProfileId, Embedding)> =
            (0..10).map(|i| (ProfileId(i), embedding(&mut rng, 8))).collect();

        let expected = {
            let store = Arc::new(FileSnapshotStore::new(&path).unwrap());
            let mut idx = FaceIndex::with_store(8, store).unwrap();
            for (id, emb) in &enrolled {
                idx.insert(*id, emb).unwrap();
            }
            idx.remove(ProfileId(4)).unwrap();
            enrolled
                .iter()
                .map(|(_, emb)| idx.search(emb, 3, None).unwrap())
                .collect::<Vec<_>>()
        };

        let store = Arc::new(FileSnapshotStore::new(&path).unwrap());
        let idx = FaceIndex::with_store(8, store).unwrap();
        assert_eq!(idx.len(), 9);
        assert_eq!(idx.dimension(), 8);
        assert!(!idx.contains(ProfileId(4)));
        assert!(idx.stats().last_saved_at_ms.is_some());

        for ((_, emb), want) in enrolled.iter().zip(&expected) {
            let got = idx.search(emb, 3, None).unwrap();
            assert_eq!(got.len(), want.len());
            for (g, w) in got.iter().zip(want) {
                assert_eq!(g.face_profile_id, w.face_profile_id);
                assert!((g.similarity - w.similarity).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_rebuild_all_persists_once() {
        let store = MemorySnapshotStore::new();
        let mut idx = FaceIndex::with_store(4, Arc::new(store.clone())).unwrap();

        let records = vec![
            ProfileRecord::new(ProfileId(1), vec![1.0, 0.0, 0.0, 0.0]),
            ProfileRecord::new(ProfileId(2), vec![0.0, 1.0, 0.0, 0.0]),
            ProfileRecord::new(ProfileId(1), vec![0.0, 0.0, 1.0, 0.0]),
        ];
        assert_eq!(store.writes(), 0);
        idx.rebuild_all(&records).unwrap();
        assert_eq!(store.writes(), 1);

        idx.rebuild_all(&records[..1]).unwrap();
        assert_eq!(store.writes(), 2);
        idx.rebuild_all(&records).unwrap();
        assert_eq!(store.writes(), 3);

        let reloaded = FaceIndex::with_store(4, Arc::new(store)).unwrap();
        assert_eq!(reloaded.profile_ids(), vec![ProfileId(1), ProfileId(2)]);
    }

    // -- Serialization --

    #[test]
    fn test_match_serialization() {
        let m = Match {
            face_profile_id: ProfileId(17),
            similarity: 0.5,
            distance: 2.0,
            confidence_level: ConfidenceTier::Low,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["face_profile_id"], 17);
        assert_eq!(json["confidence_level"], "low");
    }
}
