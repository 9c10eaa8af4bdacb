//! Method implementations over a shared engine.

use std::sync::{Arc, Mutex, MutexGuard};

use face_index_core::{FaceIndex, ProfileId, ProfileRecord};
use tracing::info;

use crate::error::RpcError;
use crate::types::*;

/// Runs each method against the engine.
///
/// The engine is single-writer, so every call, reads included, takes the
/// one lock for its whole duration.
#[derive(Clone)]
pub struct MethodExecutor {
    index: Arc<Mutex<FaceIndex>>,
}

impl MethodExecutor {
    pub fn new(index: FaceIndex) -> Self {
        Self {
            index: Arc::new(Mutex::new(index)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FaceIndex>, RpcError> {
        self.index
            .lock()
            .map_err(|_| RpcError::Internal("index lock poisoned".to_string()))
    }

    pub fn add_vector(&self, params: InsertParams) -> Result<SuccessResult, RpcError> {
        let success = self
            .lock()?
            .insert(ProfileId(params.face_profile_id), &params.embedding)?;
        Ok(SuccessResult { success })
    }

    pub fn search_similar(&self, params: SearchParams) -> Result<SearchResult, RpcError> {
        let results = self.lock()?.search(
            &params.embedding,
            params.k,
            params.exclude_id.map(ProfileId),
        )?;
        Ok(SearchResult { results })
    }

    pub fn check_duplicate(
        &self,
        params: CheckDuplicateParams,
    ) -> Result<CheckDuplicateResult, RpcError> {
        let check = self
            .lock()?
            .check_duplicate(&params.embedding, params.exclude_id.map(ProfileId))?;
        Ok(CheckDuplicateResult {
            is_duplicate: check.is_duplicate,
            best_match: check.best_match,
        })
    }

    pub fn remove_vector(&self, params: RemoveParams) -> Result<SuccessResult, RpcError> {
        let success = self.lock()?.remove(ProfileId(params.face_profile_id))?;
        Ok(SuccessResult { success })
    }

    pub fn rebuild_from_database(&self, params: RebuildParams) -> Result<RebuildResult, RpcError> {
        let records: Vec<ProfileRecord> =
            params.face_profiles.into_iter().map(Into::into).collect();
        let summary = self.lock()?.rebuild_all(&records)?;
        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            "Rebuilt index from caller records"
        );
        Ok(RebuildResult {
            success: true,
            inserted: summary.inserted,
            skipped: summary.skipped,
        })
    }

    pub fn get_stats(&self) -> Result<StatsResult, RpcError> {
        Ok(StatsResult {
            stats: self.lock()?.stats(),
        })
    }
}
