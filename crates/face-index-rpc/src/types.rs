//! Method params and results.

use face_index_core::{IndexStats, Match, ProfileId, ProfileRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Params
// =============================================================================

/// Params for `add_vector`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertParams {
    /// Face profile the embedding belongs to.
    pub face_profile_id: i64,

    /// Raw embedding; normalized server-side.
    pub embedding: Vec<f32>,
}

/// Params for `search_similar`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Query embedding.
    pub embedding: Vec<f32>,

    /// Maximum number of matches (default: 10).
    #[serde(default = "default_k")]
    pub k: usize,

    /// Profile to leave out of the results.
    #[serde(default)]
    pub exclude_id: Option<i64>,
}

fn default_k() -> usize {
    10
}

/// Params for `check_duplicate`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckDuplicateParams {
    /// Embedding of the face about to be enrolled.
    pub embedding: Vec<f32>,

    /// Profile to ignore, typically the one being re-enrolled.
    #[serde(default)]
    pub exclude_id: Option<i64>,
}

/// Params for `remove_vector`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RemoveParams {
    pub face_profile_id: i64,
}

/// One face profile as loaded from the system of record.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FaceProfileInput {
    pub id: i64,
    pub embedding: Vec<f32>,
}

impl From<FaceProfileInput> for ProfileRecord {
    fn from(input: FaceProfileInput) -> Self {
        ProfileRecord::new(ProfileId(input.id), input.embedding)
    }
}

/// Params for `rebuild_from_database`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RebuildParams {
    /// Full replacement contents of the index.
    pub face_profiles: Vec<FaceProfileInput>,
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResult {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub results: Vec<Match>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDuplicateResult {
    pub is_duplicate: bool,
    pub best_match: Option<Match>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildResult {
    pub success: bool,
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResult {
    pub stats: IndexStats,
}

/// Entry in the `describe` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    /// JSON Schema of the params object, `null` when the method takes none.
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeResult {
    pub methods: Vec<MethodInfo>,
}
