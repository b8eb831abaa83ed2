use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{FeedbackLabel, Frequency, Item, UserProfile};
use crate::services::ItemSpec;

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub brand: String,
}

impl From<CreateItemRequest> for ItemSpec {
    fn from(request: CreateItemRequest) -> Self {
        Self {
            id: request.id,
            name: request.name,
            description: request.description,
            brand: request.brand,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: String,
    pub brand: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Item> for ItemResponse {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            brand: item.brand.clone(),
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchIngestResponse {
    pub stored: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub user_id: String,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: String,
    pub frequency: Frequency,
    pub liked_count: usize,
    pub disliked_count: usize,
    pub preferred_brands: Vec<String>,
}

impl From<&UserProfile> for ProfileResponse {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            frequency: profile.frequency,
            liked_count: profile.liked_ids.len(),
            disliked_count: profile.disliked_ids.len(),
            preferred_brands: profile.preferred_brands.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub user_id: String,
    pub item_id: String,
    pub label: FeedbackLabel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub liked_count: usize,
    pub disliked_count: usize,
    pub preferred_brands: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub user: String,
    #[serde(rename = "topK", default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub item_id: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Ingest a single catalog item
pub async fn create_item(
    State(state): State<AppState>,
    Json(request): Json<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<ItemResponse>)> {
    let item = state
        .pipeline
        .ingest_item(
            &request.id,
            &request.name,
            &request.description,
            &request.brand,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ItemResponse::from(&item))))
}

/// Ingest a batch of catalog items
pub async fn create_items_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<CreateItemRequest>>,
) -> AppResult<Json<BatchIngestResponse>> {
    let total = requests.len();
    let specs = requests.into_iter().map(ItemSpec::from).collect();
    let stored = state.pipeline.ingest_batch(specs).await?;
    Ok(Json(BatchIngestResponse { stored, total }))
}

/// List the newest catalog items
pub async fn get_items(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<ItemResponse>>> {
    let items = state.pipeline.recent_items(query.limit).await?;
    Ok(Json(items.iter().map(ItemResponse::from).collect()))
}

/// Items similar to a given catalog item
pub async fn get_similar_items(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<MatchResponse>>> {
    let hits = state.pipeline.similar_items(&item_id, query.limit).await?;
    Ok(Json(
        hits.into_iter()
            .map(|(item_id, score)| MatchResponse { item_id, score })
            .collect(),
    ))
}

/// Subscribe a user, creating their profile if needed
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> AppResult<(StatusCode, Json<ProfileResponse>)> {
    let profile = state
        .pipeline
        .subscribe(&request.user_id, request.frequency)
        .await?;
    Ok((StatusCode::CREATED, Json(ProfileResponse::from(&profile))))
}

/// Get a user's profile summary
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ProfileResponse>> {
    let profile = state.pipeline.get_profile(&user_id).await?;
    Ok(Json(ProfileResponse::from(&profile)))
}

/// Record feedback and return the updated profile summary
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<Json<FeedbackResponse>> {
    let profile = state
        .pipeline
        .record_feedback(&request.user_id, &request.item_id, request.label)
        .await?;
    Ok(Json(FeedbackResponse {
        liked_count: profile.liked_ids.len(),
        disliked_count: profile.disliked_ids.len(),
        preferred_brands: profile.preferred_brands.iter().cloned().collect(),
    }))
}

/// Personalized matches for a user
pub async fn get_matches(
    State(state): State<AppState>,
    Query(query): Query<MatchQuery>,
) -> AppResult<Json<Vec<MatchResponse>>> {
    let matches = state
        .pipeline
        .run_match_pipeline(&query.user, query.top_k)
        .await?;
    Ok(Json(
        matches
            .into_iter()
            .map(|scored| MatchResponse {
                item_id: scored.item.id,
                score: scored.score,
            })
            .collect(),
    ))
}
