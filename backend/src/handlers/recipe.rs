//! HTTP handlers for recipe consumption

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::CookResult;

use crate::error::AppResult;
use crate::services::RecipeConsumptionEngine;
use crate::AppState;

/// Body for a cook request
#[derive(Debug, Deserialize)]
pub struct CookRequest {
    pub serving_count: u32,
}

/// Consume the ingredients for a number of servings
pub async fn cook_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Json(input): Json<CookRequest>,
) -> AppResult<Json<CookResult>> {
    let engine = RecipeConsumptionEngine::new(state.store);
    let result = engine.cook(recipe_id, input.serving_count).await?;
    Ok(Json(result))
}
