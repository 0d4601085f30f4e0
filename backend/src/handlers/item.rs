//! HTTP handlers for item endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::{Item, ItemFilter, ItemPatch, NewItem, PaginatedResponse};

use crate::error::AppResult;
use crate::services::ItemService;
use crate::AppState;

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<NewItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let service = ItemService::new(state.store);
    let item = service.create_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Get an item by ID
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.store);
    let item = service.get_item(item_id).await?;
    Ok(Json(item))
}

/// Query parameters for listing items
#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    pub branch_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// List items
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<Json<PaginatedResponse<Item>>> {
    let pagination = super::pagination(&state, query.page, query.limit);
    let filter = ItemFilter {
        branch_id: query.branch_id,
        search: query.search,
    };
    let service = ItemService::new(state.store);
    let (items, total) = service.list_items(filter, pagination).await?;
    Ok(Json(PaginatedResponse::new(items, pagination, total)))
}

/// Body for patching item metadata
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub branch_id: Uuid,
    #[serde(flatten)]
    pub patch: ItemPatch,
}

/// Update item metadata
pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemRequest>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.store);
    let item = service
        .update_item(item_id, input.branch_id, input.patch)
        .await?;
    Ok(Json(item))
}

/// Query parameters identifying the branch that owns an item
#[derive(Debug, Deserialize)]
pub struct BranchQuery {
    pub branch_id: Uuid,
}

/// Soft-delete an item
pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<BranchQuery>,
) -> AppResult<StatusCode> {
    let service = ItemService::new(state.store);
    service.delete_item(item_id, query.branch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
