use crate::{AppState, error::AppError, error::TransportError};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use core_types::{
    CreatedObject, Page, PageParams, RecipeSummary, RecipeView, Review, ReviewCreate, Step,
    UserFavourite, UserFavouriteCreate,
};
use database::RecipeFilter;
use std::sync::Arc;

type Created = (StatusCode, Json<CreatedObject>);

// Turns an extractor rejection into the standard 400 body.
fn bad_request(state: &AppState, detail: String) -> TransportError {
    state.service.reject(AppError::BadRequest(detail))
}

/// # GET /recipe/:recipe_id
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<RecipeView>, TransportError> {
    let Path(recipe_id) = path.map_err(|e| bad_request(&state, e.body_text()))?;
    Ok(Json(state.service.get_recipe(recipe_id).await?))
}

/// # GET /recipe/steps/:recipe_id
pub async fn get_recipe_steps(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Step>>, TransportError> {
    let Path(recipe_id) = path.map_err(|e| bad_request(&state, e.body_text()))?;
    Ok(Json(state.service.get_recipe_steps(recipe_id).await?))
}

/// # GET /recipe/review/:recipe_id
pub async fn get_recipe_reviews(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Review>>, TransportError> {
    let Path(recipe_id) = path.map_err(|e| bad_request(&state, e.body_text()))?;
    Ok(Json(state.service.get_recipe_reviews(recipe_id).await?))
}

/// # POST /leave/review
pub async fn leave_review(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ReviewCreate>, JsonRejection>,
) -> Result<Created, TransportError> {
    let Json(review) = body.map_err(|e| bad_request(&state, e.body_text()))?;
    let created = state.service.leave_review(review).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// # GET /recipes
/// Filters (`name`, `calorie_from`, `calorie_till`, `cooking_time_from`,
/// `cooking_time_till`) and paging (`page`, `size`) share the query string.
pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<RecipeFilter>, QueryRejection>,
    page: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<RecipeSummary>>, TransportError> {
    let Query(filter) = filter.map_err(|e| bad_request(&state, e.body_text()))?;
    let Query(page) = page.map_err(|e| bad_request(&state, e.body_text()))?;
    Ok(Json(state.service.list_recipes(filter, page).await?))
}

/// # GET /user/favourite/:user_id
pub async fn get_user_favourites(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<UserFavourite>>, TransportError> {
    let Path(user_id) = path.map_err(|e| bad_request(&state, e.body_text()))?;
    Ok(Json(state.service.get_user_favourites(user_id).await?))
}

/// # POST /user/favourite
pub async fn add_to_favourite(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UserFavouriteCreate>, JsonRejection>,
) -> Result<Created, TransportError> {
    let Json(favourite) = body.map_err(|e| bad_request(&state, e.body_text()))?;
    let created = state.service.add_to_favourite(favourite).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// # DELETE /user/favourite/:user_id/recipe/:recipe_id
pub async fn remove_favourite(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<StatusCode, TransportError> {
    let Path((user_id, recipe_id)) = path.map_err(|e| bad_request(&state, e.body_text()))?;
    state.service.remove_favourite(user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
