use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State as AxumState},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    guard::{Requirement, extract_bearer_token},
    models::{NewReview, ReviewUpdate, Role},
    state::State,
    utils::{Params, Payload, blocking},
};

type AppState = AxumState<Arc<State>>;

#[derive(Deserialize)]
pub struct Login {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ViewQuery {
    path: String,
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn user_login_handler(
    AxumState(state): AppState,
    Payload(payload): Payload<Login>,
) -> Result<impl IntoResponse, AppError> {
    login(state, payload, Role::User).await
}

pub async fn chef_login_handler(
    AxumState(state): AppState,
    Payload(payload): Payload<Login>,
) -> Result<impl IntoResponse, AppError> {
    login(state, payload, Role::Chef).await
}

async fn login(state: Arc<State>, payload: Login, role: Role) -> Result<impl IntoResponse, AppError> {
    let token = blocking(move || {
        state
            .credentials
            .login(&payload.username, &payload.password, role)
    })
    .await?;

    Ok((StatusCode::OK, Json(json!({ "token": token }))))
}

pub async fn create_review_handler(
    AxumState(state): AppState,
    headers: HeaderMap,
    Payload(payload): Payload<NewReview>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state
        .guard
        .authorize_headers(&headers, Requirement::Role(Role::User))?;

    let review = blocking(move || {
        state
            .reviews
            .create_review(&principal, payload.meal_id, payload.rating, &payload.review)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn update_review_handler(
    AxumState(state): AppState,
    Path(review_id): Path<i64>,
    headers: HeaderMap,
    Payload(payload): Payload<ReviewUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state
        .guard
        .authorize_headers(&headers, Requirement::Role(Role::User))?;

    let review = blocking(move || {
        state
            .reviews
            .update_review(&principal, review_id, payload.rating, &payload.review)
    })
    .await?;

    Ok((StatusCode::OK, Json(json!({ "review": review }))))
}

pub async fn delete_review_handler(
    AxumState(state): AppState,
    Path(review_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let principal = state
        .guard
        .authorize_headers(&headers, Requirement::Role(Role::User))?;

    blocking(move || state.reviews.delete_review(&principal, review_id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_reviews_handler(
    AxumState(state): AppState,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let reviews = blocking(move || state.reviews.reviews_by_user(user_id)).await?;

    Ok((StatusCode::OK, Json(reviews)))
}

pub async fn meal_handler(
    AxumState(state): AppState,
    Path(meal_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let meal = blocking(move || state.reviews.meal(meal_id)).await?;

    Ok((StatusCode::OK, Json(meal)))
}

pub async fn meal_reviews_handler(
    AxumState(state): AppState,
    Path(meal_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let reviews = blocking(move || state.reviews.reviews_by_meal(meal_id)).await?;

    Ok((StatusCode::OK, Json(reviews)))
}

pub async fn view_handler(
    AxumState(state): AppState,
    Params(query): Params<ViewQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let decision = state
        .guard
        .authorize_view(extract_bearer_token(&headers), &query.path);

    (StatusCode::OK, Json(decision))
}
