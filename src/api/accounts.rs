use crate::{
    api::{
        auth::TOKEN_HEADER,
        error::{ApiError, Json},
        AppState,
    },
    domain::{Account, AccountRepository, AccountUpdate, NewAccount},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateAccountRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateAccountRequest {
    pub first_name: String,
    pub last_name: String,
}

#[utoipa::path(
    get,
    path = "/account",
    responses(
        (status = 200, description = "All accounts", body = [Account]),
        (status = 500, description = "Storage failure", body = ErrorBody),
    )
)]
#[instrument(skip(app_state))]
pub async fn list_accounts<R>(
    State(app_state): State<AppState<R>>,
) -> Result<Json<Vec<Account>>, ApiError>
where
    R: AccountRepository,
{
    let accounts = app_state
        .account_repository
        .accounts()
        .await
        .map_err(ApiError::storage)?
        .try_collect::<Vec<_>>()
        .await
        .map_err(ApiError::storage)?;
    Ok(Json(accounts))
}

/// Create an account and hand out a token for it in the `x-jwt-token` response header.
#[utoipa::path(
    post,
    path = "/account",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Created account", body = Account,
            headers(("x-jwt-token" = String, description = "Token for the created account"))),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody),
    )
)]
#[instrument(skip(app_state))]
pub async fn create_account<R>(
    State(app_state): State<AppState<R>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    R: AccountRepository,
{
    let CreateAccountRequest {
        first_name,
        last_name,
    } = request;

    let account = app_state
        .account_repository
        .create_account(NewAccount::new(first_name, last_name))
        .await
        .map_err(ApiError::storage)?;

    let token = app_state.tokens.issue(&account).map_err(ApiError::Token)?;

    info!(id = account.id, number = account.number, "account created");
    Ok((StatusCode::CREATED, [(TOKEN_HEADER, token)], Json(account)))
}

#[utoipa::path(
    get,
    path = "/account/{id}",
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "The account", body = Account),
        (status = 400, description = "Invalid ID", body = ErrorBody),
        (status = 403, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody),
    ),
    security(("token" = []))
)]
#[instrument(skip(app_state))]
pub async fn get_account<R>(
    State(app_state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<Account>, ApiError>
where
    R: AccountRepository,
{
    let id = parse_id(id)?;

    app_state
        .account_repository
        .account_by_id(id)
        .await
        .map_err(ApiError::storage)?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

#[utoipa::path(
    put,
    path = "/account/{id}",
    params(("id" = i32, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "The updated account", body = Account),
        (status = 400, description = "Invalid ID or request body", body = ErrorBody),
        (status = 403, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody),
    ),
    security(("token" = []))
)]
#[instrument(skip(app_state))]
pub async fn update_account<R>(
    State(app_state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<Account>, ApiError>
where
    R: AccountRepository,
{
    let id = parse_id(id)?;
    let UpdateAccountRequest {
        first_name,
        last_name,
    } = request;
    let update = AccountUpdate {
        first_name,
        last_name,
    };

    app_state
        .account_repository
        .update_account(id, update)
        .await
        .map_err(ApiError::storage)?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

#[utoipa::path(
    delete,
    path = "/account/{id}",
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account deleted", body = String),
        (status = 400, description = "Invalid ID", body = ErrorBody),
        (status = 403, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody),
    ),
    security(("token" = []))
)]
#[instrument(skip(app_state))]
pub async fn delete_account<R>(
    State(app_state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<&'static str>, ApiError>
where
    R: AccountRepository,
{
    let id = parse_id(id)?;

    app_state
        .account_repository
        .delete_account(id)
        .await
        .map_err(ApiError::storage)?
        .ok_or(ApiError::NotFound(id))?;

    Ok(Json("successfully deleted account"))
}

fn parse_id(id: String) -> Result<i32, ApiError> {
    id.parse().map_err(|_| ApiError::InvalidId(id))
}
