use crate::api::error::{ApiError, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

/// A requested transfer. It is accepted and echoed back, but not applied to any balance. Missing
/// fields default to zero.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TransferRequest {
    pub to_account: i64,
    pub amount: i64,
}

#[utoipa::path(
    post,
    path = "/transfer",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "The echoed transfer request", body = TransferRequest),
        (status = 400, description = "Malformed request body", body = ErrorBody),
    )
)]
#[instrument]
pub async fn transfer(
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferRequest>, ApiError> {
    info!(to_account = request.to_account, amount = request.amount, "transfer requested");
    Ok(Json(request))
}
