use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        FromRequest, Request,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use error_ext::{BoxError, StdErrorExt};
use serde::{de::DeserializeOwned, Serialize};
use std::error::Error as StdError;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Failure of a request handler, rendered as `{"error": <message>}` with a status code chosen by
/// variant.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", .0.body_text())]
    UnreadableBody(#[from] BytesRejection),

    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    #[error("invalid id given {0}")]
    InvalidId(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("account with id {0} not found")]
    NotFound(i32),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),

    #[error("storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("cannot issue token")]
    Token(#[source] jsonwebtoken::errors::Error),
}

impl ApiError {
    pub fn storage<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Storage(error.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnreadableBody(rejection) => rejection.status(),
            ApiError::InvalidBody(rejection) => rejection.status(),
            ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidToken => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Storage(_) | ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = self.as_chain(), "cannot handle request");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Like [axum::Json], but the body is decoded regardless of its content type and rejections are
/// reported as [ApiError].
#[derive(Debug)]
pub struct Json<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state).await?;
        let axum::Json(value) = axum::Json::<T>::from_bytes(&bytes)?;
        Ok(Json(value))
    }
}

impl<T> IntoResponse for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::api::error::{ApiError, Json};
    use assert_matches::assert_matches;
    use axum::{body::Body, extract::FromRequest, http::Request};
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Names {
        first_name: String,
        last_name: String,
    }

    #[tokio::test]
    async fn test_json_ignores_content_type() {
        let request = Request::builder()
            .body(Body::from(r#"{"first_name": "Jane"}"#))
            .unwrap();
        let Json(names) = Json::<Names>::from_request(request, &()).await.unwrap();
        assert_eq!(names.first_name, "Jane");
        assert_eq!(names.last_name, "");
    }

    #[tokio::test]
    async fn test_json_error_carries_detail() {
        let request = Request::builder()
            .body(Body::from(r#"{"first_name": 42}"#))
            .unwrap();
        let error = Json::<Names>::from_request(request, &())
            .await
            .unwrap_err();
        assert_matches!(error, ApiError::InvalidBody(_));
        assert!(error.to_string().contains("invalid type: integer `42`"));
    }
}
