mod accounts;
pub mod auth;
mod error;
mod transfer;

use crate::{
    api::{auth::Tokens, error::ApiError},
    domain::{Account, AccountRepository},
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use opentelemetry::{global, propagation::Extractor, trace::TraceContextExt};
use serde::Deserialize;
use std::{net::IpAddr, sync::Arc};
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{field, info, info_span, warn, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::{
    openapi::{
        self,
        security::{ApiKey, ApiKeyValue, SecurityScheme},
    },
    Modify, OpenApi,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    addr: IpAddr,
    port: u16,
}

#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        accounts::list_accounts,
        accounts::create_account,
        accounts::get_account,
        accounts::update_account,
        accounts::delete_account,
        transfer::transfer,
    ),
    components(schemas(
        Account,
        accounts::CreateAccountRequest,
        accounts::UpdateAccountRequest,
        transfer::TransferRequest,
        error::ErrorBody,
    )),
    modifiers(&TokenSecurity)
)]
pub struct ApiDoc;

struct TokenSecurity;

impl Modify for TokenSecurity {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(auth::TOKEN_HEADER))),
            );
        }
    }
}

pub async fn serve<R>(config: Config, account_repository: R, tokens: Tokens) -> Result<()>
where
    R: AccountRepository,
{
    let Config { addr, port } = config;

    let app_state = AppState {
        account_repository,
        tokens: Arc::new(tokens),
    };

    let app = app(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(CorsLayer::permissive())
            .map_request(accept_trace)
            .map_request(record_trace_id),
    );

    let listener = TcpListener::bind((addr, port))
        .await
        .context("bind TcpListener")?;
    info!(%addr, port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run server")
}

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState<R> {
    account_repository: R,
    tokens: Arc<Tokens>,
}

/// Routes of the service; requests for `/account/{id}` must carry a valid token.
fn app<R>(app_state: AppState<R>) -> Router
where
    R: AccountRepository,
{
    let authorize = middleware::from_fn_with_state(app_state.tokens.clone(), auth::authorize);

    Router::new()
        .route("/", get(ready))
        .route("/openapi.json", get(openapi_json))
        .route(
            "/account",
            get(accounts::list_accounts::<R>)
                .post(accounts::create_account::<R>)
                .fallback(method_not_allowed),
        )
        .route(
            "/account/:id",
            get(accounts::get_account::<R>)
                .put(accounts::update_account::<R>)
                .delete(accounts::delete_account::<R>)
                .fallback(method_not_allowed)
                .layer(authorize),
        )
        .route(
            "/transfer",
            post(transfer::transfer).fallback(method_not_allowed),
        )
        .with_state(app_state)
}

async fn ready() -> StatusCode {
    StatusCode::OK
}

async fn openapi_json() -> Json<openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

async fn shutdown_signal() {
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            terminate.recv().await;
            info!("received SIGTERM, shutting down");
        }

        Err(error) => {
            warn!(%error, "cannot install SIGTERM handler, waiting for ctrl-c");
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "cannot listen for ctrl-c");
            }
        }
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    info_span!("incoming request", %method, path, trace_id = field::Empty)
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| {
            let s = v.to_str();
            if let Err(ref error) = s {
                warn!(%error, ?v, "cannot convert header value to ASCII")
            };
            s.ok()
        })
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

fn accept_trace(request: Request<Body>) -> Request<Body> {
    // Current context, if no or invalid data is received.
    let parent_context = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });
    Span::current().set_parent(parent_context);

    request
}

fn record_trace_id(request: Request<Body>) -> Request<Body> {
    let span = Span::current();

    let trace_id = span.context().span().span_context().trace_id();
    span.record("trace_id", trace_id.to_string());

    request
}
