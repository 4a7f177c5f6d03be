//! HTTP handlers and the warp route tree
//!
//! Every protected route matches its path and method before the identity
//! filter runs, so an unauthenticated request to an unknown path is still 404.

pub mod auth;
pub mod devices;
pub mod locations;
pub mod rejection;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::HeaderMap;
use warp::{Filter, Rejection, Reply};

use crate::auth::{Authenticator, Identity, RequestAuthorizer, TokenManager};
use crate::config::ServerConfig;
use crate::constants::{API_PREFIX, API_VERSION, AUTHORIZATION_HEADER};
use crate::core::{AccountService, DeviceService, LocationService};
use crate::error::Result;
use crate::security::with_api_security_headers;
use crate::storage::{CredentialStore, DeviceStore, LocationStore, Page, UsageStore};

pub use rejection::handle_rejection;

/// Largest JSON body accepted on any route
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Everything a request handler may need, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub authorizer: RequestAuthorizer,
    pub accounts: Arc<AccountService>,
    pub devices: Arc<DeviceService>,
    pub locations: Arc<LocationService>,
}

impl AppState {
    pub fn new<S>(config: &ServerConfig, storage: Arc<S>) -> Result<Self>
    where
        S: CredentialStore + DeviceStore + LocationStore + UsageStore + 'static,
    {
        let tokens = Arc::new(TokenManager::from_config(config));
        let authenticator = Authenticator::from_config(config, storage.clone(), tokens.clone())?;

        Ok(Self {
            authenticator: Arc::new(authenticator),
            authorizer: RequestAuthorizer::new(tokens),
            accounts: Arc::new(AccountService::new(storage.clone())),
            devices: Arc::new(DeviceService::new(storage.clone(), storage.clone())),
            locations: Arc::new(LocationService::new(storage)),
        })
    }
}

/// `page`/`page_size` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        Page::new(query.page, query.page_size)
    }
}

/// Resolve the caller from the `Authorization` header or reject with 401.
///
/// The header is read as raw bytes so that a value which is not visible ASCII
/// still ends up as `MalformedHeader` rather than a warp header rejection.
pub fn with_identity(
    authorizer: RequestAuthorizer,
) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    warp::header::headers_cloned().and_then(move |headers: HeaderMap| {
        let result = authorizer.authorize_value(headers.get(AUTHORIZATION_HEADER));
        async move { result.map_err(warp::reject::custom) }
    })
}

pub fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn with_state<T: Clone + Send + Sync>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

/// `/health` plus the complete API under `/api/v1`
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let api = warp::path(API_PREFIX).and(warp::path(API_VERSION)).and(
        auth::routes(state.clone())
            .or(devices::routes(state.clone()))
            .or(locations::routes(state)),
    );

    health
        .or(api)
        .recover(handle_rejection)
        .with(with_api_security_headers())
        .with(warp::log("ecoshare::http"))
}
