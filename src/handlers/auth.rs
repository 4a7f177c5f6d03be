//! Account and credential endpoints

use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{json_body, with_identity, with_state, AppState, PageQuery};
use crate::auth::user::ProfileUpdate;
use crate::auth::{Authenticator, Identity, LoginRequest, RegisterRequest};
use crate::core::AccountService;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register = warp::path!("register")
        .and(warp::post())
        .and(json_body::<RegisterRequest>())
        .and(with_state(state.authenticator.clone()))
        .and_then(register);

    let login = warp::path!("login")
        .and(warp::post())
        .and(json_body::<LoginRequest>())
        .and(with_state(state.authenticator.clone()))
        .and_then(login);

    let get_profile = warp::path!("profile")
        .and(warp::get())
        .and(with_identity(state.authorizer.clone()))
        .and(with_state(state.accounts.clone()))
        .and_then(get_profile);

    let update_profile = warp::path!("profile")
        .and(warp::put())
        .and(with_identity(state.authorizer.clone()))
        .and(json_body::<ProfileUpdate>())
        .and(with_state(state.accounts.clone()))
        .and_then(update_profile);

    let change_password = warp::path!("change-password")
        .and(warp::post())
        .and(with_identity(state.authorizer.clone()))
        .and(json_body::<ChangePasswordRequest>())
        .and(with_state(state.authenticator.clone()))
        .and_then(change_password);

    let list_users = warp::path!("users")
        .and(warp::get())
        .and(with_identity(state.authorizer.clone()))
        .and(warp::query::<PageQuery>())
        .and(with_state(state.accounts))
        .and_then(list_users);

    register
        .or(login)
        .or(get_profile)
        .or(update_profile)
        .or(change_password)
        .or(list_users)
}

async fn register(
    request: RegisterRequest,
    authenticator: Arc<Authenticator>,
) -> Result<impl Reply, Rejection> {
    let account = authenticator
        .register(request)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "message": "account created",
            "user": account,
        })),
        StatusCode::CREATED,
    ))
}

async fn login(
    request: LoginRequest,
    authenticator: Arc<Authenticator>,
) -> Result<impl Reply, Rejection> {
    let outcome = authenticator
        .login(&request.username, &request.password)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&serde_json::json!({
        "token": outcome.token,
        "token_type": "Bearer",
        "expires_at": outcome.claims.expires_at(),
        "user": outcome.account,
    })))
}

async fn get_profile(
    identity: Identity,
    accounts: Arc<AccountService>,
) -> Result<impl Reply, Rejection> {
    let account = accounts
        .profile(&identity)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&account))
}

async fn update_profile(
    identity: Identity,
    update: ProfileUpdate,
    accounts: Arc<AccountService>,
) -> Result<impl Reply, Rejection> {
    let account = accounts
        .update_profile(&identity, update)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&account))
}

async fn change_password(
    identity: Identity,
    request: ChangePasswordRequest,
    authenticator: Arc<Authenticator>,
) -> Result<impl Reply, Rejection> {
    authenticator
        .change_password(identity.subject_id, &request.old_password, &request.new_password)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&serde_json::json!({ "message": "password updated" })))
}

async fn list_users(
    identity: Identity,
    query: PageQuery,
    accounts: Arc<AccountService>,
) -> Result<impl Reply, Rejection> {
    let listing = accounts
        .list_accounts(&identity, query.into())
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&listing))
}
