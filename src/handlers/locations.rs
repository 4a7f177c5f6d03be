//! Location tree endpoints

use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{json_body, with_identity, with_state, AppState, PageQuery};
use crate::auth::Identity;
use crate::core::{CreateLocationRequest, LocationService, MoveLocationRequest, UpdateLocationRequest};

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let authorizer = state.authorizer;
    let service = state.locations;

    let create = warp::path!("locations")
        .and(warp::post())
        .and(with_identity(authorizer.clone()))
        .and(json_body::<CreateLocationRequest>())
        .and(with_state(service.clone()))
        .and_then(create_location);

    let list = warp::path!("locations")
        .and(warp::get())
        .and(with_identity(authorizer.clone()))
        .and(warp::query::<PageQuery>())
        .and(with_state(service.clone()))
        .and_then(list_locations);

    let get = warp::path!("locations" / u64)
        .and(warp::get())
        .and(with_identity(authorizer.clone()))
        .and(with_state(service.clone()))
        .and_then(get_location);

    let update = warp::path!("locations" / u64)
        .and(warp::put())
        .and(with_identity(authorizer.clone()))
        .and(json_body::<UpdateLocationRequest>())
        .and(with_state(service.clone()))
        .and_then(update_location);

    let delete = warp::path!("locations" / u64)
        .and(warp::delete())
        .and(with_identity(authorizer.clone()))
        .and(with_state(service.clone()))
        .and_then(delete_location);

    let children = warp::path!("locations" / u64 / "children")
        .and(warp::get())
        .and(with_identity(authorizer.clone()))
        .and(with_state(service.clone()))
        .and_then(location_children);

    let move_location = warp::path!("locations" / u64 / "move")
        .and(warp::patch())
        .and(with_identity(authorizer))
        .and(json_body::<MoveLocationRequest>())
        .and(with_state(service))
        .and_then(move_location);

    create
        .or(list)
        .or(get)
        .or(update)
        .or(delete)
        .or(children)
        .or(move_location)
}

async fn create_location(
    identity: Identity,
    request: CreateLocationRequest,
    service: Arc<LocationService>,
) -> Result<impl Reply, Rejection> {
    let location = service
        .create(&identity, request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&location),
        StatusCode::CREATED,
    ))
}

async fn list_locations(
    identity: Identity,
    query: PageQuery,
    service: Arc<LocationService>,
) -> Result<impl Reply, Rejection> {
    let listing = service
        .list_roots(&identity, query.into())
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&listing))
}

async fn get_location(
    id: u64,
    identity: Identity,
    service: Arc<LocationService>,
) -> Result<impl Reply, Rejection> {
    let location = service
        .get(&identity, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&location))
}

async fn update_location(
    id: u64,
    identity: Identity,
    request: UpdateLocationRequest,
    service: Arc<LocationService>,
) -> Result<impl Reply, Rejection> {
    let location = service
        .update(&identity, id, request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&location))
}

async fn delete_location(
    id: u64,
    identity: Identity,
    service: Arc<LocationService>,
) -> Result<impl Reply, Rejection> {
    service
        .delete(&identity, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

async fn location_children(
    id: u64,
    identity: Identity,
    service: Arc<LocationService>,
) -> Result<impl Reply, Rejection> {
    let children = service
        .children(&identity, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&children))
}

async fn move_location(
    id: u64,
    identity: Identity,
    request: MoveLocationRequest,
    service: Arc<LocationService>,
) -> Result<impl Reply, Rejection> {
    let location = service
        .move_to(&identity, id, request.parent_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&location))
}
