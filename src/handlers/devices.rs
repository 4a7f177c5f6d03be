//! Device and power usage endpoints

use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{json_body, with_identity, with_state, AppState};
use crate::auth::Identity;
use crate::core::{CreateDeviceRequest, DeviceListQuery, DeviceService, StatusUpdate, UsageQuery};
use crate::storage::{DeviceUpdate, NewUsageRecord};

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let authorizer = state.authorizer;
    let service = state.devices;

    let create = warp::path!("devices")
        .and(warp::post())
        .and(with_identity(authorizer.clone()))
        .and(json_body::<CreateDeviceRequest>())
        .and(with_state(service.clone()))
        .and_then(create_device);

    let list_own = warp::path!("devices")
        .and(warp::get())
        .and(with_identity(authorizer.clone()))
        .and(warp::query::<DeviceListQuery>())
        .and(with_state(service.clone()))
        .and_then(list_devices);

    let total_usage = warp::path!("devices" / "total-usage")
        .and(warp::get())
        .and(with_identity(authorizer.clone()))
        .and(warp::query::<UsageQuery>())
        .and(with_state(service.clone()))
        .and_then(total_usage);

    let get = warp::path!("devices" / u64)
        .and(warp::get())
        .and(with_identity(authorizer.clone()))
        .and(with_state(service.clone()))
        .and_then(get_device);

    let update = warp::path!("devices" / u64)
        .and(warp::put())
        .and(with_identity(authorizer.clone()))
        .and(json_body::<DeviceUpdate>())
        .and(with_state(service.clone()))
        .and_then(update_device);

    let delete = warp::path!("devices" / u64)
        .and(warp::delete())
        .and(with_identity(authorizer.clone()))
        .and(with_state(service.clone()))
        .and_then(delete_device);

    let status = warp::path!("devices" / u64 / "status")
        .and(warp::put())
        .and(with_identity(authorizer.clone()))
        .and(json_body::<StatusUpdate>())
        .and(with_state(service.clone()))
        .and_then(set_status);

    let record_usage = warp::path!("devices" / u64 / "usage")
        .and(warp::post())
        .and(with_identity(authorizer.clone()))
        .and(json_body::<NewUsageRecord>())
        .and(with_state(service.clone()))
        .and_then(record_usage);

    let usage_history = warp::path!("devices" / u64 / "usage")
        .and(warp::get())
        .and(with_identity(authorizer.clone()))
        .and(warp::query::<UsageQuery>())
        .and(with_state(service.clone()))
        .and_then(usage_history);

    let list_all = warp::path!("admin" / "devices")
        .and(warp::get())
        .and(with_identity(authorizer))
        .and(warp::query::<DeviceListQuery>())
        .and(with_state(service))
        .and_then(list_all_devices);

    create
        .or(list_own)
        .or(total_usage)
        .or(get)
        .or(update)
        .or(delete)
        .or(status)
        .or(record_usage)
        .or(usage_history)
        .or(list_all)
}

async fn create_device(
    identity: Identity,
    request: CreateDeviceRequest,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let device = service
        .create(&identity, request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&device),
        StatusCode::CREATED,
    ))
}

async fn list_devices(
    identity: Identity,
    query: DeviceListQuery,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let listing = service
        .list_own(&identity, &query.filter(), query.page())
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&listing))
}

async fn total_usage(
    identity: Identity,
    query: UsageQuery,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let range = query.into_range().map_err(warp::reject::custom)?;
    let total = service
        .total_usage(&identity, range)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&total))
}

async fn get_device(
    id: u64,
    identity: Identity,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let device = service
        .get(&identity, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&device))
}

async fn update_device(
    id: u64,
    identity: Identity,
    update: DeviceUpdate,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let device = service
        .update(&identity, id, update)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&device))
}

async fn delete_device(
    id: u64,
    identity: Identity,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    service
        .delete(&identity, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

async fn set_status(
    id: u64,
    identity: Identity,
    update: StatusUpdate,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let device = service
        .set_status(&identity, id, update.status)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&device))
}

async fn record_usage(
    id: u64,
    identity: Identity,
    record: NewUsageRecord,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let stored = service
        .record_usage(&identity, id, record)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&stored),
        StatusCode::CREATED,
    ))
}

async fn usage_history(
    id: u64,
    identity: Identity,
    query: UsageQuery,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let range = query.into_range().map_err(warp::reject::custom)?;
    let records = service
        .usage_history(&identity, id, range)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&records))
}

async fn list_all_devices(
    identity: Identity,
    query: DeviceListQuery,
    service: Arc<DeviceService>,
) -> Result<impl Reply, Rejection> {
    let listing = service
        .list_all(&identity, &query.filter(), query.page())
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&listing))
}
