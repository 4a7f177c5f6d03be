//! Device and power usage operations
//!
//! Every per-device operation fetches the device first and runs the ownership
//! guard on it before anything is returned or changed. An unknown id is
//! `NotFound`; somebody else's device is `Forbidden`.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::guard::{Access, OwnershipGuard};
use crate::auth::user::Identity;
use crate::core::Paginated;
use crate::error::{EcoshareError, Result};
use crate::storage::{
    Device, DeviceFilter, DeviceStatus, DeviceStore, DeviceUpdate, NewDevice, NewUsageRecord, Page,
    TimeRange, UsageRecord, UsageStore,
};

const MAX_DEVICE_NAME_LENGTH: usize = 100;
const MAX_DEVICE_TYPE_LENGTH: usize = 50;
const MAX_SERIAL_LENGTH: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    /// Hardware serial; generated when absent
    #[serde(default)]
    pub device_id: Option<String>,
    pub device_type: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdate {
    pub status: DeviceStatus,
}

/// Query string of a device listing: paging plus optional filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceListQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub location: Option<String>,
    /// `online` lists only active devices
    pub status: Option<DeviceStatus>,
}

impl DeviceListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }

    pub fn filter(&self) -> DeviceFilter {
        DeviceFilter {
            location: self
                .location
                .as_deref()
                .map(str::trim)
                .filter(|location| !location.is_empty())
                .map(str::to_string),
            status: self.status,
        }
    }
}

/// Raw `start_time`/`end_time` query parameters (RFC 3339)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl UsageQuery {
    /// Missing start means no lower bound, missing end means now
    pub fn into_range(self) -> Result<TimeRange> {
        let start = match self.start_time {
            Some(ref raw) => parse_timestamp("start_time", raw)?,
            None => DateTime::<Utc>::MIN_UTC,
        };
        let end = match self.end_time {
            Some(ref raw) => parse_timestamp("end_time", raw)?,
            None => Utc::now(),
        };
        if start > end {
            return Err(EcoshareError::ValidationError(
                "start_time must not be after end_time".to_string(),
            ));
        }
        Ok(TimeRange { start, end })
    }
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| EcoshareError::ValidationError(format!("{} must be an RFC 3339 timestamp", field)))
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageTotal {
    pub total_usage: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

fn validate_text(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len == 0 || len > max {
        return Err(EcoshareError::ValidationError(format!(
            "{} must be between 1 and {} characters",
            field, max
        )));
    }
    Ok(())
}

fn device_label(id: u64) -> String {
    format!("device:{}", id)
}

pub struct DeviceService {
    devices: Arc<dyn DeviceStore>,
    usage: Arc<dyn UsageStore>,
}

impl DeviceService {
    pub fn new(devices: Arc<dyn DeviceStore>, usage: Arc<dyn UsageStore>) -> Self {
        Self { devices, usage }
    }

    /// Fetch then guard
    async fn fetch_guarded(&self, identity: &Identity, id: u64, access: Access) -> Result<Device> {
        let device = self
            .devices
            .get_device(id)
            .await?
            .ok_or_else(|| EcoshareError::NotFound("device".to_string()))?;
        OwnershipGuard::authorize(identity, &device, access, &device_label(id))?;
        Ok(device)
    }

    pub async fn create(&self, identity: &Identity, request: CreateDeviceRequest) -> Result<Device> {
        validate_text("name", &request.name, MAX_DEVICE_NAME_LENGTH)?;
        validate_text("device_type", &request.device_type, MAX_DEVICE_TYPE_LENGTH)?;

        let serial = match request.device_id {
            Some(serial) if !serial.trim().is_empty() => {
                validate_text("device_id", &serial, MAX_SERIAL_LENGTH)?;
                serial.trim().to_string()
            }
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let device = self
            .devices
            .create_device(NewDevice {
                owner_subject_id: identity.subject_id,
                name: request.name,
                device_id: serial,
                device_type: request.device_type,
                location: request.location,
                description: request.description,
            })
            .await?;
        debug!("Device {} created for subject {}", device.id, identity.subject_id);
        Ok(device)
    }

    pub async fn get(&self, identity: &Identity, id: u64) -> Result<Device> {
        self.fetch_guarded(identity, id, Access::Read).await
    }

    pub async fn update(&self, identity: &Identity, id: u64, update: DeviceUpdate) -> Result<Device> {
        if let Some(ref name) = update.name {
            validate_text("name", name, MAX_DEVICE_NAME_LENGTH)?;
        }
        self.fetch_guarded(identity, id, Access::Mutate).await?;
        self.devices.update_device(id, update).await
    }

    pub async fn delete(&self, identity: &Identity, id: u64) -> Result<()> {
        self.fetch_guarded(identity, id, Access::Mutate).await?;
        self.devices.delete_device(id).await
    }

    pub async fn set_status(&self, identity: &Identity, id: u64, status: DeviceStatus) -> Result<Device> {
        self.fetch_guarded(identity, id, Access::Mutate).await?;
        self.devices.set_status(id, status, Utc::now()).await
    }

    /// The caller's own devices, optionally narrowed by location or status
    pub async fn list_own(
        &self,
        identity: &Identity,
        filter: &DeviceFilter,
        page: Page,
    ) -> Result<Paginated<Device>> {
        let (items, total) = self
            .devices
            .list_devices(Some(identity.subject_id), filter, page)
            .await?;
        Ok(Paginated::new(items, total, page))
    }

    /// Every device, admins only
    pub async fn list_all(
        &self,
        identity: &Identity,
        filter: &DeviceFilter,
        page: Page,
    ) -> Result<Paginated<Device>> {
        OwnershipGuard::authorize_listing(identity, "devices")?;
        let (items, total) = self.devices.list_devices(None, filter, page).await?;
        for device in &items {
            OwnershipGuard::check(identity, device, Access::AdminListing)?;
        }
        Ok(Paginated::new(items, total, page))
    }

    pub async fn record_usage(
        &self,
        identity: &Identity,
        id: u64,
        record: NewUsageRecord,
    ) -> Result<UsageRecord> {
        if !record.usage.is_finite() || record.usage < 0.0 {
            return Err(EcoshareError::ValidationError(
                "usage must be a non-negative number".to_string(),
            ));
        }
        if !record.cost.is_finite() || record.cost < 0.0 {
            return Err(EcoshareError::ValidationError(
                "cost must be a non-negative number".to_string(),
            ));
        }
        self.fetch_guarded(identity, id, Access::Mutate).await?;
        self.usage.record_usage(id, record).await
    }

    pub async fn usage_history(
        &self,
        identity: &Identity,
        id: u64,
        range: TimeRange,
    ) -> Result<Vec<UsageRecord>> {
        self.fetch_guarded(identity, id, Access::Read).await?;
        self.usage.usage_for_device(id, range).await
    }

    /// Sum over all of the caller's devices
    pub async fn total_usage(&self, identity: &Identity, range: TimeRange) -> Result<UsageTotal> {
        let total_usage = self
            .usage
            .total_usage_for_owner(identity.subject_id, range)
            .await?;
        Ok(UsageTotal {
            total_usage,
            start_time: range.start,
            end_time: range.end,
        })
    }
}
