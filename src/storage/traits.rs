//! Abstract storage interfaces for pluggable backends
//!
//! The credential store is the only collaborator that ever sees a password
//! hash. Every write is a single-row operation and every uniqueness rule
//! (username, email, device serial) must be enforced by the backend itself,
//! reported as `EcoshareError::Conflict`. Location tree rules (no cycles, no
//! deleting a location that still has children) are enforced the same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::guard::Owned;
use crate::auth::user::{Account, NewAccount, ProfileUpdate, SubjectId};
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::Result;

/// An account together with its stored password hash
#[derive(Clone)]
pub struct Credential {
    account: Account,
    password_hash: String,
}

impl Credential {
    pub fn new(account: Account, password_hash: String) -> Self {
        Self {
            account,
            password_hash,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn subject_id(&self) -> SubjectId {
        self.account.id
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn into_account(self) -> Account {
        self.account
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.account.id)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// One-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub page_size: usize,
}

impl Page {
    /// Clamps raw query values into a valid page
    pub fn new(page: Option<usize>, page_size: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Inclusive time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// A device owned by one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: u64,
    pub owner_subject_id: SubjectId,
    pub name: String,
    /// Unique hardware serial
    pub device_id: String,
    pub device_type: String,
    pub status: DeviceStatus,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Running total of recorded usage (kWh)
    pub power_usage: f64,
    pub last_online: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Device {
    fn owner_subject_id(&self) -> SubjectId {
        self.owner_subject_id
    }
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub owner_subject_id: SubjectId,
    pub name: String,
    pub device_id: String,
    pub device_type: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// Optional narrowing of a device listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Exact match on the device's location label
    pub location: Option<String>,
    pub status: Option<DeviceStatus>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        self.location
            .as_deref()
            .map_or(true, |location| device.location.as_deref() == Some(location))
            && self.status.map_or(true, |status| device.status == status)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// One power measurement for a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: u64,
    pub device_id: u64,
    pub owner_subject_id: SubjectId,
    pub usage: f64,
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
}

impl Owned for UsageRecord {
    fn owner_subject_id(&self) -> SubjectId {
        self.owner_subject_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUsageRecord {
    pub usage: f64,
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Building,
    Floor,
    Room,
    Area,
}

/// A node in an owner's location tree (building > floor > room > area)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    pub owner_subject_id: SubjectId,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub description: Option<String>,
    /// `None` for a top-level location
    pub parent_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Location {
    fn owner_subject_id(&self) -> SubjectId {
        self.owner_subject_id
    }
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub owner_subject_id: SubjectId,
    pub name: String,
    pub location_type: LocationType,
    pub description: Option<String>,
    pub parent_id: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub location_type: Option<LocationType>,
    pub description: Option<String>,
}

/// Account and credential storage interface
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the credential for a username
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>>;

    /// Get the credential for an account ID
    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Credential>>;

    /// Create an account; `Conflict` when the username or email is taken
    async fn insert(&self, account: NewAccount, password_hash: String) -> Result<Account>;

    /// Overwrite the stored hash; `NotFound` when the account is absent
    async fn update_password_hash(&self, id: SubjectId, password_hash: String) -> Result<()>;

    /// Change email/phone; `Conflict` when the email belongs to another account
    async fn update_profile(&self, id: SubjectId, update: ProfileUpdate) -> Result<Account>;

    /// Update the account's last successful login timestamp
    async fn record_login(&self, id: SubjectId, at: DateTime<Utc>) -> Result<()>;

    /// List accounts with pagination, returning the page and the total count
    async fn list_accounts(&self, page: Page) -> Result<(Vec<Account>, usize)>;
}

/// Device storage interface
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Create a device; `Conflict` when the serial is taken
    async fn create_device(&self, device: NewDevice) -> Result<Device>;

    /// Get device by ID
    async fn get_device(&self, id: u64) -> Result<Option<Device>>;

    /// Update name/location/description
    async fn update_device(&self, id: u64, update: DeviceUpdate) -> Result<Device>;

    /// Set online/offline status
    async fn set_status(&self, id: u64, status: DeviceStatus, at: DateTime<Utc>) -> Result<Device>;

    /// Delete a device and its usage records
    async fn delete_device(&self, id: u64) -> Result<()>;

    /// List devices of one owner, or of everyone when `owner` is `None`
    async fn list_devices(
        &self,
        owner: Option<SubjectId>,
        filter: &DeviceFilter,
        page: Page,
    ) -> Result<(Vec<Device>, usize)>;
}

/// Location tree storage interface
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Create a location; `NotFound` when the parent does not exist
    async fn create_location(&self, location: NewLocation) -> Result<Location>;

    async fn get_location(&self, id: u64) -> Result<Option<Location>>;

    /// Update name/type/description
    async fn update_location(&self, id: u64, update: LocationUpdate) -> Result<Location>;

    /// Re-parent a location, `None` making it top-level.
    ///
    /// `ValidationError` when the new parent is the location itself or one of
    /// its descendants.
    async fn set_parent(&self, id: u64, parent_id: Option<u64>) -> Result<Location>;

    /// Delete a leaf location; `ValidationError` while it still has children
    async fn delete_location(&self, id: u64) -> Result<()>;

    /// Direct children of a location
    async fn children(&self, id: u64) -> Result<Vec<Location>>;

    /// Top-level locations of one owner
    async fn list_root_locations(&self, owner: SubjectId, page: Page) -> Result<(Vec<Location>, usize)>;
}

/// Power usage storage interface
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Store a record and add it to the device's running total
    async fn record_usage(&self, device_id: u64, record: NewUsageRecord) -> Result<UsageRecord>;

    /// Records of one device inside the range, oldest first
    async fn usage_for_device(&self, device_id: u64, range: TimeRange) -> Result<Vec<UsageRecord>>;

    /// Sum of usage over every device of an owner inside the range
    async fn total_usage_for_owner(&self, owner: SubjectId, range: TimeRange) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamping() {
        let page = Page::new(Some(0), Some(0));
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);

        let page = Page::new(Some(3), Some(10_000));
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 2 * MAX_PAGE_SIZE);

        assert_eq!(Page::default().page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_device_filter() {
        let now = Utc::now();
        let device = Device {
            id: 1,
            owner_subject_id: SubjectId(1),
            name: "Heater".to_string(),
            device_id: "SN-1".to_string(),
            device_type: "heater".to_string(),
            status: DeviceStatus::Online,
            location: Some("kitchen".to_string()),
            description: None,
            power_usage: 0.0,
            last_online: Some(now),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        assert!(DeviceFilter::default().matches(&device));
        let online_in_kitchen = DeviceFilter {
            location: Some("kitchen".to_string()),
            status: Some(DeviceStatus::Online),
        };
        assert!(online_in_kitchen.matches(&device));
        let offline = DeviceFilter {
            status: Some(DeviceStatus::Offline),
            ..Default::default()
        };
        assert!(!offline.matches(&device));
        let garage = DeviceFilter {
            location: Some("garage".to_string()),
            ..Default::default()
        };
        assert!(!garage.matches(&device));
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let start = Utc::now();
        let end = start + chrono::Duration::hours(1);
        let range = TimeRange { start, end };
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));
    }
}
