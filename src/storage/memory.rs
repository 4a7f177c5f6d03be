//! In-memory storage implementation for development and testing
//!
//! Each table sits behind its own `RwLock`. Location tree checks (cycle
//! detection, the children-first delete rule) run under the location table's
//! write guard together with the change they protect. Uniqueness checks and the insert
//! they guard happen under one write guard, so concurrent registrations of the
//! same username cannot both succeed. When two tables are needed the locks are
//! always taken in the order devices, then usage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::traits::*;
use crate::auth::user::{Account, NewAccount, ProfileUpdate, SubjectId};
use crate::error::{EcoshareError, Result};

struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Default)]
struct AccountTable {
    rows: BTreeMap<SubjectId, StoredAccount>,
    by_username: HashMap<String, SubjectId>,
    by_email: HashMap<String, SubjectId>,
    next_id: u64,
}

#[derive(Default)]
struct DeviceTable {
    rows: BTreeMap<u64, Device>,
    by_serial: HashMap<String, u64>,
    next_id: u64,
}

#[derive(Default)]
struct LocationTable {
    rows: BTreeMap<u64, Location>,
    next_id: u64,
}

impl LocationTable {
    /// True when `candidate` is `id` or lies below it
    fn is_self_or_descendant(&self, id: u64, candidate: u64) -> bool {
        let mut current = Some(candidate);
        // Bounded walk, a corrupt table cannot loop forever
        for _ in 0..=self.rows.len() {
            match current {
                Some(node) if node == id => return true,
                Some(node) => current = self.rows.get(&node).and_then(|row| row.parent_id),
                None => return false,
            }
        }
        true
    }
}

#[derive(Default)]
struct UsageTable {
    rows: Vec<UsageRecord>,
    next_id: u64,
}

/// Usernames and emails are unique regardless of case
fn unique_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// In-memory accounts, devices, locations and usage records
#[derive(Default)]
pub struct MemoryStorage {
    accounts: RwLock<AccountTable>,
    devices: RwLock<DeviceTable>,
    locations: RwLock<LocationTable>,
    usage: RwLock<UsageTable>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStorage {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>> {
        let table = self.accounts.read().await;
        Ok(table
            .by_username
            .get(&unique_key(username))
            .and_then(|id| table.rows.get(id))
            .map(|stored| Credential::new(stored.account.clone(), stored.password_hash.clone())))
    }

    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Credential>> {
        let table = self.accounts.read().await;
        Ok(table
            .rows
            .get(&id)
            .map(|stored| Credential::new(stored.account.clone(), stored.password_hash.clone())))
    }

    async fn insert(&self, account: NewAccount, password_hash: String) -> Result<Account> {
        let mut guard = self.accounts.write().await;
        let table = &mut *guard;

        let username_key = unique_key(&account.username);
        if table.by_username.contains_key(&username_key) {
            return Err(EcoshareError::Conflict("username already exists".to_string()));
        }
        let email_key = unique_key(&account.email);
        if table.by_email.contains_key(&email_key) {
            return Err(EcoshareError::Conflict("email already exists".to_string()));
        }

        table.next_id += 1;
        let id = SubjectId(table.next_id);
        let now = Utc::now();
        let record = Account {
            id,
            username: account.username,
            email: account.email,
            phone: account.phone,
            role: account.role,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        table.by_username.insert(username_key, id);
        table.by_email.insert(email_key, id);
        table.rows.insert(
            id,
            StoredAccount {
                account: record.clone(),
                password_hash,
            },
        );

        Ok(record)
    }

    async fn update_password_hash(&self, id: SubjectId, password_hash: String) -> Result<()> {
        let mut table = self.accounts.write().await;
        let stored = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EcoshareError::NotFound("account".to_string()))?;

        stored.password_hash = password_hash;
        stored.account.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(&self, id: SubjectId, update: ProfileUpdate) -> Result<Account> {
        let mut guard = self.accounts.write().await;
        let table = &mut *guard;

        let old_email_key = match table.rows.get(&id) {
            Some(stored) => unique_key(&stored.account.email),
            None => return Err(EcoshareError::NotFound("account".to_string())),
        };

        if let Some(ref email) = update.email {
            let new_key = unique_key(email);
            if let Some(owner) = table.by_email.get(&new_key) {
                if *owner != id {
                    return Err(EcoshareError::Conflict("email already exists".to_string()));
                }
            }
            table.by_email.remove(&old_email_key);
            table.by_email.insert(new_key, id);
        }

        let stored = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EcoshareError::NotFound("account".to_string()))?;
        if let Some(email) = update.email {
            stored.account.email = email;
        }
        if let Some(phone) = update.phone {
            stored.account.phone = Some(phone);
        }
        stored.account.updated_at = Utc::now();

        Ok(stored.account.clone())
    }

    async fn record_login(&self, id: SubjectId, at: DateTime<Utc>) -> Result<()> {
        let mut table = self.accounts.write().await;
        let stored = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EcoshareError::NotFound("account".to_string()))?;
        stored.account.last_login_at = Some(at);
        Ok(())
    }

    async fn list_accounts(&self, page: Page) -> Result<(Vec<Account>, usize)> {
        let table = self.accounts.read().await;
        let accounts = table
            .rows
            .values()
            .skip(page.offset())
            .take(page.page_size)
            .map(|stored| stored.account.clone())
            .collect();
        Ok((accounts, table.rows.len()))
    }
}

#[async_trait]
impl DeviceStore for MemoryStorage {
    async fn create_device(&self, device: NewDevice) -> Result<Device> {
        let mut guard = self.devices.write().await;
        let table = &mut *guard;

        if table.by_serial.contains_key(&device.device_id) {
            return Err(EcoshareError::Conflict("device_id already exists".to_string()));
        }

        table.next_id += 1;
        let id = table.next_id;
        let now = Utc::now();
        let record = Device {
            id,
            owner_subject_id: device.owner_subject_id,
            name: device.name,
            device_id: device.device_id,
            device_type: device.device_type,
            status: DeviceStatus::Offline,
            location: device.location,
            description: device.description,
            power_usage: 0.0,
            last_online: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        table.by_serial.insert(record.device_id.clone(), id);
        table.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn get_device(&self, id: u64) -> Result<Option<Device>> {
        Ok(self.devices.read().await.rows.get(&id).cloned())
    }

    async fn update_device(&self, id: u64, update: DeviceUpdate) -> Result<Device> {
        let mut table = self.devices.write().await;
        let device = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EcoshareError::NotFound("device".to_string()))?;

        if let Some(name) = update.name {
            device.name = name;
        }
        if let Some(location) = update.location {
            device.location = Some(location);
        }
        if let Some(description) = update.description {
            device.description = Some(description);
        }
        device.updated_at = Utc::now();
        Ok(device.clone())
    }

    async fn set_status(&self, id: u64, status: DeviceStatus, at: DateTime<Utc>) -> Result<Device> {
        let mut table = self.devices.write().await;
        let device = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EcoshareError::NotFound("device".to_string()))?;

        device.status = status;
        if status == DeviceStatus::Online {
            device.last_online = Some(at);
        }
        device.updated_at = at;
        Ok(device.clone())
    }

    async fn delete_device(&self, id: u64) -> Result<()> {
        let mut devices = self.devices.write().await;
        let removed = devices
            .rows
            .remove(&id)
            .ok_or_else(|| EcoshareError::NotFound("device".to_string()))?;
        devices.by_serial.remove(&removed.device_id);

        let mut usage = self.usage.write().await;
        usage.rows.retain(|record| record.device_id != id);
        Ok(())
    }

    async fn list_devices(
        &self,
        owner: Option<SubjectId>,
        filter: &DeviceFilter,
        page: Page,
    ) -> Result<(Vec<Device>, usize)> {
        let table = self.devices.read().await;
        let matching: Vec<&Device> = table
            .rows
            .values()
            .filter(|device| owner.map_or(true, |owner| device.owner_subject_id == owner))
            .filter(|device| filter.matches(device))
            .collect();

        let total = matching.len();
        let devices = matching
            .into_iter()
            .skip(page.offset())
            .take(page.page_size)
            .cloned()
            .collect();
        Ok((devices, total))
    }
}

#[async_trait]
impl LocationStore for MemoryStorage {
    async fn create_location(&self, location: NewLocation) -> Result<Location> {
        let mut guard = self.locations.write().await;
        let table = &mut *guard;

        if let Some(parent_id) = location.parent_id {
            if !table.rows.contains_key(&parent_id) {
                return Err(EcoshareError::NotFound("parent location".to_string()));
            }
        }

        table.next_id += 1;
        let now = Utc::now();
        let record = Location {
            id: table.next_id,
            owner_subject_id: location.owner_subject_id,
            name: location.name,
            location_type: location.location_type,
            description: location.description,
            parent_id: location.parent_id,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_location(&self, id: u64) -> Result<Option<Location>> {
        Ok(self.locations.read().await.rows.get(&id).cloned())
    }

    async fn update_location(&self, id: u64, update: LocationUpdate) -> Result<Location> {
        let mut table = self.locations.write().await;
        let location = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EcoshareError::NotFound("location".to_string()))?;

        if let Some(name) = update.name {
            location.name = name;
        }
        if let Some(location_type) = update.location_type {
            location.location_type = location_type;
        }
        if let Some(description) = update.description {
            location.description = Some(description);
        }
        location.updated_at = Utc::now();
        Ok(location.clone())
    }

    async fn set_parent(&self, id: u64, parent_id: Option<u64>) -> Result<Location> {
        let mut guard = self.locations.write().await;
        let table = &mut *guard;

        if !table.rows.contains_key(&id) {
            return Err(EcoshareError::NotFound("location".to_string()));
        }
        if let Some(parent_id) = parent_id {
            if !table.rows.contains_key(&parent_id) {
                return Err(EcoshareError::NotFound("parent location".to_string()));
            }
            if table.is_self_or_descendant(id, parent_id) {
                return Err(EcoshareError::ValidationError(
                    "circular location reference".to_string(),
                ));
            }
        }

        let location = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| EcoshareError::NotFound("location".to_string()))?;
        location.parent_id = parent_id;
        location.updated_at = Utc::now();
        Ok(location.clone())
    }

    async fn delete_location(&self, id: u64) -> Result<()> {
        let mut table = self.locations.write().await;
        if !table.rows.contains_key(&id) {
            return Err(EcoshareError::NotFound("location".to_string()));
        }
        if table.rows.values().any(|row| row.parent_id == Some(id)) {
            return Err(EcoshareError::ValidationError(
                "cannot delete a location that has children".to_string(),
            ));
        }
        table.rows.remove(&id);
        Ok(())
    }

    async fn children(&self, id: u64) -> Result<Vec<Location>> {
        let table = self.locations.read().await;
        Ok(table
            .rows
            .values()
            .filter(|row| row.parent_id == Some(id))
            .cloned()
            .collect())
    }

    async fn list_root_locations(&self, owner: SubjectId, page: Page) -> Result<(Vec<Location>, usize)> {
        let table = self.locations.read().await;
        let roots: Vec<&Location> = table
            .rows
            .values()
            .filter(|row| row.owner_subject_id == owner && row.parent_id.is_none())
            .collect();

        let total = roots.len();
        let locations = roots
            .into_iter()
            .skip(page.offset())
            .take(page.page_size)
            .cloned()
            .collect();
        Ok((locations, total))
    }
}

#[async_trait]
impl UsageStore for MemoryStorage {
    async fn record_usage(&self, device_id: u64, record: NewUsageRecord) -> Result<UsageRecord> {
        let mut devices = self.devices.write().await;
        let device = devices
            .rows
            .get_mut(&device_id)
            .ok_or_else(|| EcoshareError::NotFound("device".to_string()))?;

        let mut guard = self.usage.write().await;
        let usage = &mut *guard;
        usage.next_id += 1;
        let stored = UsageRecord {
            id: usage.next_id,
            device_id,
            owner_subject_id: device.owner_subject_id,
            usage: record.usage,
            cost: record.cost,
            timestamp: record.timestamp,
        };
        usage.rows.push(stored.clone());

        device.power_usage += record.usage;
        device.updated_at = Utc::now();
        Ok(stored)
    }

    async fn usage_for_device(&self, device_id: u64, range: TimeRange) -> Result<Vec<UsageRecord>> {
        let usage = self.usage.read().await;
        let mut records: Vec<UsageRecord> = usage
            .rows
            .iter()
            .filter(|record| record.device_id == device_id && range.contains(record.timestamp))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }

    async fn total_usage_for_owner(&self, owner: SubjectId, range: TimeRange) -> Result<f64> {
        let usage = self.usage.read().await;
        Ok(usage
            .rows
            .iter()
            .filter(|record| record.owner_subject_id == owner && range.contains(record.timestamp))
            .map(|record| record.usage)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::Role;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            phone: None,
            role: Role::User,
        }
    }

    fn new_device(owner: SubjectId, serial: &str) -> NewDevice {
        NewDevice {
            owner_subject_id: owner,
            name: "Socket".to_string(),
            device_id: serial.to_string(),
            device_type: "smart_socket".to_string(),
            location: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let storage = MemoryStorage::new();
        let account = storage
            .insert(new_account("alice", "alice@example.com"), "hash".to_string())
            .await
            .unwrap();

        let credential = storage.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(credential.subject_id(), account.id);
        assert_eq!(credential.password_hash(), "hash");
        assert!(storage.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_and_email_uniqueness() {
        let storage = MemoryStorage::new();
        storage
            .insert(new_account("alice", "alice@example.com"), "h".to_string())
            .await
            .unwrap();

        let same_name = storage
            .insert(new_account("ALICE", "other@example.com"), "h".to_string())
            .await;
        assert!(matches!(same_name, Err(EcoshareError::Conflict(_))));

        let same_email = storage
            .insert(new_account("alice2", "Alice@Example.com"), "h".to_string())
            .await;
        assert!(matches!(same_email, Err(EcoshareError::Conflict(_))));
        let (_, total) = storage.list_accounts(Page::default()).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_update_password_hash_missing_account() {
        let storage = MemoryStorage::new();
        let result = storage.update_password_hash(SubjectId(99), "h".to_string()).await;
        assert!(matches!(result, Err(EcoshareError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_profile_email_conflict() {
        let storage = MemoryStorage::new();
        let alice = storage
            .insert(new_account("alice", "alice@example.com"), "h".to_string())
            .await
            .unwrap();
        storage
            .insert(new_account("bob", "bob@example.com"), "h".to_string())
            .await
            .unwrap();

        let taken = ProfileUpdate {
            email: Some("bob@example.com".to_string()),
            phone: None,
        };
        assert!(matches!(
            storage.update_profile(alice.id, taken).await,
            Err(EcoshareError::Conflict(_))
        ));

        let fresh = ProfileUpdate {
            email: Some("alice@new.example".to_string()),
            phone: Some("0912345678".to_string()),
        };
        let updated = storage.update_profile(alice.id, fresh).await.unwrap();
        assert_eq!(updated.email, "alice@new.example");

        // The old address is free again
        storage
            .insert(new_account("carol", "alice@example.com"), "h".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_usage_updates_device_total_and_cascades() {
        let storage = MemoryStorage::new();
        let device = storage
            .create_device(new_device(SubjectId(1), "SN-1"))
            .await
            .unwrap();
        let now = Utc::now();

        for usage in [1.5, 2.0] {
            storage
                .record_usage(
                    device.id,
                    NewUsageRecord {
                        usage,
                        cost: usage * 3.0,
                        timestamp: now,
                    },
                )
                .await
                .unwrap();
        }

        let device = storage.get_device(device.id).await.unwrap().unwrap();
        assert!((device.power_usage - 3.5).abs() < f64::EPSILON);

        let range = TimeRange {
            start: now - chrono::Duration::hours(1),
            end: now + chrono::Duration::hours(1),
        };
        let total = storage.total_usage_for_owner(SubjectId(1), range).await.unwrap();
        assert!((total - 3.5).abs() < f64::EPSILON);

        storage.delete_device(device.id).await.unwrap();
        assert!(storage.usage_for_device(device.id, range).await.unwrap().is_empty());

        // Serial can be reused once the device is gone
        storage
            .create_device(new_device(SubjectId(1), "SN-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_device_serial_conflict_and_listing() {
        let storage = MemoryStorage::new();
        storage.create_device(new_device(SubjectId(1), "A")).await.unwrap();
        storage.create_device(new_device(SubjectId(2), "B")).await.unwrap();
        storage.create_device(new_device(SubjectId(1), "C")).await.unwrap();

        assert!(matches!(
            storage.create_device(new_device(SubjectId(2), "A")).await,
            Err(EcoshareError::Conflict(_))
        ));

        let everything = DeviceFilter::default();
        let (own, total) = storage
            .list_devices(Some(SubjectId(1)), &everything, Page::new(Some(1), Some(1)))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(own.len(), 1);

        let (all, total) = storage
            .list_devices(None, &everything, Page::default())
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);

        let c = id_of_serial(&storage, "C").await;
        storage.set_status(c, DeviceStatus::Online, Utc::now()).await.unwrap();
        let online = DeviceFilter {
            status: Some(DeviceStatus::Online),
            ..Default::default()
        };
        let (active, total) = storage
            .list_devices(Some(SubjectId(1)), &online, Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(active[0].device_id, "C");
    }

    async fn id_of_serial(storage: &MemoryStorage, serial: &str) -> u64 {
        let (all, _) = storage
            .list_devices(None, &DeviceFilter::default(), Page::default())
            .await
            .unwrap();
        all.into_iter()
            .find(|device| device.device_id == serial)
            .map(|device| device.id)
            .unwrap()
    }

    fn new_location(name: &str, location_type: LocationType, parent_id: Option<u64>) -> NewLocation {
        NewLocation {
            owner_subject_id: SubjectId(1),
            name: name.to_string(),
            location_type,
            description: None,
            parent_id,
        }
    }

    #[tokio::test]
    async fn test_location_tree_rejects_cycles() {
        let storage = MemoryStorage::new();
        let house = storage
            .create_location(new_location("House", LocationType::Building, None))
            .await
            .unwrap();
        let floor = storage
            .create_location(new_location("Ground", LocationType::Floor, Some(house.id)))
            .await
            .unwrap();
        let room = storage
            .create_location(new_location("Kitchen", LocationType::Room, Some(floor.id)))
            .await
            .unwrap();

        for (id, parent) in [(house.id, room.id), (house.id, house.id), (floor.id, room.id)] {
            assert!(matches!(
                storage.set_parent(id, Some(parent)).await,
                Err(EcoshareError::ValidationError(_))
            ));
        }

        let moved = storage.set_parent(room.id, Some(house.id)).await.unwrap();
        assert_eq!(moved.parent_id, Some(house.id));
        let detached = storage.set_parent(floor.id, None).await.unwrap();
        assert!(detached.parent_id.is_none());

        assert!(matches!(
            storage.set_parent(room.id, Some(999)).await,
            Err(EcoshareError::NotFound(_))
        ));
        assert!(matches!(
            storage
                .create_location(new_location("Attic", LocationType::Area, Some(999)))
                .await,
            Err(EcoshareError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_location_delete_requires_leaf() {
        let storage = MemoryStorage::new();
        let house = storage
            .create_location(new_location("House", LocationType::Building, None))
            .await
            .unwrap();
        let room = storage
            .create_location(new_location("Study", LocationType::Room, Some(house.id)))
            .await
            .unwrap();

        assert_eq!(storage.children(house.id).await.unwrap().len(), 1);
        let (roots, total) = storage
            .list_root_locations(SubjectId(1), Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(roots[0].id, house.id);

        assert!(matches!(
            storage.delete_location(house.id).await,
            Err(EcoshareError::ValidationError(_))
        ));
        storage.delete_location(room.id).await.unwrap();
        storage.delete_location(house.id).await.unwrap();
        assert!(storage.get_location(house.id).await.unwrap().is_none());
    }
}
