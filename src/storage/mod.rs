//! Persistence collaborators for accounts, devices, locations and power usage

pub mod memory;
pub mod traits;

pub use memory::MemoryStorage;
pub use traits::{
    Credential, CredentialStore, Device, DeviceFilter, DeviceStatus, DeviceStore, DeviceUpdate,
    Location, LocationStore, LocationType, LocationUpdate, NewDevice, NewLocation, NewUsageRecord,
    Page, TimeRange, UsageRecord, UsageStore,
};
