//! Core account, device and location services

pub mod accounts;
pub mod devices;
pub mod locations;

use serde::Serialize;

use crate::storage::Page;

// Re-export main components for convenience
pub use accounts::AccountService;
pub use devices::{
    CreateDeviceRequest, DeviceListQuery, DeviceService, StatusUpdate, UsageQuery, UsageTotal,
};
pub use locations::{CreateLocationRequest, LocationService, MoveLocationRequest, UpdateLocationRequest};

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: usize, page: Page) -> Self {
        Self {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        }
    }
}
