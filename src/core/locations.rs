//! Location tree operations
//!
//! Locations form one tree per owner. Like devices, every operation fetches the
//! location and runs the ownership guard before touching it, and a new parent
//! has to pass the same guard, so a tree never spans two owners.

use log::debug;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::guard::{Access, OwnershipGuard};
use crate::auth::user::Identity;
use crate::core::Paginated;
use crate::error::{EcoshareError, Result};
use crate::storage::{Location, LocationStore, LocationType, LocationUpdate, NewLocation, Page};

const MAX_LOCATION_NAME_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

/// Partial update; a `parent_id` moves the location
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLocationRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub location_type: Option<LocationType>,
    pub description: Option<String>,
    pub parent_id: Option<u64>,
}

/// New parent; absent or `null` makes the location top-level
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MoveLocationRequest {
    #[serde(default)]
    pub parent_id: Option<u64>,
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_LOCATION_NAME_LENGTH {
        return Err(EcoshareError::ValidationError(format!(
            "name must be between 1 and {} characters",
            MAX_LOCATION_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<()> {
    match description {
        Some(text) if text.chars().count() > MAX_DESCRIPTION_LENGTH => Err(
            EcoshareError::ValidationError(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LENGTH
            )),
        ),
        _ => Ok(()),
    }
}

fn location_label(id: u64) -> String {
    format!("location:{}", id)
}

pub struct LocationService {
    locations: Arc<dyn LocationStore>,
}

impl LocationService {
    pub fn new(locations: Arc<dyn LocationStore>) -> Self {
        Self { locations }
    }

    async fn fetch_guarded(
        &self,
        identity: &Identity,
        id: u64,
        access: Access,
        what: &str,
    ) -> Result<Location> {
        let location = self
            .locations
            .get_location(id)
            .await?
            .ok_or_else(|| EcoshareError::NotFound(what.to_string()))?;
        OwnershipGuard::authorize(identity, &location, access, &location_label(id))?;
        Ok(location)
    }

    pub async fn create(&self, identity: &Identity, request: CreateLocationRequest) -> Result<Location> {
        validate_name(&request.name)?;
        validate_description(request.description.as_deref())?;
        if let Some(parent_id) = request.parent_id {
            self.fetch_guarded(identity, parent_id, Access::Mutate, "parent location")
                .await?;
        }

        let location = self
            .locations
            .create_location(NewLocation {
                owner_subject_id: identity.subject_id,
                name: request.name.trim().to_string(),
                location_type: request.location_type,
                description: request.description,
                parent_id: request.parent_id,
            })
            .await?;
        debug!("Location {} created for subject {}", location.id, identity.subject_id);
        Ok(location)
    }

    pub async fn get(&self, identity: &Identity, id: u64) -> Result<Location> {
        self.fetch_guarded(identity, id, Access::Read, "location").await
    }

    /// The caller's top-level locations
    pub async fn list_roots(&self, identity: &Identity, page: Page) -> Result<Paginated<Location>> {
        let (items, total) = self
            .locations
            .list_root_locations(identity.subject_id, page)
            .await?;
        Ok(Paginated::new(items, total, page))
    }

    pub async fn children(&self, identity: &Identity, id: u64) -> Result<Vec<Location>> {
        self.fetch_guarded(identity, id, Access::Read, "location").await?;
        self.locations.children(id).await
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: u64,
        request: UpdateLocationRequest,
    ) -> Result<Location> {
        if let Some(ref name) = request.name {
            validate_name(name)?;
        }
        validate_description(request.description.as_deref())?;
        self.fetch_guarded(identity, id, Access::Mutate, "location").await?;

        if request.parent_id.is_some() {
            self.move_to(identity, id, request.parent_id).await?;
        }
        self.locations
            .update_location(
                id,
                LocationUpdate {
                    name: request.name.map(|name| name.trim().to_string()),
                    location_type: request.location_type,
                    description: request.description,
                },
            )
            .await
    }

    /// Re-parent a location; cycles are rejected by the store
    pub async fn move_to(&self, identity: &Identity, id: u64, parent_id: Option<u64>) -> Result<Location> {
        self.fetch_guarded(identity, id, Access::Mutate, "location").await?;
        if let Some(parent_id) = parent_id {
            self.fetch_guarded(identity, parent_id, Access::Mutate, "parent location")
                .await?;
        }
        self.locations.set_parent(id, parent_id).await
    }

    /// Delete a location that has no children
    pub async fn delete(&self, identity: &Identity, id: u64) -> Result<()> {
        self.fetch_guarded(identity, id, Access::Mutate, "location").await?;
        self.locations.delete_location(id).await
    }
}
