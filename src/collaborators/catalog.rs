//! Category and service lookups used to seed the price list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Catalog;
use super::backend::BackendClient;
use crate::error::CollaboratorError;

const SERVICE: &str = "catalog";

/// A vendor category as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

/// A service offered by the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogService {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vendor_category_id: Option<i64>,
}

/// Ids of the services belonging to `category_id`, in listing order.
pub fn services_in_category(services: &[CatalogService], category_id: i64) -> Vec<i64> {
    services
        .iter()
        .filter(|s| s.vendor_category_id == Some(category_id))
        .map(|s| s.id)
        .collect()
}

#[async_trait]
impl Catalog for BackendClient {
    async fn list_categories(&self) -> Result<Vec<VendorCategory>, CollaboratorError> {
        self.get_json(
            SERVICE,
            "/admin/vendor-categories",
            "Failed to load categories. Please try again later.",
        )
        .await
    }

    async fn list_services(&self) -> Result<Vec<CatalogService>, CollaboratorError> {
        self.get_json(
            SERVICE,
            "/admin/services",
            "Failed to load services for this category",
        )
        .await
    }
}
