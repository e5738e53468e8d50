use crate::domain::coupon::Coupon;
use crate::domain::money::Money;
use crate::domain::ports::{Catalog, CouponRepository, IdentityProvider, InventoryStore};
use crate::domain::resource::{CatalogItem, Resource, ResourceRef};
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Plans and bookable resources with their prices.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    plans: Arc<RwLock<HashMap<String, CatalogItem>>>,
    resources: Arc<RwLock<HashMap<String, CatalogItem>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_plan(&self, plan_id: impl Into<String>, item: CatalogItem) {
        self.plans.write().await.insert(plan_id.into(), item);
    }

    pub async fn add_resource(&self, resource_id: impl Into<String>, item: CatalogItem) {
        self.resources.write().await.insert(resource_id.into(), item);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn lookup(&self, item: &ResourceRef) -> Result<Option<CatalogItem>> {
        let found = match item {
            ResourceRef::Plan { plan_id } => self.plans.read().await.get(plan_id).copied(),
            ResourceRef::Seats { resource_id, .. } => {
                self.resources.read().await.get(resource_id).copied()
            }
        };
        Ok(found)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCouponRepository {
    coupons: Arc<RwLock<HashMap<String, Coupon>>>,
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, coupon: Coupon) -> Result<()> {
        coupon.validate()?;
        self.coupons.write().await.insert(coupon.code.clone(), coupon);
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn find(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.coupons.read().await.get(code).cloned())
    }
}

/// Session tokens mapped to purchaser references.
#[derive(Default, Clone)]
pub struct StaticSessions {
    sessions: Arc<RwLock<HashMap<String, String>>>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, token: impl Into<String>, purchaser: impl Into<String>) {
        self.sessions.write().await.insert(token.into(), purchaser.into());
    }
}

#[async_trait]
impl IdentityProvider for StaticSessions {
    async fn purchaser(&self, token: &str) -> Result<Option<String>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanSeed {
    pub id: String,
    pub price: Money,
    #[serde(default)]
    pub validity_days: u32,
}

#[derive(Debug, Deserialize)]
pub struct ResourceSeed {
    pub id: String,
    pub capacity: u32,
    pub unit_price: Money,
    #[serde(default)]
    pub validity_days: u32,
}

/// Startup data: what is for sale, which coupons exist, which sessions are live.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub plans: Vec<PlanSeed>,
    #[serde(default)]
    pub resources: Vec<ResourceSeed>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
    /// Session token -> purchaser reference.
    #[serde(default)]
    pub sessions: HashMap<String, String>,
}

impl CatalogSeed {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Loads the seed into the collaborators.
    ///
    /// Resources already present in the inventory store keep their current
    /// availability, so restarting on a persistent store does not refill seats.
    pub async fn apply(
        self,
        catalog: &InMemoryCatalog,
        coupons: &InMemoryCouponRepository,
        sessions: &StaticSessions,
        inventory: &dyn InventoryStore,
    ) -> Result<()> {
        for plan in self.plans {
            let price = Money::non_negative(plan.price.value())?;
            catalog
                .add_plan(
                    plan.id,
                    CatalogItem {
                        unit_price: price,
                        validity_days: plan.validity_days,
                    },
                )
                .await;
        }

        for seed in self.resources {
            let price = Money::non_negative(seed.unit_price.value())?;
            if inventory.resource(&seed.id).await?.is_none() {
                inventory
                    .put_resource(Resource::new(seed.id.clone(), seed.capacity, price))
                    .await?;
            }
            catalog
                .add_resource(
                    seed.id,
                    CatalogItem {
                        unit_price: price,
                        validity_days: seed.validity_days,
                    },
                )
                .await;
        }

        for coupon in self.coupons {
            coupons.add(coupon).await.map_err(|e| match e {
                CheckoutError::Validation(msg) => {
                    CheckoutError::Validation(format!("Catalog seed: {}", msg))
                }
                other => other,
            })?;
        }

        for (token, purchaser) in self.sessions {
            sessions.insert(token, purchaser).await;
        }
        Ok(())
    }
}
