use super::checkout::CheckoutService;
use super::discount::DiscountResolver;
use super::ingress::CallbackIngress;
use super::reconciler::Reconciler;
use crate::domain::order::{Order, OrderId};
use crate::domain::ports::{
    CatalogRef, ClockRef, CouponRepositoryRef, IdGeneratorRef, IdentityProviderRef, NotifierRef,
    OrderStoreRef,
};
use crate::error::{CheckoutError, Result};
use crate::gateway::GatewayRegistry;

/// Everything the engine needs from the outside world, constructed once at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: OrderStoreRef,
    pub catalog: CatalogRef,
    pub coupons: CouponRepositoryRef,
    pub notifier: NotifierRef,
    pub identity: IdentityProviderRef,
    pub ids: IdGeneratorRef,
    pub clock: ClockRef,
}

/// The main entry point for placing, paying and reconciling orders.
///
/// `CheckoutEngine` owns the services and hands them the same store, so every
/// state change goes through the store's transactional paths.
#[derive(Clone)]
pub struct CheckoutEngine {
    pub checkout: CheckoutService,
    pub reconciler: Reconciler,
    pub ingress: CallbackIngress,
    orders: OrderStoreRef,
    identity: IdentityProviderRef,
}

impl CheckoutEngine {
    /// Wires the services.
    ///
    /// # Arguments
    ///
    /// * `collaborators` - Stores and lookups shared by all services.
    /// * `gateways` - Payment providers available to this process.
    pub fn new(collaborators: Collaborators, gateways: GatewayRegistry) -> Self {
        let Collaborators {
            orders,
            catalog,
            coupons,
            notifier,
            identity,
            ids,
            clock,
        } = collaborators;

        let reconciler = Reconciler::new(orders.clone(), catalog.clone(), notifier, clock.clone());
        let checkout = CheckoutService::new(
            orders.clone(),
            catalog,
            DiscountResolver::new(coupons),
            gateways.clone(),
            ids,
            clock,
            reconciler.clone(),
        );
        let ingress = CallbackIngress::new(gateways, orders.clone(), reconciler.clone());

        Self {
            checkout,
            reconciler,
            ingress,
            orders,
            identity,
        }
    }

    /// Resolves a session token to a purchaser reference.
    pub async fn purchaser(&self, token: &str) -> Result<String> {
        self.identity
            .purchaser(token)
            .await?
            .ok_or(CheckoutError::Unauthorized)
    }

    pub async fn order(&self, id: &OrderId) -> Result<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(id.to_string()))
    }

    /// Final state of every order, sorted by id.
    pub async fn orders(&self) -> Result<Vec<Order>> {
        self.orders.all().await
    }
}
