//! Application layer orchestrating the domain.
//!
//! `CheckoutEngine` wires the services together: `CheckoutService` places orders
//! and starts payments, `CallbackIngress` authenticates provider traffic and
//! `Reconciler` applies the resulting confirmations. All of them share the
//! injected stores; there is no ambient state.

pub mod checkout;
pub mod discount;
pub mod engine;
pub mod ingress;
pub mod reconciler;
