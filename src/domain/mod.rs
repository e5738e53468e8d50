//! Entities, value objects and the ports the engine depends on.

pub mod confirmation;
pub mod coupon;
pub mod money;
pub mod order;
pub mod ports;
pub mod resource;
