//! Basket-keyed shopping cart service with switchable, deliberately injected defects.
//!
//! [`engine::CartEngine`] manages line items, [`orders::OrderSubmitter`] forwards
//! baskets to the downstream order service, and [`defects::DefectInjector`]
//! decides, per [`flags::FlagSet`] snapshot, whether each step behaves correctly.

pub mod api;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod defects;
pub mod engine;
pub mod error;
pub mod flags;
pub mod models;
pub mod orders;
pub mod routes;
pub mod schema;
pub mod store;
