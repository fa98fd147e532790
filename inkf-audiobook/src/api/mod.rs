//! HTTP API handlers for inkf-audiobook

pub mod audiobook;
pub mod health;
pub mod stripe_webhook;
pub mod usage;

pub use audiobook::audiobook_routes;
pub use health::health_routes;
pub use stripe_webhook::stripe_routes;
pub use usage::usage_routes;
