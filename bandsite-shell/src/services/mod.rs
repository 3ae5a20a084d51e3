//! Outbound services: backend API and analytics

pub mod analytics;
pub mod api;

pub use analytics::{Analytics, AnalyticsModule};
pub use api::{ApiClient, BookingRequest, ContactForm};
