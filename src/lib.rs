//! MediVault - Personal health-record service
//!
//! Orchestrates a table-scoped record store and a prefix-listable object
//! store into a consistent per-user view: profile, named hospital list,
//! one note per hospital, and categorized file attachments. A thin axum
//! surface exposes the service operations, relays login calls to the
//! identity provider, and forwards chat messages to a hosted completion
//! API.

pub mod api;
pub mod blob;
pub mod chat;
pub mod config;
pub mod identity;
pub mod model;
pub mod record;
pub mod service;
