//! Technician dispatch service
//!
//! Ranks a technician's assigned jobs by distance from their current
//! position and closes jobs out through a one-time-code handshake with the
//! booking service.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
