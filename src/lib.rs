//! Gatewarden - Session state and route access guards.
//!
//! This crate orchestrates a third-party identity provider (Firebase
//! Authentication) and a user profile store into a single observable
//! session, and provides the guard predicates a router evaluates before
//! permitting navigation.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod guards;
pub mod ports;
