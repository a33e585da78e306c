//! PYME Credit-Risk Scoring Library
//!
//! This library provides the scoring-result pipeline behind the PYME risk
//! pages: normalizing analyzer decisions, keeping them in the session across
//! page navigations, calling the external analyzer and projecting what-if
//! simulations.
//!
//! # Modules
//!
//! - `api`: HTTP-layer components.
//! - `core`: Snapshot normalization, simulation projection and shared models.
//! - `integrations`: External analyzer client and the offline model.
//! - `backend`: Remote/offline dispatch.
//! - `cache_validator`: Checksummed session entries.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and application state.
//! - `local_model`: Deterministic offline scoring model.
//! - `models`: Snapshot, statistics, simulation and wire models.
//! - `normalizer`: Decision payload to snapshot.
//! - `pages`: Dashboard and simulation view models.
//! - `projector`: Simulation projection and history.
//! - `scoring_client`: External analyzer client.
//! - `session`: Session cache.

pub mod api;
pub mod core;
pub mod integrations;

pub mod backend;
pub mod cache_validator;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod local_model;
pub mod models;
pub mod normalizer;
pub mod pages;
pub mod projector;
pub mod scoring_client;
pub mod session;
