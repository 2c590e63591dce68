//! Exoplanet catalog service for a browser 3D viewer: CSV ingestion with
//! column normalisation, range/exact filters, per-star-system aggregation
//! and classifier annotation.

pub mod api;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod predict;
pub mod registry;
pub mod server;
