//! College enrichment pipeline.
//!
//! Reads a base list of institutions, asks an LM for structured attributes
//! about each one, keeps the results in a flat CSV store, and serves that
//! store over HTTP while a background worker fills it in.
pub mod cli;
mod config;
mod lm;
mod pipeline;
pub mod record;
mod server;
mod service;
pub mod store;
pub mod workflow;
