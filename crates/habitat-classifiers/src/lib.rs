//! habitat-classifiers: species habitat suitability modelling on raster stacks.
//!
//! This crate assembles aligned environmental raster layers into feature
//! stacks, samples them at labelled point observations, cross-validates and
//! fits a fixed catalogue of classifiers (tree ensembles, boosted trees,
//! logistic regression, a small neural network) and projects every fitted
//! model back onto the full raster grid of each climate scenario.
//!
//! Missing environmental data is dropped from training rows and masked out
//! of every output raster; see [`inference`] for the sentinel scheme.
pub mod config;
pub mod cross_validation;
pub mod error;
pub mod imputation;
pub mod inference;
pub mod io;
pub mod models;
pub mod orchestrator;
pub mod preprocessing;
pub mod raster;
pub mod report;
pub mod stack;
pub mod stats;
pub mod target;
pub mod training;

pub use error::{HabitatError, Result};
