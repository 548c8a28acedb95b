//! Crop disease prediction backed by external model services.

pub mod catalog;
mod client;
pub mod handlers;

pub use catalog::{Prediction, Severity};
pub use client::{MlClient, ModelAnswer, ModelEndpoint};
