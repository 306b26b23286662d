//! Integration tests for reactive query bindings

mod binding_lifecycle;
mod config_integration;
mod descriptor_builder;
mod scenarios;
mod test_utils;
