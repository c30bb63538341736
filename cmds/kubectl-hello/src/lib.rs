pub mod commands;
pub mod config;
pub mod error;
pub mod k8s;
pub mod kustomize;
pub mod manifest;
pub mod record;
pub mod resolve;
pub mod resource;
pub mod specifier;
pub mod telemetry;
pub mod template;
pub mod visitor;
