// src/config/mod.rs

//! Project configuration: TOML model, loading and validation.
//!
//! - [`model`] mirrors the TOML file (`RawConfigFile`) and the validated
//!   `ProjectConfig`.
//! - [`loader`] reads files and picks the default location.
//! - [`validate`] turns a raw config into a validated one.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_for_project};
pub use model::{
    OptionValue, ProfileOptions, ProfilesSection, ProjectConfig, ProjectSection,
    RawConfigFile, RuntimeSection,
};
