//! Configuration for the default collaborators.
//!
//! A single `webdeploy.toml` describes the host: where docroots live, how
//! databases are created, whether task scheduling is permitted, and which
//! endpoint publishes releases.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_deploy_toml, parse_deploy_toml_str, to_toml};
pub use paths::{CONFIG_FILE_NAME, config_path_in, default_config_dir};
pub use schema::{
    CatalogSection, DatabaseSection, DeployConfig, InstallerSection, SchedulerSection,
    SitesSection,
};
pub use store::ConfigStore;
