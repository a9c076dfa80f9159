pub mod app_config;
pub mod model;

pub use app_config::{AppConfig, load_config, setup_http_client};
pub use model::{ServiceConfig, StoreConfig};
