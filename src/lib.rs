pub mod ai;
pub mod analytics;
pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod stats;
pub mod storage;
pub mod state;

pub use ai::{AiService, TrendClassifier};
pub use analytics::{AnalyticsAggregator, AnalyticsReport};
pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_data;
