use crate::ai::AiService;
use crate::models::AppData;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<AppData>>,
    pub ai: Arc<AiService>,
    pub ai_timeout: Duration,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: AppData, ai: AiService, ai_timeout: Duration) -> Self {
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            ai: Arc::new(ai),
            ai_timeout,
        }
    }
}
