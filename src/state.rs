use crate::ai::{AiResult, GeminiClient, GenerativeModel};
use crate::config::Config;
use crate::models::AppData;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub default_user: String,
    pub data: Arc<Mutex<AppData>>,
    pub model: Option<Arc<dyn GenerativeModel>>,
}

impl AppState {
    pub fn new(config: &Config, data: AppData) -> AiResult<Self> {
        let model = match config.gemini.clone() {
            Some(gemini) => Some(Arc::new(GeminiClient::new(gemini)?) as Arc<dyn GenerativeModel>),
            None => None,
        };
        Ok(Self {
            data_path: config.data_path.clone(),
            default_user: config.default_user.clone(),
            data: Arc::new(Mutex::new(data)),
            model,
        })
    }

    pub fn with_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }
}
