use std::sync::Arc;

use crate::config::Config;
use crate::services::credentials::CredentialChain;
use crate::services::describe::GeminiDescriber;
use crate::services::gemini::GeminiClient;
use crate::services::judge::GeminiJudge;
use crate::services::media::MediaEncoder;
use crate::services::pipeline::Pipeline;
use crate::services::song::LyriaClient;
use crate::services::status_store::StatusStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn store(&self) -> &StatusStore {
        self.pipeline.store()
    }
}

/// Wires the hosted-model clients into a pipeline. Model calls carry no
/// timeout.
pub fn build_pipeline(config: &Config, store: StatusStore) -> Pipeline {
    let http = reqwest::Client::new();
    let gemini = GeminiClient::new(
        http.clone(),
        config.gemini_api_base.clone(),
        config.google_api_key.clone(),
    );

    let describer = GeminiDescriber::new(
        gemini.clone(),
        config.gemini_model.clone(),
        config.gemini_video_model.clone(),
    );
    let judge = GeminiJudge::new(gemini, config.gemini_model.clone());
    let lyria = LyriaClient {
        credentials: CredentialChain::google(config, http.clone()),
        http,
        api_base: config.vertex_base(),
        project: config.cloud_project.clone(),
        region: config.cloud_region.clone(),
        model: config.lyria_model.clone(),
        negative_prompt: config.song_negative_prompt.clone(),
        seed: config.song_seed,
    };

    Pipeline::new(
        store,
        MediaEncoder::new(config.ffmpeg_path.clone()),
        Arc::new(describer),
        Arc::new(judge),
        Arc::new(lyria),
        config.song_dir.clone(),
    )
}
