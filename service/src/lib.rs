use config::Config;
use log::info;
use sse::{Acceptor, Manager, Streamer};
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<Manager>,
    pub sse_acceptor: Acceptor,
    pub streamer: Streamer,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        let settings = app_config.stream_settings();
        info!(
            "Stream hub config: heartbeat_interval={:?}, write_timeout={:?}, channel_capacity={}",
            settings.heartbeat_interval,
            settings.write_timeout,
            app_config.stream_channel_capacity(),
        );

        let sse_manager = Arc::new(Manager::new(settings));
        Self {
            sse_acceptor: Acceptor::new(sse_manager.clone()),
            streamer: Streamer::new(sse_manager.clone()),
            sse_manager,
            config: app_config,
        }
    }
}
