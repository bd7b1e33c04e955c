use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::transcode::service::TranscodeService;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub queue: RabbitMqService,
    pub storage: StorageService,
    pub transcoder: Arc<TranscodeService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        queue: RabbitMqService,
        storage: StorageService,
        transcoder: Arc<TranscodeService>,
    ) -> Self {
        Self {
            config,
            db,
            queue,
            storage,
            transcoder,
        }
    }
}
