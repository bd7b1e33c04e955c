use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;

mod app;
mod config;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::db::pool::connect_to_db;
use infrastructure::media::process::ProcessToolRunner;
use infrastructure::queue::rabbitmq::RabbitMqService;
use infrastructure::storage::s3::StorageService;
use modules::transcode::pool::WorkerPool;
use modules::transcode::service::TranscodeService;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting transcode service...");

    let config = AppConfig::new().expect("Missing required environment variables");

    let db = connect_to_db(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let queue = RabbitMqService::new(&config.amqp_url)
        .await
        .expect("Failed to connect to RabbitMQ");
    queue
        .declare_topology()
        .await
        .expect("Failed to declare RabbitMQ topology");

    let storage = StorageService::new(
        &config.minio_url,
        &config.minio_bucket,
        &config.minio_access_key,
        &config.minio_secret_key,
    )
    .await;

    let pool = WorkerPool::with_host_capacity();
    info!("Worker pool sized to {} workers", pool.size());

    let transcoder = Arc::new(TranscodeService::new(
        Arc::new(storage.clone()),
        Arc::new(ProcessToolRunner),
        pool,
        config.ffmpeg_path.clone(),
        config.ffprobe_path.clone(),
        config.work_dir.clone(),
    ));

    let state = AppState::new(config, db, queue, storage, transcoder);

    tokio::spawn(workers::transcoder::start_transcoder_worker(state.clone()));
    tokio::spawn(workers::dead_letter::start_dead_letter_worker(state.clone()));

    let app = app::create_app(state.clone()).await;

    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!("Health endpoint on http://{}", addr);

    axum::serve(listener, app).await.unwrap();
}
