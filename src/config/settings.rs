use crate::config::env::{self, EnvKey};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub amqp_url: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub work_dir: PathBuf,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            amqp_url: env::get(EnvKey::AmqpUrl)?,
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_bucket: env::get(EnvKey::MinioBucket)?,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg").into(),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe").into(),
            work_dir: env::get(EnvKey::WorkDir)
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
        })
    }
}
