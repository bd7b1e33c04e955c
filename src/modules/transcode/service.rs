use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::future::try_join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::infrastructure::media::ToolRunner;
use crate::infrastructure::storage::ObjectStore;

use super::encoder;
use super::error::TranscodeError;
use super::normalize;
use super::playlist;
use super::pool::WorkerPool;
use super::probe;
use super::profiles::{self, QUALITY_PROFILES, QualityProfile};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const ENCODE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Everything the catalog service needs to mark a song playable.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub master_playlist_key: String,
    pub duration_seconds: u64,
    pub qualities: Vec<String>,
}

/// Drives one job end to end: workspace, download, probe, normalize,
/// per-quality encode/upload fan-out, master playlist. One instance is
/// shared by the whole process so every job competes for the same
/// [`WorkerPool`].
pub struct TranscodeService {
    storage: Arc<dyn ObjectStore>,
    tools: Arc<dyn ToolRunner>,
    pool: WorkerPool,
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    work_dir: PathBuf,
}

impl TranscodeService {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        tools: Arc<dyn ToolRunner>,
        pool: WorkerPool,
        ffmpeg_path: PathBuf,
        ffprobe_path: PathBuf,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            storage,
            tools,
            pool,
            ffmpeg_path,
            ffprobe_path,
            work_dir,
        }
    }

    pub async fn process_audio(
        &self,
        song_id: Uuid,
        raw_object_key: &str,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let started = Instant::now();
        info!(
            "Starting transcode for songId: {}, objectKey: {}",
            song_id, raw_object_key
        );

        // Exclusive to this job; dropped on every exit path, deleting the
        // job's working files.
        let workspace = tempfile::Builder::new()
            .prefix(&format!("transcode_{song_id}_"))
            .tempdir_in(&self.work_dir)?;

        let input = self.download_source(raw_object_key, workspace.path()).await?;

        let probed =
            probe::probe_media(self.tools.as_ref(), &self.ffprobe_path, &input).await?;
        debug!(
            "Probed {}: {}s, format {:?}, audio codec {:?}",
            input.display(),
            probed.duration_seconds,
            probed.format_name,
            probed.audio_codec
        );

        let audio = normalize::prepare_audio(
            self.tools.as_ref(),
            &self.ffmpeg_path,
            &input,
            workspace.path(),
        )
        .await?;

        let prefix = format!("hls/{song_id}/");
        let renditions = QUALITY_PROFILES.iter().map(|profile| {
            self.encode_quality_with_retry(song_id, &audio, workspace.path(), &prefix, profile)
        });
        let qualities = try_join_all(renditions).await?;

        let master_playlist_key = self.upload_master_playlist(&prefix, &qualities).await?;

        info!(
            "Completed transcode for songId: {} in {:?}",
            song_id,
            started.elapsed()
        );

        Ok(TranscodeOutput {
            master_playlist_key,
            duration_seconds: probed.duration_seconds,
            qualities,
        })
    }

    async fn download_source(
        &self,
        raw_object_key: &str,
        workspace: &Path,
    ) -> Result<PathBuf, TranscodeError> {
        let data = self.storage.get_object(raw_object_key).await?;
        info!("Downloaded {} bytes from {}", data.len(), raw_object_key);

        let input = workspace.join(format!("input.{}", profiles::file_extension(raw_object_key)));
        tokio::fs::write(&input, &data).await?;
        Ok(input)
    }

    /// One quality's unit of work: encode, then push the whole segment set.
    /// Timeouts and tool crashes are transient here; the attempt cap with
    /// linear backoff smooths over contention without masking real faults.
    async fn encode_quality_with_retry(
        &self,
        song_id: Uuid,
        audio: &Path,
        workspace: &Path,
        prefix: &str,
        profile: &QualityProfile,
    ) -> Result<String, TranscodeError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .encode_quality(song_id, audio, workspace, prefix, profile)
                .await
            {
                Ok(()) => return Ok(profile.name.to_string()),
                Err(err) if attempt < MAX_RETRY_ATTEMPTS => {
                    warn!(
                        "Transcode attempt {} failed for quality: {} - songId: {}: {}",
                        attempt, profile.name, song_id, err
                    );
                    sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(err) => {
                    return Err(TranscodeError::RetriesExhausted {
                        quality: profile.name.to_string(),
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
            }
        }
    }

    async fn encode_quality(
        &self,
        song_id: Uuid,
        audio: &Path,
        workspace: &Path,
        prefix: &str,
        profile: &QualityProfile,
    ) -> Result<(), TranscodeError> {
        info!(
            "Transcoding quality: {} for songId: {}",
            profile.name, song_id
        );

        let quality_dir = workspace.join("hls").join(profile.name);
        self.pool
            .run(
                ENCODE_TIMEOUT,
                encoder::encode_hls(
                    self.tools.as_ref(),
                    &self.ffmpeg_path,
                    audio,
                    &quality_dir,
                    profile.bitrate,
                ),
            )
            .await?;

        self.upload_rendition(&quality_dir, &format!("{prefix}{}/", profile.name))
            .await?;

        info!(
            "Completed transcoding quality: {} for songId: {}",
            profile.name, song_id
        );
        Ok(())
    }

    /// Push every file of one finished rendition in parallel. Any file
    /// failing, or the aggregate deadline passing, fails the whole set so
    /// the master playlist never references a partial rendition.
    async fn upload_rendition(
        &self,
        quality_dir: &Path,
        key_prefix: &str,
    ) -> Result<(), TranscodeError> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(quality_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        if files.is_empty() {
            return Err(TranscodeError::EmptyRendition(quality_dir.to_path_buf()));
        }

        let uploads = files.into_iter().map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.upload_file(path, format!("{key_prefix}{name}"))
        });

        match tokio::time::timeout(UPLOAD_TIMEOUT, try_join_all(uploads)).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(TranscodeError::Timeout(UPLOAD_TIMEOUT)),
        }
    }

    async fn upload_file(&self, path: PathBuf, key: String) -> Result<(), TranscodeError> {
        self.pool
            .run(UPLOAD_TIMEOUT, async {
                let data = tokio::fs::read(&path).await?;
                self.storage
                    .put_object(&key, Bytes::from(data), &content_type_for(&key))
                    .await?;
                debug!("Uploaded: {}", key);
                Ok(())
            })
            .await
    }

    async fn upload_master_playlist(
        &self,
        prefix: &str,
        qualities: &[String],
    ) -> Result<String, TranscodeError> {
        let body = playlist::master_playlist(qualities);
        let key = format!("{prefix}master.m3u8");

        self.storage
            .put_object(&key, Bytes::from(body), "application/vnd.apple.mpegurl")
            .await?;

        info!("Uploaded master playlist: {}", key);
        Ok(key)
    }
}

fn content_type_for(key: &str) -> String {
    if key.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl".to_string()
    } else if key.ends_with(".ts") {
        "video/MP2T".to_string()
    } else if key.ends_with(".aac") {
        "audio/aac".to_string()
    } else {
        mime_guess::from_path(key)
            .first_or_octet_stream()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::transcode::testutil::{FakeTools, MemoryStore};
    use std::sync::atomic::Ordering;

    fn service(
        store: &Arc<MemoryStore>,
        tools: &Arc<FakeTools>,
        work_dir: &Path,
    ) -> TranscodeService {
        TranscodeService::new(
            store.clone(),
            tools.clone(),
            WorkerPool::new(4),
            PathBuf::from("ffmpeg"),
            PathBuf::from("ffprobe"),
            work_dir.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn successful_job_writes_all_renditions_and_master() {
        let work_root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        store.seed("raw/abc_song.mp3", b"mp3-bytes");
        let tools = Arc::new(FakeTools::new(180.6));
        let svc = service(&store, &tools, work_root.path());
        let song_id = Uuid::new_v4();

        let out = svc.process_audio(song_id, "raw/abc_song.mp3").await.unwrap();

        assert_eq!(out.duration_seconds, 180);
        assert_eq!(out.master_playlist_key, format!("hls/{song_id}/master.m3u8"));
        assert_eq!(out.qualities, ["128kbps", "256kbps", "320kbps"]);

        for quality in ["128kbps", "256kbps", "320kbps"] {
            assert!(store.contains(&format!("hls/{song_id}/{quality}/index.m3u8")));
            assert!(store.contains(&format!("hls/{song_id}/{quality}/segment_000.ts")));
        }
        assert_eq!(
            store.content_type(&format!("hls/{song_id}/master.m3u8")),
            Some("application/vnd.apple.mpegurl".to_string())
        );
        assert_eq!(
            store.content_type(&format!("hls/{song_id}/128kbps/segment_000.ts")),
            Some("video/MP2T".to_string())
        );

        // Workspace is gone whatever the outcome.
        assert_eq!(std::fs::read_dir(work_root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn video_source_is_transparent_to_downstream_stages() {
        let work_root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        store.seed("raw/clip.mp4", b"mp4-bytes");
        let tools = Arc::new(FakeTools::new(180.0));
        let svc = service(&store, &tools, work_root.path());
        let song_id = Uuid::new_v4();

        let out = svc.process_audio(song_id, "raw/clip.mp4").await.unwrap();

        assert_eq!(tools.extract_calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.qualities.len(), QUALITY_PROFILES.len());
        assert_eq!(out.duration_seconds, 180);
    }

    #[tokio::test]
    async fn missing_source_fails_before_any_output() {
        let work_root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let tools = Arc::new(FakeTools::new(180.0));
        let svc = service(&store, &tools, work_root.path());
        let song_id = Uuid::new_v4();

        let err = svc.process_audio(song_id, "raw/missing.mp3").await.unwrap_err();

        assert!(matches!(err, TranscodeError::Storage(_)));
        assert!(store.keys_with_prefix("hls/").is_empty());
        assert_eq!(std::fs::read_dir(work_root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unavailable_encoder_fails_job_with_no_objects() {
        let work_root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        store.seed("raw/abc_song.mp3", b"mp3-bytes");
        let tools = Arc::new(FakeTools::failing_all(120.0));
        let svc = service(&store, &tools, work_root.path());
        let song_id = Uuid::new_v4();

        let err = svc.process_audio(song_id, "raw/abc_song.mp3").await.unwrap_err();

        match err {
            TranscodeError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {other}"),
        }
        assert!(store.keys_with_prefix(&format!("hls/{song_id}/")).is_empty());
        assert_eq!(std::fs::read_dir(work_root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn single_failing_quality_retries_to_cap_and_fails_job() {
        let work_root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        store.seed("raw/abc_song.mp3", b"mp3-bytes");
        let tools = Arc::new(FakeTools::failing_bitrate(120.0, 256_000));
        let svc = service(&store, &tools, work_root.path());
        let song_id = Uuid::new_v4();

        let err = svc.process_audio(song_id, "raw/abc_song.mp3").await.unwrap_err();

        match err {
            TranscodeError::RetriesExhausted {
                quality, attempts, ..
            } => {
                assert_eq!(quality, "256kbps");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetriesExhausted, got {other}"),
        }
        assert_eq!(tools.encode_count("256000"), 3);

        // No partial success: the master playlist never went out.
        assert!(!store.contains(&format!("hls/{song_id}/master.m3u8")));
        assert_eq!(std::fs::read_dir(work_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn content_types_follow_hls_conventions() {
        assert_eq!(content_type_for("a/index.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("a/segment_000.ts"), "video/MP2T");
        assert_eq!(content_type_for("a/init.aac"), "audio/aac");
        assert_eq!(content_type_for("a/unknown.bin"), "application/octet-stream");
    }
}
