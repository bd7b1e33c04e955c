use std::path::{Path, PathBuf};
use tracing::info;

use super::error::TranscodeError;
use super::profiles;
use crate::infrastructure::media::ToolRunner;

/// Bitrate used when stripping the audio track out of a video upload. High
/// enough that every downstream rendition encodes from it without loss of
/// target quality.
const EXTRACT_BITRATE: u32 = 320_000;

const EXTRACTED_FILE: &str = "extracted_audio.mp3";

/// Make sure downstream encoders get an audio-only input. Video uploads
/// are stripped once per job; audio uploads pass through untouched.
pub async fn prepare_audio(
    runner: &dyn ToolRunner,
    ffmpeg: &Path,
    input: &Path,
    workspace: &Path,
) -> Result<PathBuf, TranscodeError> {
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if !profiles::is_video_format(&extension) {
        return Ok(input.to_path_buf());
    }

    info!("Detected video format, extracting audio: {}", input.display());

    let output = workspace.join(EXTRACTED_FILE);
    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-b:a".to_string(),
        EXTRACT_BITRATE.to_string(),
        "-f".to_string(),
        "mp3".to_string(),
        output.to_string_lossy().into_owned(),
    ];

    runner.run(ffmpeg, &args).await?;

    info!(
        "Extracted audio from video: {} -> {}",
        input.display(),
        output.display()
    );
    Ok(output)
}
