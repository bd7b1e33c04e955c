use std::path::Path;

use super::error::TranscodeError;
use crate::infrastructure::media::ToolRunner;

/// HLS target segment length in seconds.
pub const SEGMENT_SECONDS: u32 = 10;
pub const PLAYLIST_NAME: &str = "index.m3u8";
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// Encode one rendition: AAC at the profile bitrate, 44.1 kHz, segmented
/// into a complete VOD playlist under `out_dir`.
pub async fn encode_hls(
    runner: &dyn ToolRunner,
    ffmpeg: &Path,
    input: &Path,
    out_dir: &Path,
    bitrate: u32,
) -> Result<(), TranscodeError> {
    std::fs::create_dir_all(out_dir)?;

    let playlist = out_dir.join(PLAYLIST_NAME);
    let segments = out_dir.join(SEGMENT_PATTERN);

    let args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        bitrate.to_string(),
        "-ar".to_string(),
        "44100".to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        SEGMENT_SECONDS.to_string(),
        "-hls_list_size".to_string(),
        "0".to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_segment_filename".to_string(),
        segments.to_string_lossy().into_owned(),
        playlist.to_string_lossy().into_owned(),
    ];

    runner.run(ffmpeg, &args).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::transcode::testutil::FakeTools;

    #[tokio::test]
    async fn produces_playlist_and_segments() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("audio.mp3");
        std::fs::write(&input, b"audio").unwrap();
        let out_dir = dir.path().join("hls").join("128kbps");

        let tools = FakeTools::new(30.0);
        encode_hls(&tools, Path::new("ffmpeg"), &input, &out_dir, 128_000)
            .await
            .unwrap();

        assert!(out_dir.join("index.m3u8").exists());
        assert!(out_dir.join("segment_000.ts").exists());
        assert_eq!(tools.encode_count("128000"), 1);
    }

    #[tokio::test]
    async fn encoder_failure_surfaces_as_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("audio.mp3");
        std::fs::write(&input, b"audio").unwrap();

        let tools = FakeTools::failing_all(30.0);
        let err = encode_hls(
            &tools,
            Path::new("ffmpeg"),
            &input,
            &dir.path().join("out"),
            128_000,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TranscodeError::Tool(_)));
    }
}
