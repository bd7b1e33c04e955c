//! Source inspection via `ffprobe -print_format json`.

use serde::Deserialize;
use std::path::Path;

use super::error::TranscodeError;
use crate::infrastructure::media::ToolRunner;

/// Duration and stream metadata extracted from a source file.
#[derive(Debug, Clone)]
pub struct ProbeInfo {
    pub duration_seconds: u64,
    pub format_name: Option<String>,
    pub audio_codec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
}

/// Inspect a local media file. Corrupt or unreadable input is fatal to the
/// job; callers do not retry this step.
pub async fn probe_media(
    runner: &dyn ToolRunner,
    ffprobe: &Path,
    input: &Path,
) -> Result<ProbeInfo, TranscodeError> {
    let args = vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        input.to_string_lossy().into_owned(),
    ];

    let output = runner.run(ffprobe, &args).await?;
    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &str) -> Result<ProbeInfo, TranscodeError> {
    let parsed: FfprobeOutput = serde_json::from_str(stdout)
        .map_err(|e| TranscodeError::Probe(format!("unparsable ffprobe output: {e}")))?;

    let format = parsed
        .format
        .ok_or_else(|| TranscodeError::Probe("no format section in ffprobe output".to_string()))?;

    // Whole seconds, truncated.
    let duration_seconds = format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| secs as u64)
        .ok_or_else(|| TranscodeError::Probe("source reports no duration".to_string()))?;

    let audio_codec = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| s.codec_name.clone());

    Ok(ProbeInfo {
        duration_seconds,
        format_name: format.format_name,
        audio_codec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_and_streams() {
        let stdout = r#"{
            "format": {"format_name": "mp3", "duration": "180.600000"},
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}]
        }"#;

        let info = parse_probe_output(stdout).unwrap();
        assert_eq!(info.duration_seconds, 180);
        assert_eq!(info.format_name.as_deref(), Some("mp3"));
        assert_eq!(info.audio_codec.as_deref(), Some("mp3"));
    }

    #[test]
    fn picks_audio_stream_from_video_container() {
        let stdout = r#"{
            "format": {"format_name": "mov,mp4,m4a,3gp", "duration": "42.0"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264"},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;

        let info = parse_probe_output(stdout).unwrap();
        assert_eq!(info.duration_seconds, 42);
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
    }

    #[test]
    fn missing_duration_is_fatal() {
        let stdout = r#"{"format": {"format_name": "mp3"}, "streams": []}"#;
        let err = parse_probe_output(stdout).unwrap_err();
        assert!(matches!(err, TranscodeError::Probe(_)));
    }

    #[test]
    fn garbage_output_is_fatal() {
        let err = parse_probe_output("not json at all").unwrap_err();
        assert!(matches!(err, TranscodeError::Probe(_)));
    }
}
