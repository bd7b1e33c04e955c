/// One target rendition of the adaptive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub name: &'static str,
    pub bitrate: u32,
}

/// Renditions produced for every song, ascending bitrate. The master
/// playlist lists them in this order.
pub const QUALITY_PROFILES: [QualityProfile; 3] = [
    QualityProfile {
        name: "128kbps",
        bitrate: 128_000,
    },
    QualityProfile {
        name: "256kbps",
        bitrate: 256_000,
    },
    QualityProfile {
        name: "320kbps",
        bitrate: 320_000,
    },
];

const SUPPORTED_EXTENSIONS: [&str; 12] = [
    "mp3", "mp4", "m4a", "wav", "flac", "aac", "ogg", "wma", "webm", "mkv", "avi", "mov",
];

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "avi", "mov", "webm"];

pub fn bitrate_for(name: &str) -> Option<u32> {
    QUALITY_PROFILES
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.bitrate)
}

/// Extension of an uploaded object key. Anything outside the allow-list
/// (or a key with no extension at all) falls back to mp3.
pub fn file_extension(object_key: &str) -> String {
    match object_key.rsplit_once('.').map(|(_, e)| e.to_lowercase()) {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => ext,
        _ => "mp3".to_string(),
    }
}

pub fn is_video_format(extension: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&extension.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_ascending_by_bitrate() {
        let bitrates: Vec<u32> = QUALITY_PROFILES.iter().map(|p| p.bitrate).collect();
        let mut sorted = bitrates.clone();
        sorted.sort_unstable();
        assert_eq!(bitrates, sorted);
        assert_eq!(
            QUALITY_PROFILES.map(|p| p.name),
            ["128kbps", "256kbps", "320kbps"]
        );
    }

    #[test]
    fn bitrate_lookup() {
        assert_eq!(bitrate_for("256kbps"), Some(256_000));
        assert_eq!(bitrate_for("64kbps"), None);
    }

    #[test]
    fn extension_from_object_key() {
        assert_eq!(file_extension("raw/abc_song.mp3"), "mp3");
        assert_eq!(file_extension("raw/clip.MKV"), "mkv");
        assert_eq!(file_extension("raw/noext"), "mp3");
        assert_eq!(file_extension("raw/archive.zip"), "mp3");
    }

    #[test]
    fn video_detection() {
        assert!(is_video_format("mp4"));
        assert!(is_video_format("WEBM"));
        assert!(!is_video_format("mp3"));
        assert!(!is_video_format("flac"));
    }
}
