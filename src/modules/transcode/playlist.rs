use super::profiles;

/// Render the master manifest for the renditions that completed, lowest
/// bitrate first regardless of the order they finished in.
pub fn master_playlist(qualities: &[String]) -> String {
    let mut entries: Vec<(&str, u32)> = qualities
        .iter()
        .filter_map(|name| profiles::bitrate_for(name).map(|b| (name.as_str(), b)))
        .collect();
    entries.sort_by_key(|(_, bitrate)| *bitrate);

    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for (name, bitrate) in entries {
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={bitrate},CODECS=\"mp4a.40.2\",NAME=\"{name}\"\n"
        ));
        playlist.push_str(&format!("{name}/index.m3u8\n"));
    }

    playlist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_qualities() {
        let qualities = vec![
            "128kbps".to_string(),
            "256kbps".to_string(),
            "320kbps".to_string(),
        ];

        let expected = "#EXTM3U\n\
            #EXT-X-VERSION:3\n\
            #EXT-X-STREAM-INF:BANDWIDTH=128000,CODECS=\"mp4a.40.2\",NAME=\"128kbps\"\n\
            128kbps/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=256000,CODECS=\"mp4a.40.2\",NAME=\"256kbps\"\n\
            256kbps/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=320000,CODECS=\"mp4a.40.2\",NAME=\"320kbps\"\n\
            320kbps/index.m3u8\n";

        assert_eq!(master_playlist(&qualities), expected);
    }

    #[test]
    fn orders_by_bitrate_not_completion_order() {
        let qualities = vec![
            "320kbps".to_string(),
            "128kbps".to_string(),
            "256kbps".to_string(),
        ];

        let playlist = master_playlist(&qualities);
        let first = playlist.find("128kbps").unwrap();
        let second = playlist.find("256kbps").unwrap();
        let third = playlist.find("320kbps").unwrap();
        assert!(first < second && second < third);
    }
}
