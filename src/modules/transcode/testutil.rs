//! Shared fakes for pipeline tests: an in-memory object store and a
//! scripted stand-in for ffmpeg/ffprobe.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::infrastructure::media::{ToolError, ToolOutput, ToolRunner};
use crate::infrastructure::storage::{ObjectStore, StorageError};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (Bytes, String)>>,
}

impl MemoryStore {
    pub fn seed(&self, key: &str, data: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            (
                Bytes::copy_from_slice(data),
                "application/octet-stream".to_string(),
            ),
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, ct)| ct.clone())
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError(format!("no such key: {key}")))
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }
}

/// Recognizes the three argument shapes the pipeline produces (probe,
/// audio extraction, HLS encode) and fabricates the files a real run
/// would leave behind.
pub struct FakeTools {
    duration: f64,
    /// Bitrate arguments whose encode invocations always fail; `"*"`
    /// fails every encode.
    fail_bitrates: Vec<String>,
    encode_counts: Mutex<BTreeMap<String, u32>>,
    pub extract_calls: AtomicU32,
    pub probe_calls: AtomicU32,
}

impl FakeTools {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            fail_bitrates: Vec::new(),
            encode_counts: Mutex::new(BTreeMap::new()),
            extract_calls: AtomicU32::new(0),
            probe_calls: AtomicU32::new(0),
        }
    }

    pub fn failing_all(duration: f64) -> Self {
        Self {
            fail_bitrates: vec!["*".to_string()],
            ..Self::new(duration)
        }
    }

    pub fn failing_bitrate(duration: f64, bitrate: u32) -> Self {
        Self {
            fail_bitrates: vec![bitrate.to_string()],
            ..Self::new(duration)
        }
    }

    pub fn encode_count(&self, bitrate: &str) -> u32 {
        self.encode_counts
            .lock()
            .unwrap()
            .get(bitrate)
            .copied()
            .unwrap_or(0)
    }
}

fn arg_after(args: &[String], flag: &str) -> String {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_default()
}

fn ok() -> Result<ToolOutput, ToolError> {
    Ok(ToolOutput {
        stdout: String::new(),
        stderr: String::new(),
    })
}

#[async_trait]
impl ToolRunner for FakeTools {
    async fn run(&self, _program: &Path, args: &[String]) -> Result<ToolOutput, ToolError> {
        // ffprobe
        if args.iter().any(|a| a == "-show_format") {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(ToolOutput {
                stdout: format!(
                    r#"{{"format":{{"format_name":"mp3","duration":"{}"}},"streams":[{{"codec_type":"audio","codec_name":"mp3"}}]}}"#,
                    self.duration
                ),
                stderr: String::new(),
            });
        }

        // audio extraction from a video container
        if args.iter().any(|a| a == "libmp3lame") {
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            let output = args.last().cloned().unwrap_or_default();
            std::fs::write(output, b"extracted-audio").unwrap();
            return ok();
        }

        // HLS rendition encode
        if args.iter().any(|a| a == "hls") {
            let bitrate = arg_after(args, "-b:a");
            *self
                .encode_counts
                .lock()
                .unwrap()
                .entry(bitrate.clone())
                .or_insert(0) += 1;

            if self.fail_bitrates.iter().any(|b| b == "*" || *b == bitrate) {
                return Err(ToolError {
                    tool: "ffmpeg".to_string(),
                    message: "encoder unavailable".to_string(),
                });
            }

            let segment_pattern = arg_after(args, "-hls_segment_filename");
            for i in 0..2 {
                let segment = segment_pattern.replace("%03d", &format!("{i:03}"));
                std::fs::write(segment, b"segment-data").unwrap();
            }
            let playlist = args.last().cloned().unwrap_or_default();
            std::fs::write(playlist, "#EXTM3U\n#EXT-X-PLAYLIST-TYPE:VOD\n").unwrap();
            return ok();
        }

        Err(ToolError {
            tool: "fake".to_string(),
            message: format!("unrecognized invocation: {args:?}"),
        })
    }
}
