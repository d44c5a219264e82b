//! Per-job edits to the downloader's JSON configuration

use serde_json::{Map, Value, json};

use crate::jobs::{JobOptions, VideoOptions};

const AUDIO_FLAGS: [&str; 2] = ["--extract-audio", "-x"];
const AUDIO_POSTPROCESSOR: &str = "FFmpegExtractAudio";

/// Apply `options` to a freshly loaded configuration in place
pub fn apply_overrides(config: &mut Value, options: &JobOptions) {
    match options.video_options {
        VideoOptions::DownloadVideo => strip_audio_only(config),
        VideoOptions::ExtractAudio => force_audio_extraction(config),
        VideoOptions::NoneSelected => {}
    }
}

/// Remove every element of `list` matching `predicate`, returning the removed ones.
pub fn remove_from_list(list: &mut Vec<Value>, predicate: impl Fn(&Value) -> bool) -> Vec<Value> {
    let (removed, kept) = std::mem::take(list).into_iter().partition(|v| predicate(v));
    *list = kept;
    removed
}

/// Remove `key` from `map`, only when it holds `expected` if one is given.
pub fn remove_from_map(map: &mut Map<String, Value>, key: &str, expected: Option<&Value>) -> Option<Value> {
    match (map.get(key), expected) {
        (Some(current), Some(expected)) if current != expected => None,
        (Some(_), _) => map.remove(key),
        (None, _) => None,
    }
}

fn strip_audio_only(config: &mut Value) {
    if let Some(Value::Array(args)) = config.pointer_mut("/extractor/ytdl/cmdline-args") {
        let removed = remove_from_list(args, |arg| {
            arg.as_str().is_some_and(|a| AUDIO_FLAGS.contains(&a))
        });
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "Removed audio-only command line flags");
        }
    }

    let Some(Value::Object(raw)) = config.pointer_mut("/extractor/ytdl/raw-options") else {
        return;
    };

    remove_from_map(raw, "writethumbnail", Some(&Value::Bool(false)));

    if let Some(Value::Array(postprocessors)) = raw.get_mut("postprocessors") {
        remove_from_list(postprocessors, |pp| {
            pp.get("key").and_then(Value::as_str) == Some(AUDIO_POSTPROCESSOR)
        });
    }
}

fn force_audio_extraction(config: &mut Value) {
    if !config.is_object() {
        *config = Value::Object(Map::new());
    }
    // indexing a null slot turns it into an empty object
    let mut section = config;
    for key in ["extractor", "ytdl"] {
        section = &mut section[key];
        if !section.is_object() {
            *section = Value::Null;
        }
    }
    section["raw-options"] = json!({
        "writethumbnail": false,
        "postprocessors": [{
            "key": AUDIO_POSTPROCESSOR,
            "preferredcodec": "best",
            "preferredquality": 320,
        }],
    });
}
