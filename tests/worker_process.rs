//! Runs the real binary as a worker, with a shell script standing in for gallery-dl
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use gallery_dl_server::config::{DownloaderConfig, HumanDuration, SupervisorConfig};
use gallery_dl_server::jobs::{JobOptions, JobOutcome, Supervisor, VideoOptions};
use gallery_dl_server::logging::{Level, LogRecord, RecordSink};
use gallery_dl_server::observability::Metrics;
use gallery_dl_server::worker::ProcessLauncher;

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    fn messages(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.level, r.message.clone()))
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn handle(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
    }
}

fn write_script(dir: &Path, body: &str) -> String {
    let path = dir.join("fake-gallery-dl");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn supervisor(program: String, config_paths: Vec<std::path::PathBuf>) -> (Supervisor, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    let launcher = ProcessLauncher::new(
        env!("CARGO_BIN_EXE_gallery-dl-server"),
        DownloaderConfig {
            program,
            config_paths,
            ..DownloaderConfig::default()
        },
    );
    let settings = SupervisorConfig {
        poll_interval: HumanDuration::from_millis(50),
        join_timeout: HumanDuration::from_millis(2000),
        ..SupervisorConfig::default()
    };
    let supervisor = Supervisor::new(Arc::new(launcher), sink.clone(), settings, Arc::new(Metrics::new()));
    (supervisor, sink)
}

#[tokio::test]
async fn test_worker_process_relays_tool_output() {
    let temp_dir = TempDir::new().unwrap();
    let conf = temp_dir.path().join("gallery-dl.conf");
    std::fs::write(&conf, r#"{"extractor": {"ytdl": {"cmdline-args": ["-x", "--no-mtime"]}}}"#).unwrap();

    // prints the effective config file it was given, then some output
    let script = write_script(
        temp_dir.path(),
        "while [ $# -gt 1 ]; do\n\
           if [ \"$1\" = \"--config\" ]; then tr -d ' \\n' < \"$2\"; echo; fi\n\
           shift\n\
         done\n\
         echo \"/downloads/$1.jpg\"\n\
         echo '# /downloads/old.jpg'\n\
         exit 0\n",
    );

    let (supervisor, sink) = supervisor(script, vec![conf]);
    let submitted = supervisor
        .submit(Some("item"), JobOptions::with_video(VideoOptions::DownloadVideo))
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(20), submitted.handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, JobOutcome::Completed);

    let messages = sink.messages();
    assert!(messages.contains(&(Level::Info, "Reloaded gallery-dl configuration.".to_string())));
    assert!(
        messages.contains(&(Level::Info, r#"{"extractor":{"ytdl":{"cmdline-args":["--no-mtime"]}}}"#.to_string())),
        "{messages:?}"
    );

    let jpg = messages.iter().position(|(_, m)| m == "/downloads/item.jpg").unwrap();
    let (level, archived) = &messages[jpg + 1];
    assert_eq!(*level, Level::Warning);
    assert!(archived.ends_with("/downloads/old.jpg"));
    assert_eq!(
        messages.last().unwrap(),
        &(Level::Info, "Download process exited successfully".to_string())
    );
}

#[tokio::test]
async fn test_worker_process_failure_code() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "echo 'bad url' >&2\nexit 3\n");

    let (supervisor, sink) = supervisor(script, Vec::new());
    let submitted = supervisor.submit(Some("item"), JobOptions::default()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(20), submitted.handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, JobOutcome::Failed { code: Some(3) });

    let messages = sink.messages();
    assert!(messages.contains(&(Level::Error, "bad url".to_string())));
    assert_eq!(
        messages.last().unwrap(),
        &(Level::Error, "Download failed with exit code: 3".to_string())
    );
}

#[tokio::test]
async fn test_worker_process_killed_on_marker() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "echo 'ERROR: This live event will begin soon. Video should already be available'\n\
         sleep 5\n\
         echo 'too late'\n",
    );

    let (supervisor, sink) = supervisor(script, Vec::new());
    let submitted = supervisor.submit(Some("live"), JobOptions::default()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(4), submitted.handle)
        .await
        .expect("worker was not killed")
        .unwrap();
    assert!(matches!(outcome, JobOutcome::Killed { .. }), "{outcome:?}");

    let messages = sink.messages();
    assert!(messages.contains(&(
        Level::Warning,
        "Terminating process as video is not available".to_string()
    )));
    assert!(!messages.iter().any(|(_, m)| m == "too late"));
}
