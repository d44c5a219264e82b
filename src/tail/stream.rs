use futures::Stream;
use futures::stream;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::logging::LOG_NOT_FOUND;

use super::text::{CrlfEncoder, take_utf8};

enum StreamState {
    Opening(PathBuf),
    Reading {
        file: File,
        pending: Vec<u8>,
        crlf: Option<CrlfEncoder>,
    },
    Done,
}

/// The current log content as a finite sequence of text chunks of at most
/// roughly `chunk_size` bytes. A missing file yields a single "not found"
/// chunk. With `crlf` set, line endings are sent as `\r\n`.
pub fn stream_log(path: PathBuf, chunk_size: usize, crlf: bool) -> impl Stream<Item = String> + Send + 'static {
    let chunk_size = chunk_size.max(1);
    let encoder = crlf.then(CrlfEncoder::default);

    stream::unfold(StreamState::Opening(path), move |state| async move {
        let (mut file, mut pending, mut crlf) = match state {
            StreamState::Opening(path) => match File::open(&path).await {
                Ok(file) => (file, Vec::new(), encoder),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Some((LOG_NOT_FOUND.to_string(), StreamState::Done));
                }
                Err(e) => return Some((format!("An error occurred: {e}"), StreamState::Done)),
            },
            StreamState::Reading {
                file,
                pending,
                crlf,
            } => (file, pending, crlf),
            StreamState::Done => return None,
        };

        let mut render = |text: String| match crlf.as_mut() {
            Some(encoder) => encoder.encode(&text),
            None => text,
        };

        let mut buf = vec![0u8; chunk_size];
        loop {
            match file.read(&mut buf).await {
                Ok(0) if pending.is_empty() => return None,
                Ok(0) => {
                    let rest = String::from_utf8_lossy(&pending).into_owned();
                    return Some((render(rest), StreamState::Done));
                }
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    let text = take_utf8(&mut pending);
                    if !text.is_empty() {
                        let text = render(text);
                        return Some((text, StreamState::Reading { file, pending, crlf }));
                    }
                }
                Err(e) => return Some((format!("An error occurred: {e}"), StreamState::Done)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_streams_whole_file_in_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let content = "line one\nline two\nline three\n".repeat(20);
        std::fs::write(&path, &content).unwrap();

        let chunks: Vec<String> = stream_log(path, 16, false).collect().await;
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 16));
        assert_eq!(chunks.concat(), content);
    }

    #[tokio::test]
    async fn test_crlf_translation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "a\nb\n").unwrap();

        let chunks: Vec<String> = stream_log(path, 64 * 1024, true).collect().await;
        assert_eq!(chunks.concat(), "a\r\nb\r\n");
    }

    #[tokio::test]
    async fn test_crlf_pair_on_chunk_boundary_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "ab\r\ncd\n").unwrap();

        // the first chunk ends right after '\r'
        let chunks: Vec<String> = stream_log(path, 3, true).collect().await;
        assert_eq!(chunks.concat(), "ab\r\ncd\r\n");
    }

    #[tokio::test]
    async fn test_missing_file_yields_not_found() {
        let dir = TempDir::new().unwrap();
        let chunks: Vec<String> = stream_log(dir.path().join("nope.log"), 1024, false)
            .collect()
            .await;
        assert_eq!(chunks, vec![LOG_NOT_FOUND.to_string()]);
    }

    #[tokio::test]
    async fn test_multibyte_chars_survive_small_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "€€€\n").unwrap();

        let chunks: Vec<String> = stream_log(path, 2, false).collect().await;
        assert_eq!(chunks.concat(), "€€€\n");
    }
}
