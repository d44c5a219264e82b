//! Per-viewer tail state over the shared log file

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::text::take_utf8;

/// The last progress line resent to this viewer and where it starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailCursor {
    pub offset: u64,
    pub last_line: String,
}

/// Follows the log file from the point of connection onwards.
///
/// Every poll sends whatever was appended since the previous one. Progress
/// lines are redrawn in place by the downloader, so a viewer may have seen
/// only fragments of one; once such a line is finished (another line follows
/// it) it is resent whole, ahead of the new content.
#[derive(Debug)]
pub struct TailSession {
    path: PathBuf,
    file: File,
    progress_marker: String,
    cursor: TailCursor,
    read_pos: u64,
    last_size: u64,
    pending: Vec<u8>,
}

impl TailSession {
    /// Opens the file and positions the session at its current end
    pub async fn open(path: impl AsRef<Path>, progress_marker: impl Into<String>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await?;
        let size = file.seek(SeekFrom::End(0)).await?;

        Ok(Self {
            path,
            file,
            progress_marker: progress_marker.into(),
            cursor: TailCursor::default(),
            read_pos: size,
            last_size: size,
            pending: Vec::new(),
        })
    }

    pub fn cursor(&self) -> &TailCursor {
        &self.cursor
    }

    /// One poll step. `Ok(None)` means nothing to send this time.
    pub async fn poll(&mut self) -> std::io::Result<Option<String>> {
        let current = tokio::fs::metadata(&self.path).await?.len();

        if current < self.last_size || current < self.read_pos {
            tracing::debug!(path = %self.path.display(), "Log file truncated, restarting tail");
            self.read_pos = 0;
            self.last_size = 0;
            self.cursor = TailCursor::default();
            self.pending.clear();
            return Ok(None);
        }

        if current == self.last_size {
            return Ok(None);
        }

        let prior = self.read_pos;
        self.file.seek(SeekFrom::Start(prior)).await?;
        let mut fresh = Vec::new();
        self.file.read_to_end(&mut fresh).await?;
        self.read_pos += fresh.len() as u64;
        self.last_size = current.max(self.read_pos);

        let mut staged = String::new();
        match previous_line(&mut self.file, prior, &fresh).await? {
            Some((line, offset)) if line.contains(&self.progress_marker) => {
                if line != self.cursor.last_line {
                    staged.push_str(&line);
                    self.cursor = TailCursor {
                        offset,
                        last_line: line,
                    };
                }
            }
            _ => self.cursor = TailCursor::default(),
        }

        self.pending.extend_from_slice(&fresh);
        staged.push_str(&take_utf8(&mut self.pending));

        if staged.is_empty() {
            return Ok(None);
        }
        Ok(Some(staged))
    }
}

const SCAN_BLOCK: u64 = 4096;
const MAX_RECOVERED_LINE: u64 = 64 * 1024;

/// The line before the final one once `fresh` (the bytes read from `prior`
/// to EOF) is appended, with its trailing newline and start offset. Only a
/// line starting before `prior`, i.e. one the viewer has at least partly
/// seen, is returned. The final line is the trailing partial line, or the
/// last complete line when the file ends in `\n`.
async fn previous_line(file: &mut File, prior: u64, fresh: &[u8]) -> std::io::Result<Option<(String, u64)>> {
    if fresh.is_empty() {
        return Ok(None);
    }

    let body = fresh.strip_suffix(b"\n").unwrap_or(fresh);
    let (start, end) = match body.iter().rposition(|&b| b == b'\n') {
        Some(j) if body[..j].contains(&b'\n') => return Ok(None),
        Some(j) => (line_start(file, prior).await?, prior + j as u64),
        None => {
            let Some(end) = line_start(file, prior).await?.and_then(|s| s.checked_sub(1)) else {
                return Ok(None);
            };
            (line_start(file, end).await?, end)
        }
    };
    let Some(start) = start else {
        return Ok(None);
    };

    if start >= prior || end + 1 - start > MAX_RECOVERED_LINE {
        return Ok(None);
    }

    let mut line = vec![0u8; (end + 1 - start) as usize];
    file.seek(SeekFrom::Start(start)).await?;
    file.read_exact(&mut line).await?;
    Ok(Some((String::from_utf8_lossy(&line).into_owned(), start)))
}

/// Offset just past the last `\n` before `pos`, scanning backwards in
/// fixed blocks; 0 when there is none. `None` when the line is too long
/// to recover.
async fn line_start(file: &mut File, pos: u64) -> std::io::Result<Option<u64>> {
    let mut block = vec![0u8; SCAN_BLOCK as usize];
    let mut end = pos;

    while end > 0 && pos - end < MAX_RECOVERED_LINE {
        let begin = end.saturating_sub(SCAN_BLOCK);
        let len = (end - begin) as usize;
        file.seek(SeekFrom::Start(begin)).await?;
        file.read_exact(&mut block[..len]).await?;
        if let Some(i) = block[..len].iter().rposition(|&b| b == b'\n') {
            return Ok(Some(begin + i as u64 + 1));
        }
        end = begin;
    }

    Ok((end == 0).then_some(0))
}
