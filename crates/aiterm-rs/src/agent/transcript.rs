//! Debug transcripts of AI round-trips.
//!
//! Each call writes one text file with the messages that were sent and the
//! raw reply. Failures are the caller's to log; they never stop the loop.

use super::session::{ChatMessage, role_for};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Receives a copy of every AI exchange.
pub trait TranscriptSink: Send + Sync {
    /// `sent` starts with the instructions message as it was sent.
    fn record(&self, sent: &[ChatMessage], response: &str) -> io::Result<PathBuf>;
}

/// Writes `debug-YYYYMMDD-HHMMSS.txt` files into a directory.
#[derive(Debug, Clone)]
pub struct FileTranscriptSink {
    dir: PathBuf,
}

impl FileTranscriptSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a fresh file, suffixing `-N` when the second is already taken.
    fn create_file(&self) -> io::Result<(PathBuf, std::fs::File)> {
        std::fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        for n in 0..1000u32 {
            let name = if n == 0 {
                format!("debug-{stamp}.txt")
            } else {
                format!("debug-{stamp}-{n}.txt")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "too many transcripts in one second",
        ))
    }
}

/// Render a transcript in the debug file layout.
pub fn render_transcript(sent: &[ChatMessage], response: &str) -> String {
    let mut out = String::from("==================    SENT CHAT MESSAGES ==================\n\n");
    for (i, msg) in sent.iter().enumerate() {
        out.push_str(&format!(
            "Message {}: Role={}, Time={}\n",
            i + 1,
            role_for(i, msg),
            msg.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
        ));
        out.push_str(&format!("Content:\n{}\n\n", msg.content));
    }
    out.push_str("==================    RECEIVED RESPONSE ==================\n\n");
    out.push_str(response);
    out.push_str("\n\n==================    END DEBUG ==================\n");
    out
}

impl TranscriptSink for FileTranscriptSink {
    fn record(&self, sent: &[ChatMessage], response: &str) -> io::Result<PathBuf> {
        let (path, mut file) = self.create_file()?;
        file.write_all(render_transcript(sent, response).as_bytes())?;
        Ok(path)
    }
}
