//! Failure diagnostics capture
//!
//! On a failed attempt the tail of the catalog's log file is attached to the
//! upload session so operators can read it without shell access to the
//! catalog host.

use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Maximum number of bytes captured from the end of the log file
const LOG_SNIPPET_BYTES: u64 = 10_240;

/// Read the last [`LOG_SNIPPET_BYTES`] of the log file at `path`.
///
/// Capture must never mask the original failure, so every problem here
/// (missing file, unreadable file, no configured path) collapses into a
/// placeholder string rather than an error.
pub async fn log_snippet(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return "No log file configured".to_string();
    };

    match read_tail(path).await {
        Ok(snippet) => snippet,
        Err(_) => format!("No log file at {}", path.display()),
    }
}

async fn read_tail(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();

    let start = len.saturating_sub(LOG_SNIPPET_BYTES);
    file.seek(SeekFrom::Start(start)).await?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf).await?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_snippet_of_small_file_is_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "line one").unwrap();
        writeln!(file, "line two").unwrap();

        let snippet = log_snippet(Some(file.path())).await;
        assert_eq!(snippet, "line one\nline two\n");
    }

    #[tokio::test]
    async fn test_snippet_of_large_file_is_tail_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'a'; 20_000]).unwrap();
        file.write_all(b"THE END").unwrap();

        let snippet = log_snippet(Some(file.path())).await;
        assert_eq!(snippet.len() as u64, LOG_SNIPPET_BYTES);
        assert!(snippet.ends_with("THE END"));
    }

    #[tokio::test]
    async fn test_missing_file_yields_placeholder() {
        let path = Path::new("/nonexistent/geoserver.log");
        let snippet = log_snippet(Some(path)).await;
        assert_eq!(snippet, "No log file at /nonexistent/geoserver.log");
    }

    #[tokio::test]
    async fn test_unconfigured_path_yields_placeholder() {
        assert_eq!(log_snippet(None).await, "No log file configured");
    }
}
