use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::FetchConfig;
use crate::diagnostics::{emit, Diagnostic, DiagnosticSender};
use crate::error::{FetchError, PipelineError};
use crate::record::{Dataset, Record, Value};
use crate::workdir::image_file_name;

/// Host that serves the field photos
pub const IMAGE_HOST_PATTERN: &str = "photogram-livetrade-prod.s3.amazonaws.com";

lazy_static::lazy_static! {
    /// Any http(s) URL pointing at a file with an image extension
    static ref IMAGE_URL_PATTERN: Regex =
        Regex::new(r"(?i)^https?://\S+\.(jpe?g|png|gif|bmp|webp|tiff?)(\?\S*)?$").unwrap();
}

/// Whether a cell looks like an image URL
pub fn is_image_url(text: &str) -> bool {
    let text = text.trim();
    text.contains(IMAGE_HOST_PATTERN) || IMAGE_URL_PATTERN.is_match(text)
}

/// Find the first column holding at least one image URL
pub fn detect_image_column(dataset: &Dataset) -> Option<String> {
    dataset
        .columns
        .iter()
        .find(|column| {
            dataset
                .column_values(column)
                .any(|value| is_image_url(&value.to_string()))
        })
        .cloned()
}

/// Outcome of one row's download
enum RowFailure {
    /// The row is dropped, the run continues
    Dropped(FetchError),
    /// The working directory could not be written
    Fatal(PathBuf, std::io::Error),
}

/// Download the image of every record and keep only the rows that succeeded.
///
/// At most `config.concurrency_limit` requests are in flight at once. The
/// returned records keep their input order and carry `image_local_path`.
/// Per-row failures are dropped silently; only a write failure in
/// `working_dir` fails the whole call.
pub async fn fetch_all(
    client: &reqwest::Client,
    records: Vec<Record>,
    url_column: &str,
    working_dir: &Path,
    config: &FetchConfig,
    diagnostics: Option<&DiagnosticSender>,
) -> Result<Vec<Record>, PipelineError> {
    let total = records.len();
    let limit = config.concurrency_limit.max(1);
    let semaphore = Arc::new(Semaphore::new(limit));
    let (tx, rx) = mpsc::channel(limit);
    let url_column: Arc<str> = Arc::from(url_column);
    let working_dir: Arc<Path> = Arc::from(working_dir);

    for (slot, record) in records.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let tx = tx.clone();
        let client = client.clone();
        let url_column = url_column.clone();
        let working_dir = working_dir.clone();
        let timeout = config.request_timeout;

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let index = record.index;
            let outcome = fetch_one(&client, record, &url_column, &working_dir, timeout).await;
            let _ = tx.send((slot, index, outcome)).await;
        });
    }
    drop(tx);

    // Results arrive in completion order; slots restore input order
    let mut slots: Vec<Option<Record>> = vec![None; total];
    let mut fatal = None;
    let mut results = ReceiverStream::new(rx);

    while let Some((slot, index, outcome)) = results.next().await {
        match outcome {
            Ok(record) => slots[slot] = Some(record),
            Err(RowFailure::Dropped(e)) => {
                log::debug!("Dropping row {}: {}", index, e);
                emit(
                    diagnostics,
                    Diagnostic::FetchFailed {
                        index,
                        reason: e.to_string(),
                    },
                );
            }
            Err(RowFailure::Fatal(path, source)) => {
                if fatal.is_none() {
                    fatal = Some(PipelineError::WorkingDirectory { path, source });
                }
            }
        }
    }

    if let Some(error) = fatal {
        return Err(error);
    }

    let fetched: Vec<Record> = slots.into_iter().flatten().collect();
    log::info!("Fetched {} of {} images", fetched.len(), total);
    Ok(fetched)
}

async fn fetch_one(
    client: &reqwest::Client,
    record: Record,
    url_column: &str,
    working_dir: &Path,
    timeout: Duration,
) -> Result<Record, RowFailure> {
    let url = match record.get(url_column) {
        Some(Value::Text(url)) if !url.trim().is_empty() => url.trim().to_string(),
        _ => return Err(RowFailure::Dropped(FetchError::MissingUrl)),
    };

    let payload = download(client, &url, timeout)
        .await
        .map_err(RowFailure::Dropped)?;

    let path = persist(working_dir, record.index, &payload).await?;
    Ok(record.with_image_path(path))
}

async fn download(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).timeout(timeout).send().await?;

    if response.status() != StatusCode::OK {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(FetchError::EmptyPayload);
    }

    Ok(bytes.to_vec())
}

/// Write a payload as `img_<index>.<ext>` inside `working_dir`.
///
/// Bytes go to a `.part` file first and are renamed once complete, so a
/// failed write never leaves a file behind under the final name.
async fn persist(working_dir: &Path, index: usize, payload: &[u8]) -> Result<PathBuf, RowFailure> {
    let extension = image::guess_format(payload)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("img");

    let partial = working_dir.join(image_file_name(index, "part"));
    let target = working_dir.join(image_file_name(index, extension));

    if let Err(e) = tokio::fs::write(&partial, payload).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(RowFailure::Fatal(partial, e));
    }

    if let Err(e) = tokio::fs::rename(&partial, &target).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(RowFailure::Fatal(target, e));
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_is_image_url() {
        assert!(is_image_url(
            "https://photogram-livetrade-prod.s3.amazonaws.com/abc/123"
        ));
        assert!(is_image_url("http://example.com/a/b.JPG"));
        assert!(is_image_url("https://cdn.example.com/x.png?size=large"));
        assert!(!is_image_url("https://example.com/report.pdf"));
        assert!(!is_image_url("photo.jpg"));
        assert!(!is_image_url(""));
    }

    #[test]
    fn test_detect_first_qualifying_column() {
        let dataset = Dataset::from_rows(
            vec!["tienda".into(), "foto".into(), "foto2".into()],
            vec![
                vec![text("Norte"), Value::Null, text("http://a.com/1.png")],
                vec![text("Sur"), text("http://a.com/2.jpeg"), text("http://a.com/3.png")],
            ],
        );
        assert_eq!(detect_image_column(&dataset), Some("foto".to_string()));
    }

    #[test]
    fn test_detect_none() {
        let dataset = Dataset::from_rows(
            vec!["tienda".into()],
            vec![vec![text("Norte")], vec![Value::Int(4)]],
        );
        assert_eq!(detect_image_column(&dataset), None);
    }

    #[tokio::test]
    async fn test_rows_without_url_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            Record::new(0, vec![("foto".into(), Value::Null)]),
            Record::new(1, vec![("foto".into(), text("   "))]),
            Record::new(2, vec![("otra".into(), text("x"))]),
        ];
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let fetched = fetch_all(
            &reqwest::Client::new(),
            records,
            "foto",
            dir.path(),
            &FetchConfig::default(),
            Some(&tx),
        )
        .await
        .unwrap();

        assert!(fetched.is_empty());
        drop(tx);
        let mut dropped = Vec::new();
        while let Some(Diagnostic::FetchFailed { index, .. }) = rx.recv().await {
            dropped.push(index);
        }
        dropped.sort();
        assert_eq!(dropped, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_persist_names_file_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        let path = match persist(dir.path(), 12, &png).await {
            Ok(path) => path,
            Err(_) => panic!("persist failed"),
        };
        assert_eq!(path, dir.path().join(image_file_name(12, "png")));
        assert!(!dir.path().join(image_file_name(12, "part")).exists());
    }
}
