//! File uploads.
//!
//! Non-empty files go through the resumable protocol: an initiation call
//! opens a session URI, then fixed-size chunks are PUT with a
//! `Content-Range` header until the service answers with the completed
//! object instead of 308. The service's `Range` acknowledgement drives the
//! next offset, so a partially persisted chunk is resent from where the
//! server actually stopped. Zero-byte files skip all of that and issue a
//! single metadata-only create. Both paths re-fetch the finished object so
//! callers always see the same field set. The remote half of the exchange
//! sits behind [`UploadTransport`] so the chunk walk is testable against a
//! scripted fake.

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::client::{api_url, decode_json, upload_url, with_identity_rotation, DriveClient};
use crate::files;
use crate::types::{mime_types, CreateFileRequest, DriveError, DriveFile, DriveResult};

/// MIME type for a local file, from its extension.
pub(crate) fn guess_mime(path: &Path) -> String {
    match mime_guess::from_path(path).first_raw() {
        Some(mime) => mime.to_string(),
        None => mime_types::FALLBACK.to_string(),
    }
}

/// Upload one regular file into `parent`.
pub async fn upload_file(client: &DriveClient, path: &Path, parent: &str) -> DriveResult<DriveFile> {
    let metadata = fs::metadata(path).await.map_err(|e| {
        DriveError::path_not_found(format!("cannot stat '{}': {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(DriveError::path_not_found(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    let size = metadata.len();
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => {
            return Err(DriveError::path_not_found(format!(
                "'{}' has no file name",
                path.display()
            )))
        }
    };
    let mime = guess_mime(path);
    info!("uploading '{}' ({} bytes) into '{}'", name, size, parent);
    client.begin_upload(size);
    let chunk_size = client.config().chunk_size as u64;

    // Rotation restarts the whole transfer: an open resumable session is
    // bound to the identity that created it.
    let name = name.as_str();
    let mime = mime.as_str();
    let file = with_identity_rotation(client, || {
        Box::pin(run_upload(client, path, name, mime, parent, size, chunk_size))
    })
    .await?;
    client.add_uploaded(size);
    info!("uploaded '{}' as '{}'", name, file.id);
    Ok(file)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The remote half of one upload, separated from the chunk walk.
#[async_trait]
trait UploadTransport: Send + Sync {
    /// Metadata-only create; returns the new object's id.
    async fn create_empty(&self, name: &str, mime: &str, parent: &str) -> DriveResult<String>;
    /// Open a resumable session, returning its session URI.
    async fn initiate(&self, name: &str, mime: &str, parent: &str, size: u64)
        -> DriveResult<String>;
    /// Send one chunk under a `Content-Range` header.
    async fn put_chunk(&self, session_uri: &str, range: &str, chunk: Vec<u8>)
        -> DriveResult<ChunkAck>;
    /// Canonical re-fetch of the finished object.
    async fn fetch(&self, id: &str) -> DriveResult<DriveFile>;
    /// Bytes acknowledged so far, for progress reporting.
    fn record_progress(&self, sent: u64);
}

/// The service's answer to one chunk.
enum ChunkAck {
    /// 308: `next` is the first byte the service does not yet hold.
    Incomplete { next: u64 },
    /// Terminal response carrying the completed object's id.
    Complete { id: String },
}

#[async_trait]
impl UploadTransport for DriveClient {
    async fn create_empty(&self, name: &str, mime: &str, parent: &str) -> DriveResult<String> {
        let url = api_url("files");
        let body = CreateFileRequest {
            name: name.to_string(),
            mime_type: Some(mime.to_string()),
            parents: Some(vec![parent.to_string()]),
        };
        let created: DriveFile = self
            .request_json(self.attempts_for(false), |http| {
                http.post(&url)
                    .query(&[("fields", "id"), ("supportsAllDrives", "true")])
                    .json(&body)
            })
            .await?;
        Ok(created.id)
    }

    /// The session URI comes back in the `Location` header.
    async fn initiate(
        &self,
        name: &str,
        mime: &str,
        parent: &str,
        size: u64,
    ) -> DriveResult<String> {
        let url = upload_url("files");
        let body = CreateFileRequest {
            name: name.to_string(),
            mime_type: None,
            parents: Some(vec![parent.to_string()]),
        };
        let length = size.to_string();
        let response = self
            .execute(self.attempts_for(false), |http| {
                http.post(&url)
                    .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
                    .header("X-Upload-Content-Type", mime)
                    .header("X-Upload-Content-Length", length.as_str())
                    .json(&body)
            })
            .await?;
        match response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            Some(uri) => Ok(uri.to_string()),
            None => Err(DriveError::remote("resumable session returned no location")),
        }
    }

    async fn put_chunk(
        &self,
        session_uri: &str,
        range: &str,
        chunk: Vec<u8>,
    ) -> DriveResult<ChunkAck> {
        let upload_timeout = Duration::from_secs(self.config().upload_timeout_secs);
        let response = self
            .execute_accepting(self.attempts_for(false), &[308], |http| {
                http.put(session_uri)
                    .timeout(upload_timeout)
                    .header(header::CONTENT_RANGE, range)
                    .body(chunk.clone())
            })
            .await?;
        if response.status().as_u16() == 308 {
            let next = next_offset(
                response
                    .headers()
                    .get(header::RANGE)
                    .and_then(|v| v.to_str().ok()),
            );
            return Ok(ChunkAck::Incomplete { next });
        }
        let completed: DriveFile = decode_json(response).await?;
        Ok(ChunkAck::Complete { id: completed.id })
    }

    async fn fetch(&self, id: &str) -> DriveResult<DriveFile> {
        files::fetch_file(self, id).await
    }

    fn record_progress(&self, sent: u64) {
        self.record_upload_progress(sent);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Chunk walk
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Drive one upload through a transport: a metadata-only create for empty
/// files, otherwise the resumable chunk loop. Both end with the canonical
/// re-fetch of the completed object.
async fn run_upload<T: UploadTransport>(
    transport: &T,
    path: &Path,
    name: &str,
    mime: &str,
    parent: &str,
    size: u64,
    chunk_size: u64,
) -> DriveResult<DriveFile> {
    if size == 0 {
        let id = transport.create_empty(name, mime, parent).await?;
        return transport.fetch(&id).await;
    }
    let session_uri = transport.initiate(name, mime, parent, size).await?;
    let mut file = fs::File::open(path).await.map_err(|e| read_error(path, e))?;
    let mut offset: u64 = 0;
    loop {
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(DriveError::remote(
                "resumable session ended without a completed object",
            ));
        }
        let len = remaining.min(chunk_size) as usize;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| read_error(path, e))?;
        let mut chunk = vec![0u8; len];
        file.read_exact(&mut chunk)
            .await
            .map_err(|e| read_error(path, e))?;
        let range = content_range(offset, len as u64, size);
        debug!("sending chunk {} of '{}'", range, name);

        match transport.put_chunk(&session_uri, &range, chunk).await? {
            ChunkAck::Incomplete { next } => {
                offset = next;
                transport.record_progress(offset);
            }
            ChunkAck::Complete { id } => {
                transport.record_progress(size);
                return transport.fetch(&id).await;
            }
        }
    }
}

fn content_range(offset: u64, len: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", offset, offset + len - 1, total)
}

/// Next byte to send after a 308, from the service's `Range` header
/// (`bytes=0-N` means N+1 bytes are persisted). No header means nothing
/// was persisted.
fn next_offset(range: Option<&str>) -> u64 {
    match range
        .and_then(|value| value.rsplit('-').next())
        .and_then(|end| end.parse::<u64>().ok())
    {
        Some(end) => end.saturating_add(1),
        None => 0,
    }
}

fn read_error(path: &Path, e: std::io::Error) -> DriveError {
    DriveError::path_not_found(format!("cannot read '{}': {}", path.display(), e))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ── mime guessing ────────────────────────────────────────────────────

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(guess_mime(Path::new("notes.txt")), "text/plain");
        assert_eq!(guess_mime(Path::new("data.json")), "application/json");
    }

    #[test]
    fn unknown_extensions_fall_back_to_text() {
        assert_eq!(guess_mime(Path::new("blob.qqqz")), "text/plain");
        assert_eq!(guess_mime(Path::new("no_extension")), "text/plain");
    }

    // ── chunk bookkeeping ────────────────────────────────────────────────

    #[test]
    fn content_range_is_inclusive() {
        assert_eq!(content_range(0, 10, 10), "bytes 0-9/10");
        assert_eq!(content_range(10, 5, 15), "bytes 10-14/15");
    }

    #[test]
    fn next_offset_follows_the_acknowledged_range() {
        assert_eq!(next_offset(Some("bytes=0-1023")), 1024);
        assert_eq!(next_offset(Some("bytes=0-0")), 1);
    }

    #[test]
    fn missing_or_malformed_range_restarts_from_zero() {
        assert_eq!(next_offset(None), 0);
        assert_eq!(next_offset(Some("garbage")), 0);
    }

    #[test]
    fn absurd_range_acknowledgements_saturate() {
        let range = format!("bytes=0-{}", u64::MAX);
        assert_eq!(next_offset(Some(&range)), u64::MAX);
    }

    // ── chunk walk ───────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeTransport {
        completed_id: String,
        creates: AtomicU32,
        initiates: AtomicU32,
        chunk_ranges: Mutex<Vec<String>>,
        pending_acks: Mutex<Vec<u64>>,
    }

    impl FakeTransport {
        fn completing_with(id: &str) -> Self {
            Self {
                completed_id: id.to_string(),
                ..Self::default()
            }
        }

        /// Next-offset acknowledgements to emit before completing.
        fn script_acks(&self, acks: &[u64]) {
            *self.pending_acks.lock().unwrap() = acks.to_vec();
        }

        fn ranges(&self) -> Vec<String> {
            self.chunk_ranges.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UploadTransport for FakeTransport {
        async fn create_empty(&self, _: &str, _: &str, _: &str) -> DriveResult<String> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(self.completed_id.clone())
        }

        async fn initiate(&self, _: &str, _: &str, _: &str, _: u64) -> DriveResult<String> {
            self.initiates.fetch_add(1, Ordering::SeqCst);
            Ok("session-uri".to_string())
        }

        async fn put_chunk(&self, _: &str, range: &str, _: Vec<u8>) -> DriveResult<ChunkAck> {
            self.chunk_ranges.lock().unwrap().push(range.to_string());
            let mut acks = self.pending_acks.lock().unwrap();
            if acks.is_empty() {
                Ok(ChunkAck::Complete {
                    id: self.completed_id.clone(),
                })
            } else {
                Ok(ChunkAck::Incomplete {
                    next: acks.remove(0),
                })
            }
        }

        async fn fetch(&self, id: &str) -> DriveResult<DriveFile> {
            Ok(DriveFile {
                id: id.to_string(),
                name: "fetched".to_string(),
                mime_type: "text/plain".to_string(),
                size: None,
                parents: Vec::new(),
                kind: None,
                drive_id: None,
                modified_time: None,
                trashed: None,
            })
        }

        fn record_progress(&self, _: u64) {}
    }

    #[tokio::test]
    async fn zero_byte_upload_is_a_single_metadata_create() {
        let transport = FakeTransport::completing_with("empty1");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let file = run_upload(&transport, &path, "empty.bin", "text/plain", "dest", 0, 4)
            .await
            .unwrap();
        assert_eq!(file.id, "empty1");
        assert_eq!(transport.creates.load(Ordering::SeqCst), 1);
        assert_eq!(transport.initiates.load(Ordering::SeqCst), 0);
        assert!(transport.ranges().is_empty());
    }

    #[tokio::test]
    async fn large_uploads_chunk_sequentially_then_refetch() {
        let transport = FakeTransport::completing_with("big9");
        transport.script_acks(&[2, 4]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.bin");
        std::fs::write(&path, b"01234").unwrap();

        let file = run_upload(&transport, &path, "frame.bin", "text/plain", "dest", 5, 2)
            .await
            .unwrap();
        // The returned object is the re-fetch of the final chunk's id.
        assert_eq!(file.id, "big9");
        assert_eq!(
            transport.ranges(),
            vec!["bytes 0-1/5", "bytes 2-3/5", "bytes 4-4/5"]
        );
        assert_eq!(transport.initiates.load(Ordering::SeqCst), 1);
        assert_eq!(transport.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_persists_resend_from_the_acknowledged_offset() {
        let transport = FakeTransport::completing_with("lag1");
        transport.script_acks(&[1]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.bin");
        std::fs::write(&path, b"abc").unwrap();

        let file = run_upload(&transport, &path, "slow.bin", "text/plain", "dest", 3, 2)
            .await
            .unwrap();
        assert_eq!(file.id, "lag1");
        // The first chunk was only persisted up to byte 0, so byte 1 leads
        // the second send.
        assert_eq!(transport.ranges(), vec!["bytes 0-1/3", "bytes 1-2/3"]);
    }
}
