//! Blob persistence for the ledger.
//!
//! The whole ledger lives under one key; there is no row-level access. The
//! production backend is an S3 object, optionally gzip-compressed.

use std::io::{Read, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Key-value blob store holding the serialized ledger at a single fixed key.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Returns the stored blob, or `None` when nothing has been written yet.
    async fn get(&self) -> Result<Option<Vec<u8>>>;
    async fn set(&self, blob: &[u8]) -> Result<()>;
    async fn delete(&self) -> Result<()>;
}

/// [`LedgerStore`] backed by one S3 object.
pub struct S3LedgerStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
    gzip: bool,
}

impl S3LedgerStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
            gzip: false,
        }
    }

    /// Gzip-compress blobs on write. Reads sniff the magic bytes, so blobs
    /// written before the toggle stay readable.
    pub fn with_gzip(mut self) -> Self {
        self.gzip = true;
        self
    }
}

#[async_trait]
impl LedgerStore for S3LedgerStore {
    async fn get(&self) -> Result<Option<Vec<u8>>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(err).with_context(|| {
                    format!("S3 GetObject failed for s3://{}/{}", self.bucket, self.key)
                });
            }
        };

        let bytes = resp.body.collect().await?.into_bytes();
        let blob = if bytes.starts_with(&GZIP_MAGIC) {
            gunzip(&bytes)?
        } else {
            bytes.to_vec()
        };
        Ok(Some(blob))
    }

    async fn set(&self, blob: &[u8]) -> Result<()> {
        let body = if self.gzip { gzip(blob)? } else { blob.to_vec() };

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(body.into())
            .content_type("application/json");
        if self.gzip {
            request = request.content_encoding("gzip");
        }

        request.send().await.with_context(|| {
            format!("S3 PutObject failed for s3://{}/{}", self.bucket, self.key)
        })?;
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .with_context(|| {
                format!("S3 DeleteObject failed for s3://{}/{}", self.bucket, self.key)
            })?;
        Ok(())
    }
}

fn gzip(blob: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(blob)?;
    Ok(encoder.finish()?)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// In-memory [`LedgerStore`] for tests and local runs.
#[derive(Default)]
pub struct MemoryLedgerStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().unwrap().clone())
    }

    async fn set(&self, blob: &[u8]) -> Result<()> {
        *self.blob.lock().unwrap() = Some(blob.to_vec());
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        *self.blob.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryLedgerStore::new();
        assert!(store.get().await.unwrap().is_none());

        store.set(b"{\"events\":[]}").await.unwrap();
        assert_eq!(store.get().await.unwrap().unwrap(), b"{\"events\":[]}");

        store.delete().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
    }

    #[test]
    fn test_gzip_round_trip() {
        let blob = br#"{"statuses":{},"events":[]}"#;
        let compressed = gzip(blob).unwrap();
        assert!(compressed.starts_with(&GZIP_MAGIC));
        assert_eq!(gunzip(&compressed).unwrap(), blob);
    }
}
