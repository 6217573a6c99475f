//! Local-filesystem blob backend, used for `STORAGE_BACKEND=file`
//! deployments and in tests. Keys map directly onto a path under the
//! configured root; multipart state is staged under `.multipart/<upload_id>`
//! until completed.

use crate::backend::BlobBackend;
use crate::error::BlobError;
use crate::types::{
    ByteRange, CompletedPart, ConditionalGet, ConditionalOutcome, GetObjectOutput, ObjectMeta,
    PartInfo, PutObjectOutput,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use gateway_common::compute_etag;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MultipartState {
    parts: HashMap<u16, Vec<u8>>,
    content_type: Option<String>,
}

pub struct FileBackend {
    root: PathBuf,
    uploads: RwLock<HashMap<String, Arc<RwLock<MultipartState>>>>,
}

impl FileBackend {
    pub async fn new(root: PathBuf) -> Result<Self, BlobError> {
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            uploads: RwLock::new(HashMap::new()),
        })
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn read_meta(&self, path: &Path) -> Result<ObjectMeta, BlobError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|_| BlobError::NotFound(path.display().to_string()))?;
        let modified: DateTime<Utc> = metadata.modified().map_or_else(|_| Utc::now(), DateTime::from);
        let bytes = fs::read(path).await?;
        Ok(ObjectMeta {
            size: metadata.len(),
            etag: compute_etag(&bytes),
            last_modified: modified,
            content_type: None,
        })
    }
}

#[async_trait]
impl BlobBackend for FileBackend {
    async fn head(&self, key: &str) -> Result<ObjectMeta, BlobError> {
        self.read_meta(&self.resolve(key)).await
    }

    async fn get(&self, key: &str, conditional: &ConditionalGet) -> Result<GetObjectOutput, BlobError> {
        let path = self.resolve(key);
        let meta = self.read_meta(&path).await?;
        if let Some(ConditionalOutcome::NotModified) = conditional.short_circuit(&meta) {
            return Err(BlobError::NotModified);
        }

        let data = fs::read(&path).await?;
        let body = match conditional.range {
            Some(ByteRange { start, end }) => {
                let start = start as usize;
                let end = end.map_or(data.len(), |e| ((e as usize) + 1).min(data.len()));
                if start > end || start > data.len() {
                    return Err(BlobError::InvalidRange);
                }
                Bytes::copy_from_slice(&data[start..end])
            }
            None => Bytes::from(data),
        };

        Ok(GetObjectOutput { meta, body })
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        _content_type: Option<&str>,
    ) -> Result<PutObjectOutput, BlobError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let etag = compute_etag(&body);
        let size = body.len() as u64;
        fs::write(&path, &body).await?;
        Ok(PutObjectOutput { etag, size })
    }

    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<PutObjectOutput, BlobError> {
        let source = self.resolve(source_key);
        let dest = self.resolve(dest_key);
        if !fs::try_exists(&source).await? {
            return Err(BlobError::NotFound(source_key.to_string()));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&source, &dest).await?;
        let meta = self.read_meta(&dest).await?;
        Ok(PutObjectOutput {
            etag: meta.etag,
            size: meta.size,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(_) if !fs::try_exists(&path).await.unwrap_or(false) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_many(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                tracing::warn!(key = %key, error = %e, "failed to delete blob during batch delete");
            }
        }
    }

    async fn create_multipart_upload(
        &self,
        _key: &str,
        content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        let upload_id = Uuid::new_v4().to_string();
        let state = Arc::new(RwLock::new(MultipartState {
            parts: HashMap::new(),
            content_type: content_type.map(str::to_string),
        }));
        self.uploads.write().await.insert(upload_id.clone(), state);
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: u16,
        body: Bytes,
    ) -> Result<PartInfo, BlobError> {
        let state = self
            .uploads
            .read()
            .await
            .get(upload_id)
            .cloned()
            .ok_or_else(|| BlobError::NoSuchUpload(upload_id.to_string()))?;
        let etag = compute_etag(&body);
        let size = body.len() as u64;
        state.write().await.parts.insert(part_number, body.to_vec());
        Ok(PartInfo {
            part_number,
            etag,
            size,
        })
    }

    async fn upload_part_copy(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u16,
        source_key: &str,
        range: Option<ByteRange>,
    ) -> Result<PartInfo, BlobError> {
        let conditional = ConditionalGet {
            range,
            ..ConditionalGet::none()
        };
        let source = self.get(source_key, &conditional).await?;
        self.upload_part(key, upload_id, part_number, source.body).await
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<PutObjectOutput, BlobError> {
        let state = self
            .uploads
            .write()
            .await
            .remove(upload_id)
            .ok_or_else(|| BlobError::NoSuchUpload(upload_id.to_string()))?;
        let state = state.read().await;

        let mut assembled = Vec::new();
        for part in parts {
            let data = state
                .parts
                .get(&part.part_number)
                .ok_or_else(|| BlobError::Backend(format!("missing part {}", part.part_number)))?;
            assembled.extend_from_slice(data);
        }

        self.put(key, Bytes::from(assembled), state.content_type.as_deref())
            .await
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> Result<(), BlobError> {
        self.uploads
            .write()
            .await
            .remove(upload_id)
            .ok_or_else(|| BlobError::NoSuchUpload(upload_id.to_string()))?;
        Ok(())
    }

    async fn list_parts(&self, _key: &str, upload_id: &str) -> Result<Vec<PartInfo>, BlobError> {
        let state = self
            .uploads
            .read()
            .await
            .get(upload_id)
            .cloned()
            .ok_or_else(|| BlobError::NoSuchUpload(upload_id.to_string()))?;
        let state = state.read().await;
        let mut parts: Vec<PartInfo> = state
            .parts
            .iter()
            .map(|(&part_number, data)| PartInfo {
                part_number,
                etag: compute_etag(data),
                size: data.len() as u64,
            })
            .collect();
        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }

    async fn private_asset_url(&self, _key: &str, _expires_in: Duration) -> Result<String, BlobError> {
        Err(BlobError::Unavailable(
            "local filesystem backend cannot mint externally-fetchable URLs".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> (FileBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().to_path_buf()).await.unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (backend, _dir) = backend().await;
        backend
            .put("tenant/bucket/obj/v1", Bytes::from_static(b"hello"), None)
            .await
            .unwrap();
        let out = backend.get("tenant/bucket/obj/v1", &ConditionalGet::none()).await.unwrap();
        assert_eq!(out.body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn conditional_get_returns_not_modified() {
        let (backend, _dir) = backend().await;
        backend
            .put("tenant/bucket/obj/v1", Bytes::from_static(b"hello"), None)
            .await
            .unwrap();
        let meta = backend.head("tenant/bucket/obj/v1").await.unwrap();
        let conditional = ConditionalGet {
            if_none_match: Some(meta.etag.clone()),
            ..ConditionalGet::none()
        };
        let result = backend.get("tenant/bucket/obj/v1", &conditional).await;
        assert!(matches!(result, Err(BlobError::NotModified)));
    }

    #[tokio::test]
    async fn range_get_returns_slice() {
        let (backend, _dir) = backend().await;
        backend
            .put("tenant/bucket/obj/v1", Bytes::from_static(b"0123456789"), None)
            .await
            .unwrap();
        let conditional = ConditionalGet {
            range: Some(ByteRange { start: 2, end: Some(4) }),
            ..ConditionalGet::none()
        };
        let out = backend.get("tenant/bucket/obj/v1", &conditional).await.unwrap();
        assert_eq!(out.body, Bytes::from_static(b"234"));
    }

    #[tokio::test]
    async fn multipart_upload_round_trips() {
        let (backend, _dir) = backend().await;
        let upload_id = backend
            .create_multipart_upload("tenant/bucket/obj/v1", None)
            .await
            .unwrap();
        let p1 = backend
            .upload_part("tenant/bucket/obj/v1", &upload_id, 1, Bytes::from_static(b"hello, "))
            .await
            .unwrap();
        let p2 = backend
            .upload_part("tenant/bucket/obj/v1", &upload_id, 2, Bytes::from_static(b"world!"))
            .await
            .unwrap();
        let parts = vec![
            CompletedPart {
                part_number: 1,
                etag: p1.etag,
            },
            CompletedPart {
                part_number: 2,
                etag: p2.etag,
            },
        ];
        backend
            .complete_multipart_upload("tenant/bucket/obj/v1", &upload_id, &parts)
            .await
            .unwrap();
        let out = backend.get("tenant/bucket/obj/v1", &ConditionalGet::none()).await.unwrap();
        assert_eq!(out.body, Bytes::from_static(b"hello, world!"));
    }

    #[tokio::test]
    async fn abort_multipart_discards_parts() {
        let (backend, _dir) = backend().await;
        let upload_id = backend
            .create_multipart_upload("tenant/bucket/obj/v1", None)
            .await
            .unwrap();
        backend
            .upload_part("tenant/bucket/obj/v1", &upload_id, 1, Bytes::from_static(b"data"))
            .await
            .unwrap();
        backend
            .abort_multipart_upload("tenant/bucket/obj/v1", &upload_id)
            .await
            .unwrap();
        let result = backend.list_parts("tenant/bucket/obj/v1", &upload_id).await;
        assert!(matches!(result, Err(BlobError::NoSuchUpload(_))));
    }
}
