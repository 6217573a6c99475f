//! S3-compatible blob backend, covering AWS S3 and path-style-compatible
//! services configured via `STORAGE_S3_*` (§6).

use crate::backend::BlobBackend;
use crate::error::BlobError;
use crate::types::{
    ByteRange, CompletedPart, ConditionalGet, ConditionalOutcome, GetObjectOutput, ObjectMeta,
    PartInfo, PutObjectOutput,
};
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use gateway_common::config::S3BackendConfig;
use std::time::Duration;

/// S3-compatible blob backend.
///
/// Grounded on the same client-construction pattern as other S3-compatible
/// backends in the ecosystem: path-style addressing, a custom endpoint for
/// non-AWS targets, explicit credentials.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    pub async fn new(config: &S3BackendConfig, access_key: &str, secret_key: &str) -> Self {
        let region = aws_sdk_s3::config::Region::new(config.region.clone());
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "gateway-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

fn meta_from_head(output: &aws_sdk_s3::operation::head_object::HeadObjectOutput) -> ObjectMeta {
    ObjectMeta {
        size: output.content_length.unwrap_or(0).max(0) as u64,
        etag: output.e_tag.clone().unwrap_or_default(),
        last_modified: output
            .last_modified
            .and_then(|dt| Utc.timestamp_opt(dt.secs(), 0).single())
            .unwrap_or_else(Utc::now),
        content_type: output.content_type.clone(),
    }
}

#[async_trait]
impl BlobBackend for S3Backend {
    async fn head(&self, key: &str) -> Result<ObjectMeta, BlobError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_head_error(e, key))?;
        Ok(meta_from_head(&output))
    }

    async fn get(&self, key: &str, conditional: &ConditionalGet) -> Result<GetObjectOutput, BlobError> {
        let meta = self.head(key).await?;
        if let Some(ConditionalOutcome::NotModified) = conditional.short_circuit(&meta) {
            return Err(BlobError::NotModified);
        }

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(range) = conditional.range {
            request = request.range(range.to_http_range_header());
        }

        let response = request.send().await.map_err(|e| map_get_error(e, key))?;
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?
            .into_bytes();

        Ok(GetObjectOutput { meta, body })
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<PutObjectOutput, BlobError> {
        let size = body.len() as u64;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }
        let response = request
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(PutObjectOutput {
            etag: response.e_tag.unwrap_or_default(),
            size,
        })
    }

    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<PutObjectOutput, BlobError> {
        let copy_source = format!("{}/{}", self.bucket, source_key);
        let response = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&copy_source)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        let etag = response
            .copy_object_result
            .and_then(|r| r.e_tag)
            .unwrap_or_default();
        let meta = self.head(dest_key).await?;
        Ok(PutObjectOutput {
            etag,
            size: meta.size,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(())
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
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        let mut request = self.client.create_multipart_upload().bucket(&self.bucket).key(key);
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }
        let response = request
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        response
            .upload_id
            .ok_or_else(|| BlobError::Backend("S3 did not return an upload id".to_string()))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u16,
        body: Bytes,
    ) -> Result<PartInfo, BlobError> {
        let size = body.len() as u64;
        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(i32::from(part_number))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(PartInfo {
            part_number,
            etag: response.e_tag.unwrap_or_default(),
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
        let copy_source = format!("{}/{}", self.bucket, source_key);
        let mut request = self
            .client
            .upload_part_copy()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(i32::from(part_number))
            .copy_source(&copy_source);
        if let Some(r) = range {
            request = request.copy_source_range(r.to_http_range_header());
        }
        let response = request
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        let (etag, size) = response
            .copy_part_result
            .map(|r| (r.e_tag.unwrap_or_default(), 0u64))
            .unwrap_or_default();
        Ok(PartInfo {
            part_number,
            etag,
            size,
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<PutObjectOutput, BlobError> {
        let completed_parts: Vec<S3CompletedPart> = parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(i32::from(p.part_number))
                    .e_tag(p.etag.clone())
                    .build()
            })
            .collect();

        let response = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;

        let meta = self.head(key).await?;
        Ok(PutObjectOutput {
            etag: response.e_tag.unwrap_or_default(),
            size: meta.size,
        })
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), BlobError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_parts(&self, key: &str, upload_id: &str) -> Result<Vec<PartInfo>, BlobError> {
        let response = self
            .client
            .list_parts()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;

        Ok(response
            .parts
            .unwrap_or_default()
            .into_iter()
            .map(|p| PartInfo {
                part_number: p.part_number.unwrap_or(0) as u16,
                etag: p.e_tag.unwrap_or_default(),
                size: p.size.unwrap_or(0).max(0) as u64,
            })
            .collect())
    }

    async fn private_asset_url(&self, key: &str, expires_in: Duration) -> Result<String, BlobError> {
        let presigning_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(expires_in)
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(presigned.uri().to_string())
    }
}

fn map_head_error(e: SdkError<HeadObjectError>, key: &str) -> BlobError {
    match &e {
        SdkError::ServiceError(s) if matches!(s.err(), HeadObjectError::NotFound(_)) => {
            BlobError::NotFound(key.to_string())
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => BlobError::Unavailable(e.to_string()),
        _ => BlobError::Backend(e.to_string()),
    }
}

fn map_get_error(e: SdkError<GetObjectError>, key: &str) -> BlobError {
    match &e {
        SdkError::ServiceError(s) if matches!(s.err(), GetObjectError::NoSuchKey(_)) => {
            BlobError::NotFound(key.to_string())
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => BlobError::Unavailable(e.to_string()),
        _ => BlobError::Backend(e.to_string()),
    }
}
