// src/upload.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use s3::{creds::Credentials, Bucket, Region};
use std::{env, path::Path};
use tokio::fs;
use tracing::{error, info, instrument, warn};

pub const ACCESS_KEY_VAR: &str = "SUPABASE_ACCESS_KEY_ID";
pub const SECRET_KEY_VAR: &str = "SUPABASE_SECRET_ACCESS_KEY";

const ENDPOINT: &str = "https://unbgkfatcaztstordiyt.storage.supabase.co/storage/v1/s3";
const REGION: &str = "ap-southeast-1";
const BUCKET: &str = "investment_management";

/// Pushes a finished artifact somewhere durable.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<()>;
}

/// Used when no credentials are configured: every upload is a logged no-op.
pub struct NoopUploader;

#[async_trait]
impl Uploader for NoopUploader {
    async fn upload(&self, path: &Path) -> Result<()> {
        info!(file = %path.display(), "skipping upload: credentials not found in environment");
        Ok(())
    }
}

/// Uploads to an S3-compatible bucket, keyed by file name.
pub struct S3Uploader {
    bucket: Box<Bucket>,
}

impl S3Uploader {
    pub fn new(access_key: &str, secret_key: &str) -> Result<Self> {
        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .context("building S3 credentials")?;
        let region = Region::Custom {
            region: REGION.to_string(),
            endpoint: ENDPOINT.to_string(),
        };
        let bucket = Bucket::new(BUCKET, region, credentials)
            .context("configuring S3 bucket")?
            .with_path_style();
        Ok(Self { bucket })
    }
}

#[async_trait]
impl Uploader for S3Uploader {
    #[instrument(level = "debug", skip(self), fields(file = %path.display()))]
    async fn upload(&self, path: &Path) -> Result<()> {
        let object = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("{} has no file name", path.display()))?;
        let body = fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        info!(object = %object, bucket = BUCKET, "uploading");
        let resp = self
            .bucket
            .put_object(&object, &body)
            .await
            .with_context(|| format!("uploading {}", object))?;
        let status = resp.status_code();
        if !(200..300).contains(&status) {
            anyhow::bail!("upload of {} returned HTTP {}", object, status);
        }
        info!(object = %object, bytes = body.len(), "upload successful");
        Ok(())
    }
}

/// S3 uploader when both credential variables are set, otherwise the no-op.
pub fn uploader_from_env() -> Box<dyn Uploader> {
    let access = env::var(ACCESS_KEY_VAR).ok().filter(|v| !v.is_empty());
    let secret = env::var(SECRET_KEY_VAR).ok().filter(|v| !v.is_empty());
    match (access, secret) {
        (Some(access), Some(secret)) => match S3Uploader::new(&access, &secret) {
            Ok(up) => Box::new(up),
            Err(e) => {
                warn!(error = %e, "could not configure S3 uploader, uploads disabled");
                Box::new(NoopUploader)
            }
        },
        _ => Box::new(NoopUploader),
    }
}

/// Upload and swallow any failure. Uploads never affect the pipeline.
pub async fn upload_best_effort(uploader: &dyn Uploader, path: &Path) {
    if let Err(e) = uploader.upload(path).await {
        error!(file = %path.display(), error = %format!("{:#}", e), "upload failed");
    }
}
