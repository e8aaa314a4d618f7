use crate::domain::ports::ImageStore;
use crate::error::{AppError, Result};
use bytes::Bytes;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

/// An image received in a multipart body and not yet written anywhere.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub data: Bytes,
}

#[derive(Clone, Debug)]
struct Metrics {
    stored_total: Counter<u64>,
    discarded_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            stored_total: meter
                .u64_counter("bookswap_uploads_stored_total")
                .with_description("Total uploaded images written to storage")
                .build(),
            discarded_total: meter
                .u64_counter("bookswap_uploads_discarded_total")
                .with_description("Stored images removed again because the request that carried them failed")
                .build(),
        }
    }
}

/// Validates and stores uploaded images for messages, books and categories.
///
/// Callers check a batch before touching any other state, store it only once
/// every other rule has passed, and discard it if persisting the owning record fails.
#[derive(Clone, Debug)]
pub struct UploadService {
    images: Arc<dyn ImageStore>,
    max_image_bytes: usize,
    metrics: Metrics,
}

impl UploadService {
    #[must_use]
    pub fn new(images: Arc<dyn ImageStore>, max_image_bytes: usize) -> Self {
        Self { images, max_image_bytes, metrics: Metrics::new() }
    }

    /// Rejects a batch with more than `limit` entries or any empty or oversized image.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` naming the first rule the batch breaks.
    pub fn check(&self, uploads: &[ImageUpload], limit: usize, what: &str) -> Result<()> {
        if uploads.len() > limit {
            return Err(AppError::BadRequest(format!("At most {limit} images per {what}")));
        }
        for upload in uploads {
            if upload.data.is_empty() {
                return Err(AppError::BadRequest("Image is empty".to_string()));
            }
            if upload.data.len() > self.max_image_bytes {
                return Err(AppError::BadRequest(format!("Image exceeds {} bytes", self.max_image_bytes)));
            }
        }
        Ok(())
    }

    /// Writes every upload and returns the stored file names in order.
    ///
    /// Either the whole batch is stored or none of it is left behind.
    #[tracing::instrument(err(level = "warn"), skip(self, uploads), fields(count = uploads.len()))]
    pub async fn store_all(&self, uploads: Vec<ImageUpload>) -> Result<Vec<String>> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.images.save(upload.file_name.as_deref(), upload.data).await {
                Ok(name) => stored.push(name),
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(e);
                }
            }
        }
        self.metrics.stored_total.add(stored.len() as u64, &[]);
        Ok(stored)
    }

    /// Best-effort removal of stored images. Failures are logged and otherwise ignored.
    pub async fn discard(&self, names: &[String]) {
        for name in names {
            match self.images.remove(name).await {
                Ok(()) => self.metrics.discarded_total.add(1, &[KeyValue::new("status", "ok")]),
                Err(e) => {
                    tracing::warn!(error = %e, image = %name, "Failed to remove orphaned upload");
                    self.metrics.discarded_total.add(1, &[KeyValue::new("status", "error")]);
                }
            }
        }
    }
}
