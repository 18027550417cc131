//! Webhook delivery: one JSON array per batch, optional inline cover image.

use super::{DeliveryChannel, DeliveryError, DeliveryResult};
use crate::config::DeliveryConfig;
use crate::model::item::{is_blank, WorkingSetRecord};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, error, info, warn};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const IMAGE_MIME_TYPE: &str = "image/jpeg";
const IMAGE_FILE_NAME: &str = "cover.jpg";

pub struct WebhookDelivery {
    http: Client,
    url: String,
    include_images: bool,
}

impl WebhookDelivery {
    pub fn new(settings: &DeliveryConfig) -> DeliveryResult<Self> {
        let url = settings.webhook_url().trim();
        if url.is_empty() {
            return Err(DeliveryError::MissingEndpoint);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        info!(
            "event=delivery_init module=deliver status=ok production={} url={}",
            settings.use_production, url
        );
        Ok(Self {
            http,
            url: url.to_string(),
            include_images: settings.include_images,
        })
    }

    fn download_image(&self, image_url: &str) -> Option<Vec<u8>> {
        let response = match self.http.get(image_url).send() {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "event=image_download module=deliver status=error url={} error={}",
                    image_url, err
                );
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                "event=image_download module=deliver status=error url={} http_status={}",
                image_url,
                response.status().as_u16()
            );
            return None;
        }
        match response.bytes() {
            Ok(bytes) if !bytes.is_empty() => Some(bytes.to_vec()),
            Ok(_) => None,
            Err(err) => {
                warn!(
                    "event=image_download module=deliver status=error url={} error={}",
                    image_url, err
                );
                None
            }
        }
    }
}

impl DeliveryChannel for WebhookDelivery {
    fn probe(&self) -> bool {
        match self
            .http
            .post(&self.url)
            .timeout(PROBE_TIMEOUT)
            .json(&json!({ "test": true }))
            .send()
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let reachable = status < 500;
                if reachable {
                    info!("event=probe module=deliver status=ok http_status={status}");
                } else {
                    warn!("event=probe module=deliver status=error http_status={status}");
                }
                reachable
            }
            Err(err) => {
                error!("event=probe module=deliver status=error error={err}");
                false
            }
        }
    }

    fn deliver(&self, records: &[WorkingSetRecord]) -> DeliveryResult<usize> {
        if records.is_empty() {
            return Err(DeliveryError::NothingToDeliver);
        }

        let payload: Vec<Value> = records
            .iter()
            .map(|record| {
                let image = if self.include_images && !is_blank(&record.cover_image_url) {
                    self.download_image(&record.cover_image_url)
                } else {
                    None
                };
                build_payload(record, image.as_deref())
            })
            .collect();

        debug!(
            "event=deliver module=deliver status=start items={} url={}",
            payload.len(),
            self.url
        );
        let response = self.http.post(&self.url).json(&payload).send()?;
        let status = response.status();
        if !status.is_success() {
            error!(
                "event=deliver module=deliver status=error http_status={}",
                status.as_u16()
            );
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        info!(
            "event=deliver module=deliver status=ok items={} http_status={}",
            payload.len(),
            status.as_u16()
        );
        Ok(payload.len())
    }
}

/// JSON object sent for one record; `image` is the downloaded cover, if any.
pub fn build_payload(record: &WorkingSetRecord, image: Option<&[u8]>) -> Value {
    let mut payload = json!({
        "title": record.title,
        "annotation": record.annotation_text,
        "permalink": record.permalink,
    });
    if let (Some(bytes), Some(object)) = (image, payload.as_object_mut()) {
        object.insert(
            "binary".to_string(),
            json!({
                "image": {
                    "data": STANDARD.encode(bytes),
                    "mimeType": IMAGE_MIME_TYPE,
                    "fileName": IMAGE_FILE_NAME,
                }
            }),
        );
    }
    payload
}
