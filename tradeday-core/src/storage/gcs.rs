//! Google Cloud Storage bucket store, over the JSON API.
//!
//! Project, bucket, location and API root come from [`GcsConfig`]. The OAuth2
//! access token is read once from the environment variable the config names;
//! without it requests go out unauthenticated (fine for emulators).

use super::{DayStore, StoreError, StoredObject};
use crate::config::GcsConfig;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct BucketResource {
    name: String,
    #[serde(default)]
    location: String,
}

#[derive(Debug, Serialize)]
struct NewBucket<'a> {
    name: &'a str,
    location: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    /// The API reports sizes as decimal strings.
    size: Option<String>,
}

pub struct GcsStore {
    client: Client,
    config: GcsConfig,
    prefix: String,
    token: Option<String>,
}

impl GcsStore {
    pub fn new(config: &GcsConfig, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Http(format!("failed to build HTTP client: {e}")))?;

        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_none() {
            log::warn!(
                "{} is not set, storage requests are unauthenticated",
                config.token_env
            );
        }

        let mut config = config.clone();
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            config,
            prefix: prefix.into(),
            token,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}",
            self.config.base_url,
            urlencoding::encode(&self.config.bucket)
        )
    }

    fn create_bucket_url(&self) -> String {
        format!(
            "{}/storage/v1/b?project={}",
            self.config.base_url,
            urlencoding::encode(&self.config.project_id)
        )
    }

    fn list_url(&self, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/o?prefix={}",
            self.bucket_url(),
            urlencoding::encode(&format!("{}_", self.prefix))
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn upload_url(&self, name: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.config.base_url,
            urlencoding::encode(&self.config.bucket),
            urlencoding::encode(name)
        )
    }

    fn object_location(&self, name: &str) -> String {
        format!("gs://{}/{}", self.config.bucket, name)
    }

    fn send(&self, request: RequestBuilder, context: &str) -> Result<Response, StoreError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request
            .send()
            .map_err(|e| StoreError::Http(format!("{context}: {e}")))
    }

    fn expect_success(resp: Response, context: &str) -> Result<Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(StoreError::Status {
                status: status.as_u16(),
                context: context.to_string(),
            })
        }
    }

    fn parse_page(body: &str) -> Result<(Vec<StoredObject>, Option<String>), StoreError> {
        let page: ObjectList = serde_json::from_str(body)
            .map_err(|e| StoreError::Http(format!("object list decode: {e}")))?;
        let objects = page
            .items
            .into_iter()
            .map(|o| StoredObject {
                name: o.name,
                size: o.size.and_then(|s| s.parse().ok()),
            })
            .collect();
        Ok((objects, page.next_page_token))
    }
}

impl DayStore for GcsStore {
    fn name(&self) -> &str {
        "gcs"
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Create the bucket if it does not exist.
    fn prepare(&self) -> Result<(), StoreError> {
        let context = format!("bucket {}", self.config.bucket);
        let resp = self.send(self.client.get(self.bucket_url()), &context)?;

        if resp.status() != StatusCode::NOT_FOUND {
            Self::expect_success(resp, &context)?;
            log::info!("Bucket {} already exists.", self.config.bucket);
            return Ok(());
        }

        let body = NewBucket {
            name: &self.config.bucket,
            location: &self.config.location,
        };
        let resp = self.send(
            self.client.post(self.create_bucket_url()).json(&body),
            &format!("create {context}"),
        )?;
        let created: BucketResource = Self::expect_success(resp, &format!("create {context}"))?
            .json()
            .map_err(|e| StoreError::Http(format!("bucket decode: {e}")))?;

        log::info!(
            "Bucket {} created in location {}.",
            created.name,
            created.location
        );
        Ok(())
    }

    fn list_objects(&self) -> Result<Vec<StoredObject>, StoreError> {
        let context = format!("list gs://{}", self.config.bucket);
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let resp = self.send(
                self.client.get(self.list_url(page_token.as_deref())),
                &context,
            )?;
            let body = Self::expect_success(resp, &context)?
                .text()
                .map_err(|e| StoreError::Http(format!("{context}: {e}")))?;

            let (page, next) = Self::parse_page(&body)?;
            objects.extend(page);

            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        log::debug!("{} objects in gs://{}", objects.len(), self.config.bucket);
        Ok(objects)
    }

    fn put_object(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StoreError> {
        let location = self.object_location(name);
        let request = self
            .client
            .post(self.upload_url(name))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec());

        let resp = self.send(request, &format!("upload {location}"))?;
        Self::expect_success(resp, &format!("upload {location}"))?;
        Ok(location)
    }
}
