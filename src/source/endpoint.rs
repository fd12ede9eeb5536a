//! Remote HTTP config endpoint source.
//!
//! Documents are requested as `{location}[/{label}]/{name}-{profile}.{ext}`,
//! the document URL form served by common config servers. The default
//! profile is named too (`{name}-default.{ext}`).

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::config::{RefreshSettings, SourceConfig};
use crate::merge::MergePlan;
use crate::source::{
    resolve_credential, DocumentFormat, RawDocument, SourceAdapter, SourceError,
};

/// Fetches documents over HTTP(S).
#[derive(Debug, Clone)]
pub struct EndpointSource {
    index: usize,
    name: String,
    base: String,
    label: Option<String>,
    ext: String,
    format: DocumentFormat,
    credentials_ref: Option<String>,
    client: reqwest::Client,
}

impl EndpointSource {
    pub fn new(
        index: usize,
        config: &SourceConfig,
        refresh: &RefreshSettings,
    ) -> Result<Self, SourceError> {
        let location = format!("endpoint:{}", config.location);
        let ext = config.format.clone().unwrap_or_else(|| "yml".to_string());
        let format = DocumentFormat::from_extension(&ext)
            .ok_or_else(|| SourceError::fetch(&location, format!("unknown document format '{}'", ext)))?;
        Url::parse(&config.location).map_err(|e| SourceError::fetch(&location, e))?;

        let client = reqwest::Client::builder()
            .timeout(refresh.fetch_timeout())
            .build()
            .map_err(|e| SourceError::fetch(&location, e))?;

        Ok(Self {
            index,
            name: config.name.clone(),
            base: config.location.trim_end_matches('/').to_string(),
            label: config.branch.clone(),
            ext,
            format,
            credentials_ref: config.credentials_ref.clone(),
            client,
        })
    }

    fn document_url(&self, profile: &str) -> String {
        let file = format!("{}-{}.{}", self.name, profile, self.ext);
        match &self.label {
            Some(label) => format!("{}/{}/{}", self.base, label, file),
            None => format!("{}/{}", self.base, file),
        }
    }
}

#[async_trait]
impl SourceAdapter for EndpointSource {
    async fn fetch(&self, plan: &MergePlan) -> Result<Vec<RawDocument>, SourceError> {
        let credential = resolve_credential(&self.describe(), self.credentials_ref.as_deref())?;

        let mut documents = Vec::new();
        for profile in plan.profiles() {
            let url = self.document_url(profile);
            let mut request = self.client.get(&url);
            if let Some(token) = &credential {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SourceError::fetch(self.describe(), e))?;

            let status = response.status();
            match status {
                StatusCode::NOT_FOUND => {
                    tracing::debug!(url = %url, "Profile document absent");
                    continue;
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(SourceError::auth(
                        self.describe(),
                        format!("{} returned {}", url, status),
                    ));
                }
                s if !s.is_success() => {
                    return Err(SourceError::fetch(
                        self.describe(),
                        format!("{} returned {}", url, status),
                    ));
                }
                _ => {}
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| SourceError::fetch(self.describe(), e))?;

            documents.push(RawDocument {
                origin: format!("endpoint:{}", url),
                format: self.format,
                profile: profile.clone(),
                source_index: self.index,
                bytes: bytes.to_vec(),
            });
        }

        tracing::debug!(source = %self.describe(), documents = documents.len(), "Endpoint fetched");
        Ok(documents)
    }

    fn describe(&self) -> String {
        format!("endpoint:{}", self.base)
    }
}
