//! WFS `GetFeature` client.

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, Url};
use std::time::Duration;

use firewatch_core::Feature;

use super::{formats, BoundingBox, WireFormat};
use crate::error::FetchError;

/// One layer query against the feature service.
#[derive(Debug, Clone, Copy)]
pub struct LayerRequest<'a> {
    pub typename: &'a str,
    pub bbox: &'a BoundingBox,
    pub count: u32,
}

/// Source of hotspot features for a single layer in a single wire format.
#[async_trait]
pub trait FeatureService: Send + Sync {
    async fn fetch_layer(
        &self,
        request: &LayerRequest<'_>,
        format: WireFormat,
    ) -> Result<Vec<Feature>, FetchError>;
}

/// Live WFS endpoint: `{base}/{key}?SERVICE=WFS&REQUEST=GetFeature...`.
#[derive(Debug, Clone)]
pub struct WfsClient {
    client: Client,
    base: String,
    key: String,
    timeout: Duration,
}

impl WfsClient {
    pub fn new(client: Client, base: &str, key: &str, timeout: Duration) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            key: key.trim_start_matches('/').to_string(),
            timeout,
        }
    }

    pub fn build_url(&self, request: &LayerRequest<'_>, format: WireFormat) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/{}", self.base, self.key))
            .map_err(|e| FetchError::Network(format!("invalid feature service URL: {e}")))?;
        let output_format = format.output_format();
        url.query_pairs_mut()
            .append_pair("SERVICE", "WFS")
            .append_pair("REQUEST", "GetFeature")
            .append_pair("VERSION", "2.0.0")
            .append_pair("SRSNAME", "urn:ogc:def:crs:EPSG::4326")
            .append_pair("TYPENAMES", request.typename)
            .append_pair("COUNT", &request.count.to_string())
            .append_pair("BBOX", &request.bbox.to_wfs_param())
            .append_pair("outputFormat", output_format)
            .append_pair("OUTPUTFORMAT", output_format);
        Ok(url)
    }

    /// URL with the credential masked, for logs.
    pub fn redact(&self, url: &Url) -> String {
        if self.key.is_empty() {
            return url.to_string();
        }
        url.as_str().replace(&self.key, "***")
    }
}

#[async_trait]
impl FeatureService for WfsClient {
    async fn fetch_layer(
        &self,
        request: &LayerRequest<'_>,
        format: WireFormat,
    ) -> Result<Vec<Feature>, FetchError> {
        let url = self.build_url(request, format)?;
        tracing::info!(layer = %request.typename, %format, url = %self.redact(&url), "requesting WFS layer");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, format.accept())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        formats::parse(format, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_wfs_parameters_and_hides_key_in_logs() {
        let client = WfsClient::new(
            Client::new(),
            "https://firms.example/wfs/South_America/",
            "SECRET123",
            Duration::from_secs(5),
        );
        let bbox = BoundingBox::parse(Some("-10,-50,-5,-45")).unwrap();
        let request = LayerRequest {
            typename: "ms:fires_24h",
            bbox: &bbox,
            count: 100,
        };
        let url = client.build_url(&request, WireFormat::Csv).unwrap();

        assert_eq!(url.path(), "/wfs/South_America/SECRET123");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |key: &str| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        assert_eq!(get("SERVICE"), Some("WFS"));
        assert_eq!(get("VERSION"), Some("2.0.0"));
        assert_eq!(get("TYPENAMES"), Some("ms:fires_24h"));
        assert_eq!(get("COUNT"), Some("100"));
        assert_eq!(get("BBOX"), Some("-50,-10,-45,-5"));
        assert_eq!(get("outputFormat"), Some("csv"));
        assert_eq!(get("OUTPUTFORMAT"), Some("csv"));

        let logged = client.redact(&url);
        assert!(!logged.contains("SECRET123"));
        assert!(logged.contains("***"));
    }
}
