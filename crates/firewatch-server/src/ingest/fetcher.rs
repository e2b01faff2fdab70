//! Per-layer fallback over the candidate wire formats.

use firewatch_core::Feature;

use super::{FeatureService, LayerRequest, WireFormat};
use crate::error::LayerError;

/// Features of one layer and the format that produced them.
#[derive(Debug, Clone)]
pub struct FormatOutcome {
    pub format: WireFormat,
    pub features: Vec<Feature>,
}

/// Try each format in order and return the first that fetches and parses.
/// Failed attempts are not retried; they are logged and the next format is
/// tried.
pub async fn fetch_with_fallback(
    service: &dyn FeatureService,
    request: &LayerRequest<'_>,
    formats: &[WireFormat],
) -> Result<FormatOutcome, LayerError> {
    let mut attempts = Vec::with_capacity(formats.len());
    for &format in formats {
        match service.fetch_layer(request, format).await {
            Ok(features) => {
                tracing::debug!(
                    layer = %request.typename,
                    %format,
                    features = features.len(),
                    "layer fetched"
                );
                return Ok(FormatOutcome { format, features });
            }
            Err(err) => {
                tracing::warn!(layer = %request.typename, %format, error = %err, "format attempt failed");
                attempts.push((format, err));
            }
        }
    }
    Err(LayerError::AllFormatsFailed {
        layer: request.typename.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::ingest::BoundingBox;
    use async_trait::async_trait;
    use firewatch_core::Position;
    use serde_json::Map;
    use std::sync::Mutex;

    /// Fails every format listed in `broken`, records call order.
    struct Flaky {
        broken: Vec<WireFormat>,
        calls: Mutex<Vec<WireFormat>>,
    }

    #[async_trait]
    impl FeatureService for Flaky {
        async fn fetch_layer(
            &self,
            _request: &LayerRequest<'_>,
            format: WireFormat,
        ) -> Result<Vec<Feature>, FetchError> {
            self.calls.lock().unwrap().push(format);
            if self.broken.contains(&format) {
                return Err(FetchError::Status(500));
            }
            Ok(vec![Feature::point(Position::new(-50.0, -10.0), Map::new())])
        }
    }

    #[tokio::test]
    async fn falls_through_to_first_working_format() {
        let service = Flaky {
            broken: vec![WireFormat::GeoJson],
            calls: Mutex::new(Vec::new()),
        };
        let bbox = BoundingBox::parse(None).unwrap();
        let request = LayerRequest {
            typename: "fires",
            bbox: &bbox,
            count: 10,
        };
        let outcome = fetch_with_fallback(&service, &request, &WireFormat::ALL).await.unwrap();
        assert_eq!(outcome.format, WireFormat::Csv);
        assert_eq!(*service.calls.lock().unwrap(), vec![WireFormat::GeoJson, WireFormat::Csv]);
    }

    #[tokio::test]
    async fn reports_every_failed_attempt() {
        let service = Flaky {
            broken: WireFormat::ALL.to_vec(),
            calls: Mutex::new(Vec::new()),
        };
        let bbox = BoundingBox::parse(None).unwrap();
        let request = LayerRequest {
            typename: "fires",
            bbox: &bbox,
            count: 10,
        };
        let err = fetch_with_fallback(&service, &request, &WireFormat::ALL).await.unwrap_err();
        let LayerError::AllFormatsFailed { layer, attempts } = err;
        assert_eq!(layer, "fires");
        let tried: Vec<WireFormat> = attempts.iter().map(|(f, _)| *f).collect();
        assert_eq!(tried, WireFormat::ALL.to_vec());
    }
}
