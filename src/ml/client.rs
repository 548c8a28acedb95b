use std::time::Duration;

use futures::future::join_all;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::MlConfig;
use crate::error::{AppError, UpstreamError};
use crate::Result;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct ModelEndpoint {
    pub name: &'static str,
    pub url: String,
    pub weight: f64,
}

/// A raw answer from one model.
#[derive(Debug, Clone)]
pub struct ModelAnswer {
    pub source: &'static str,
    pub weight: f64,
    pub body: Value,
}

impl ModelAnswer {
    fn score(&self) -> f64 {
        self.body.get("confidence").and_then(Value::as_f64).unwrap_or(0.0) * self.weight
    }
}

/// Weighted ensemble over the configured prediction services.
pub struct MlClient {
    http: reqwest::Client,
    models: Vec<ModelEndpoint>,
}

impl MlClient {
    pub fn new(config: &MlConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::ConfigError(format!("failed to build ML client: {}", e)))?;

        let mut models = vec![ModelEndpoint {
            name: "primary",
            url: config.primary_url.trim_end_matches('/').to_string(),
            weight: config.primary_weight,
        }];
        if let Some(url) = config.secondary_url.as_deref().filter(|u| !u.is_empty()) {
            models.push(ModelEndpoint {
                name: "secondary",
                url: url.trim_end_matches('/').to_string(),
                weight: config.secondary_weight,
            });
        }

        Ok(Self { http, models })
    }

    pub fn models(&self) -> &[ModelEndpoint] {
        &self.models
    }

    async fn ask(&self, model: &ModelEndpoint, image: &[u8], crop: &str) -> Result<ModelAnswer> {
        let file = Part::bytes(image.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().text("crop", crop.to_string()).part("file", file);

        let body = self
            .http
            .post(format!("{}/predict", model.url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        if !body.is_object() {
            return Err(UpstreamError::ResponseError(format!("{} model returned a non-object body", model.name)).into());
        }

        Ok(ModelAnswer {
            source: model.name,
            weight: model.weight,
            body,
        })
    }

    /// Sends the image to every model and keeps the answer with the highest
    /// confidence × weight. `None` when no model answered.
    pub async fn predict(&self, image: &[u8], crop: &str) -> Option<ModelAnswer> {
        let answers = join_all(self.models.iter().map(|model| self.ask(model, image, crop))).await;

        let best = answers
            .into_iter()
            .zip(&self.models)
            .filter_map(|(answer, model)| match answer {
                Ok(answer) => Some(answer),
                Err(e) => {
                    warn!("{} ML model failed: {}", model.name, e);
                    None
                }
            })
            .reduce(|best, answer| if answer.score() > best.score() { answer } else { best });

        if let Some(answer) = &best {
            let confidence = answer.body.get("confidence").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
            info!("Using {} model prediction with confidence: {}", answer.source, confidence);
        }
        best
    }

    /// Whether the primary model answers its health probe.
    pub async fn is_up(&self) -> bool {
        let Some(primary) = self.models.first() else {
            return false;
        };
        let probe = self
            .http
            .get(format!("{}/health", primary.url))
            .timeout(HEALTH_TIMEOUT)
            .send();
        match probe.await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(primary: &str, secondary: Option<&str>) -> MlConfig {
        MlConfig {
            primary_url: primary.to_string(),
            secondary_url: secondary.map(String::from),
            timeout_secs: 5,
            primary_weight: 0.6,
            secondary_weight: 0.3,
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_predict_prefers_weighted_confidence() {
        let primary = MockServer::start().await;
        let secondary = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Early Blight", "confidence": 0.7})))
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Root Rot", "confidence": 0.95})))
            .mount(&secondary)
            .await;

        let client = MlClient::new(&config(&primary.uri(), Some(&secondary.uri()))).unwrap();
        let answer = client.predict(&[1u8; 2048], "tomato").await.unwrap();

        // 0.7 * 0.6 = 0.42 beats 0.95 * 0.3 = 0.285
        assert_eq!(answer.source, "primary");
        assert_eq!(answer.body["name"], "Early Blight");
    }

    #[test_log::test(tokio::test)]
    async fn test_predict_skips_failed_models() {
        let primary = MockServer::start().await;
        let secondary = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Leaf Spot", "confidence": 0.6})))
            .mount(&secondary)
            .await;

        let client = MlClient::new(&config(&primary.uri(), Some(&secondary.uri()))).unwrap();
        let answer = client.predict(&[1u8; 2048], "spinach").await.unwrap();
        assert_eq!(answer.source, "secondary");
    }

    #[test_log::test(tokio::test)]
    async fn test_predict_none_when_all_fail() {
        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&primary)
            .await;

        let client = MlClient::new(&config(&primary.uri(), None)).unwrap();
        assert_eq!(client.models().len(), 1);
        assert!(client.predict(&[1u8; 2048], "corn").await.is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_health_probe() {
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&primary)
            .await;

        assert!(MlClient::new(&config(&primary.uri(), None)).unwrap().is_up().await);
        assert!(!MlClient::new(&config("http://127.0.0.1:9", None)).unwrap().is_up().await);
    }

    #[test_log::test(tokio::test)]
    async fn test_health_probe_gives_up_quickly() {
        let primary = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&primary)
            .await;

        let mut slow = config(&primary.uri(), None);
        slow.timeout_secs = 30;
        let client = MlClient::new(&slow).unwrap();

        let started = std::time::Instant::now();
        assert!(!client.is_up().await);
        assert!(started.elapsed() < Duration::from_secs(8));
    }
}
