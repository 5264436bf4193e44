//! HTTP classification service client
//!
//! Talks JSON to the classification backend:
//! - `POST {base}/api/classify`  -> `{prediction_id, label, report_data}`
//! - `POST {base}/api/recheck`   -> `{reclassified_as_phishing, reason, ...}`

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Classification, Classifier, Reevaluation, Verdict};
use crate::models::{MonitoringRecord, TargetEntity};
use crate::monitor::{MonitorError, MonitorResult};

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    url: &'a str,
    cse_domain: &'a str,
    cse_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    prediction_id: u8,
    #[serde(default)]
    report_data: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct RecheckRequest<'a> {
    domain: &'a str,
    cse_domain: &'a str,
    cse_name: &'a str,
    monitoring_units_elapsed: f64,
}

#[derive(Debug, Deserialize)]
struct RecheckResponse {
    reclassified_as_phishing: bool,
    #[serde(default)]
    reason: String,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

pub struct HttpClassifier {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::InvalidInput(format!("classifier client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn post<Req, Resp>(&self, path: &str, domain: &str, body: &Req) -> MonitorResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| MonitorError::classification(domain, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::classification(
                domain,
                format!("{} returned {}", path, status.as_u16()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| MonitorError::classification(domain, format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn classify(&self, domain: &str, target: &TargetEntity) -> MonitorResult<Classification> {
        let request = ClassifyRequest {
            url: domain,
            cse_domain: &target.domain,
            cse_name: &target.name,
        };

        let resp: ClassifyResponse = self.post("/api/classify", domain, &request).await?;
        let verdict = Verdict::from_label_id(resp.prediction_id).ok_or_else(|| {
            MonitorError::classification(domain, format!("unknown prediction id {}", resp.prediction_id))
        })?;

        Ok(Classification {
            verdict,
            evidence: resp.report_data,
        })
    }

    async fn reevaluate(&self, record: &MonitoringRecord) -> MonitorResult<Reevaluation> {
        let request = RecheckRequest {
            domain: &record.domain,
            cse_domain: &record.target_entity.domain,
            cse_name: &record.target_entity.name,
            monitoring_units_elapsed: record.elapsed_units(),
        };

        let resp: RecheckResponse = self.post("/api/recheck", &record.domain, &request).await?;

        let mut evidence = resp.rest;
        evidence.insert("reason".to_string(), resp.reason.clone().into());
        evidence.insert(
            "reclassified_as_phishing".to_string(),
            resp.reclassified_as_phishing.into(),
        );

        Ok(Reevaluation {
            promote: resp.reclassified_as_phishing,
            reason: resp.reason,
            evidence: serde_json::Value::Object(evidence),
        })
    }
}
