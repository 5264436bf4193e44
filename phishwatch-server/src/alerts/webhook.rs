//! Webhook alert delivery (Slack, Discord, generic JSON)

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::AlertSink;
use crate::models::MonitoringRecord;
use crate::monitor::{MonitorError, MonitorResult};

const ALERT_COLOR: &str = "#e74c3c";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookPlatform {
    Slack,
    Discord,
    Generic,
}

impl WebhookPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookPlatform::Slack => "slack",
            WebhookPlatform::Discord => "discord",
            WebhookPlatform::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "slack" => WebhookPlatform::Slack,
            "discord" => WebhookPlatform::Discord,
            _ => WebhookPlatform::Generic,
        }
    }
}

pub struct WebhookAlertSink {
    url: String,
    platform: WebhookPlatform,
    http_client: reqwest::Client,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>, platform: WebhookPlatform) -> MonitorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MonitorError::InvalidInput(format!("webhook client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            platform,
            http_client,
        })
    }

    fn format_payload(&self, record: &MonitoringRecord, message: &str) -> serde_json::Value {
        let title = format!("[CRITICAL] {} re-classified as Phishing", record.domain);

        match self.platform {
            WebhookPlatform::Slack => json!({
                "blocks": [
                    {
                        "type": "header",
                        "text": { "type": "plain_text", "text": title, "emoji": true }
                    },
                    {
                        "type": "section",
                        "text": { "type": "mrkdwn", "text": message }
                    },
                    {
                        "type": "section",
                        "fields": [
                            { "type": "mrkdwn", "text": format!("*Target:* {} ({})", record.target_entity.name, record.target_entity.domain) },
                            { "type": "mrkdwn", "text": format!("*Monitored for:* {:.1} units", record.elapsed_units()) }
                        ]
                    }
                ],
                "attachments": [{ "color": ALERT_COLOR }]
            }),
            WebhookPlatform::Discord => json!({
                "embeds": [{
                    "title": title,
                    "description": message,
                    "color": u32::from_str_radix(&ALERT_COLOR[1..], 16).unwrap_or(0),
                    "fields": [
                        { "name": "Target", "value": record.target_entity.name, "inline": true },
                        { "name": "Genuine domain", "value": record.target_entity.domain, "inline": true }
                    ],
                    "timestamp": record.last_transition_at.to_rfc3339()
                }]
            }),
            WebhookPlatform::Generic => json!({
                "title": title,
                "message": message,
                "record_id": record.id,
                "domain": record.domain,
                "critical_sector_entity": record.target_entity.name,
                "genuine_cse_domain": record.target_entity.domain,
                "reclassification_reason": record.reclassification_reason,
                "timestamp": record.last_transition_at.timestamp(),
            }),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, record: &MonitoringRecord, message: &str) -> MonitorResult<()> {
        let payload = self.format_payload(record, message);

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::AlertDelivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MonitorError::AlertDelivery(format!(
                "{} webhook returned {}",
                self.platform.as_str(),
                response.status().as_u16()
            )));
        }

        tracing::info!("Alert for {} sent via {} webhook", record.domain, self.platform.as_str());
        Ok(())
    }
}
