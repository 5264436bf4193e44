//! Simulated classification service
//!
//! Stand-in for the real model and re-scan detector. Verdicts come from
//! domain keywords, evidence mimics WHOIS / geo-IP lookups, and the re-scan
//! promotes with a fixed probability per check. Seeding makes the whole
//! sequence reproducible.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use super::{Classification, Classifier, Reevaluation, Verdict};
use crate::models::{MonitoringRecord, TargetEntity};
use crate::monitor::{MonitorError, MonitorResult};

pub const DEFAULT_PROMOTION_PROBABILITY: f64 = 0.1;

const CONTENT_CHANGE_REASON: &str = "High visual similarity to CSE login page detected.";
const STILL_PARKED_REASON: &str = "Domain still parked or content is non-CSE specific.";

pub struct SimulatedClassifier {
    rng: Mutex<StdRng>,
    promotion_probability: f64,
    fixed_verdict: Option<Verdict>,
}

impl SimulatedClassifier {
    /// `promotion_probability` must be within `[0, 1]`.
    pub fn new(promotion_probability: f64, seed: Option<u64>) -> MonitorResult<Self> {
        if !(0.0..=1.0).contains(&promotion_probability) {
            return Err(MonitorError::InvalidInput(format!(
                "promotion probability must be within [0, 1], got {}",
                promotion_probability
            )));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            rng: Mutex::new(rng),
            promotion_probability,
            fixed_verdict: None,
        })
    }

    /// Always return `verdict` from `classify`, whatever the domain.
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.fixed_verdict = Some(verdict);
        self
    }

    fn keyword_verdict(domain: &str) -> Verdict {
        if domain.contains("legit") {
            Verdict::Legitimate
        } else if domain.contains("suspected") || domain.contains("parked") {
            Verdict::Suspected
        } else {
            Verdict::Phishing
        }
    }

    fn confidence_scores(rng: &mut StdRng, verdict: Verdict) -> Value {
        let top: f64 = rng.gen_range(0.80..0.97);
        let rest = 1.0 - top;
        let split: f64 = rng.gen_range(0.2..0.8);
        let (a, b) = (rest * split, rest * (1.0 - split));

        let scores = match verdict {
            Verdict::Legitimate => [top, a, b],
            Verdict::Suspected => [a, top, b],
            Verdict::Phishing => [a, b, top],
        };

        json!({
            "legitimate_score": round4(scores[0]),
            "suspected_score": round4(scores[1]),
            "phishing_score": round4(scores[2]),
        })
    }

    fn domain_attributes(rng: &mut StdRng, domain: &str) -> Value {
        let (age_days, registrar) = if domain.contains("legit") {
            (rng.gen_range(2000..5000), "Google LLC")
        } else if domain.contains("suspected") || domain.contains("parked") {
            let registrar = ["Namecheap", "GoDaddy", "PublicDomainRegistry"]
                .choose(rng)
                .copied()
                .unwrap_or("Namecheap");
            (rng.gen_range(10..90), registrar)
        } else {
            let registrar = ["CheapDomains", "PrivacyProtect"]
                .choose(rng)
                .copied()
                .unwrap_or("CheapDomains");
            (rng.gen_range(1..15), registrar)
        };

        let created = Utc::now() - Duration::days(age_days);
        json!({
            "identified_domain": domain,
            "creation_date_time": created.format("%Y-%m-%d %H:%M:%S").to_string(),
            "domain_age_days": age_days,
            "registrar_info": registrar,
            "is_privacy_protected": rng.gen_bool(0.5),
        })
    }

    fn network_attributes(rng: &mut StdRng, domain: &str) -> Value {
        let (ip, subnet, geo) = if domain.ends_with("vercel.app") {
            (
                "76.76.21.21".to_string(),
                "76.76.0.0/16",
                "San Francisco, US (Hosting/Tunneling Service)",
            )
        } else if domain.contains("suspected") || domain.contains("parked") {
            let geo = ["Mumbai, IN (VPS)", "Frankfurt, DE (Cloud)"]
                .choose(rng)
                .copied()
                .unwrap_or("Mumbai, IN (VPS)");
            (format!("192.168.1.{}", rng.gen_range(100..=200)), "192.168.0.0/16", geo)
        } else {
            let geo = ["Singapore, SG", "London, UK"]
                .choose(rng)
                .copied()
                .unwrap_or("Singapore, SG");
            (
                format!("104.22.{}.{}", rng.gen_range(0..=255), rng.gen_range(0..=255)),
                "104.22.0.0/16",
                geo,
            )
        };

        json!({
            "ip_address": ip,
            "subnet_info": subnet,
            "geo_location": geo,
            "ip_reputation_score": round2(rng.gen_range(0.1..0.9)),
        })
    }
}

#[async_trait]
impl Classifier for SimulatedClassifier {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn classify(&self, domain: &str, target: &TargetEntity) -> MonitorResult<Classification> {
        let verdict = self
            .fixed_verdict
            .unwrap_or_else(|| Self::keyword_verdict(domain));

        let mut rng = self.rng.lock();
        let evidence = json!({
            "source": self.name(),
            "critical_sector_entity": target.name,
            "genuine_cse_domain": target.domain,
            "classification_id": verdict.label_id(),
            "model_confidence": Self::confidence_scores(&mut rng, verdict),
            "domain_attributes": Self::domain_attributes(&mut rng, domain),
            "network_attributes": Self::network_attributes(&mut rng, domain),
        });

        Ok(Classification { verdict, evidence })
    }

    async fn reevaluate(&self, record: &MonitoringRecord) -> MonitorResult<Reevaluation> {
        let mut rng = self.rng.lock();

        if rng.gen_bool(self.promotion_probability) {
            let similarity = round2(rng.gen_range(0.85..0.98));
            let evidence = json!({
                "source": self.name(),
                "critical_sector_entity": record.target_entity.name,
                "genuine_cse_domain": record.target_entity.domain,
                "classification_id": Verdict::Phishing.label_id(),
                "model_confidence": {
                    "legitimate_score": 0.01,
                    "suspected_score": 0.02,
                    "phishing_score": 0.97,
                },
                "content_check": {
                    "is_content_hosted": true,
                    "visual_similarity_score": similarity,
                    "reason": CONTENT_CHANGE_REASON,
                },
                "domain_attributes": Self::domain_attributes(&mut rng, &record.domain),
                "network_attributes": Self::network_attributes(&mut rng, &record.domain),
            });

            Ok(Reevaluation {
                promote: true,
                reason: CONTENT_CHANGE_REASON.to_string(),
                evidence,
            })
        } else {
            Ok(Reevaluation {
                promote: false,
                reason: STILL_PARKED_REASON.to_string(),
                evidence: json!({
                    "is_content_hosted": false,
                    "visual_similarity_score": round2(rng.gen_range(0.05..0.25)),
                    "reason": STILL_PARKED_REASON,
                }),
            })
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
