// src/agent/schema.rs

//! Typed contract for the planner's structured output.
//!
//! Every completion-service response must deserialize into `QueryPlan`.
//! A response that does not is treated exactly like a service outage; there
//! is no partial acceptance of malformed output.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plans below this confidence never reach execution.
pub const CONFIDENCE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddressAnalysis,
    TokenAnalysis,
    /// Catch-all. Also absorbs historical intents (whale_tracking,
    /// profit_analysis, ...) that never drove execution.
    #[serde(other)]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AddressAnalysis => "address_analysis",
            Intent::TokenAnalysis => "token_analysis",
            Intent::Unknown => "unknown",
        }
    }
}

/// Entities pulled out of the query. Duplicates carry no meaning; treat each
/// list as a set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedData {
    pub addresses: Vec<String>,
    pub tokens: Vec<String>,
    pub contract_addresses: Vec<String>,
    pub collections: Vec<String>,
    pub collection_addresses: Vec<String>,
    pub amounts: Vec<String>,
    pub timeframes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCall {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub intent: Intent,
    pub confidence: f64,
    #[serde(default)]
    pub extracted_data: ExtractedData,
    #[serde(default)]
    pub api_calls: Vec<PlannedCall>,
    #[serde(default)]
    pub reasoning: String,
}

impl QueryPlan {
    /// Shape checks beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            bail!("confidence {} outside [0, 1]", self.confidence);
        }
        Ok(())
    }

    /// A plan under the threshold is a terminal "ask a clearer question"
    /// outcome; no calls may survive on it.
    pub fn enforce_threshold(&mut self) {
        if self.confidence < CONFIDENCE_THRESHOLD {
            self.api_calls.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_model_output() {
        let raw = json!({
            "intent": "address_analysis",
            "confidence": 0.9,
            "extractedData": {
                "addresses": ["0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"],
                "contractAddresses": []
            },
            "apiCalls": [
                { "method": "core.getBalance", "params": ["0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", "latest"], "purpose": "balance" }
            ],
            "reasoning": "wallet question",
            "hunterCommentary": "ignored legacy field"
        });
        let plan: QueryPlan = serde_json::from_value(raw).unwrap();
        assert_eq!(plan.intent, Intent::AddressAnalysis);
        assert_eq!(plan.api_calls.len(), 1);
        assert_eq!(plan.api_calls[0].purpose, "balance");
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn historical_intents_fold_into_unknown() {
        let plan: QueryPlan = serde_json::from_value(json!({
            "intent": "whale_tracking",
            "confidence": 0.8
        }))
        .unwrap();
        assert_eq!(plan.intent, Intent::Unknown);
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let plan: QueryPlan = serde_json::from_value(json!({
            "intent": "token_analysis",
            "confidence": 1.5
        }))
        .unwrap();
        assert!(plan.validate().is_err());

        let negative: QueryPlan = serde_json::from_value(json!({
            "intent": "token_analysis",
            "confidence": -0.1
        }))
        .unwrap();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn threshold_clears_calls() {
        let mut plan: QueryPlan = serde_json::from_value(json!({
            "intent": "address_analysis",
            "confidence": 0.2,
            "apiCalls": [
                { "method": "core.getBalance", "params": [], "purpose": "balance" }
            ]
        }))
        .unwrap();
        plan.enforce_threshold();
        assert!(plan.api_calls.is_empty());
    }

    #[test]
    fn missing_required_fields_fail_to_parse() {
        assert!(serde_json::from_value::<QueryPlan>(json!({ "intent": "unknown" })).is_err());
        assert!(serde_json::from_value::<QueryPlan>(json!({ "confidence": 0.4 })).is_err());
    }
}
