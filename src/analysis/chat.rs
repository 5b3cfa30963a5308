//! OpenAI-compatible chat-completions analyst.
//!
//! Works with any endpoint exposing `POST {base_url}/chat/completions`,
//! including DeepSeek (the default) and OpenAI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{AnalysisRequest, PressureAnalyst};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, PressureError};
use crate::types::{AiAnalysis, StressFactor};

const SYSTEM_PROMPT: &str = r#"You are the core of a workplace-pressure journal. You read people's tap data (count, density, timing) and their short notes, and answer like a clear-headed, funny, empathetic mentor.

Return a single JSON object and nothing else:
{
  "pressureType": "acute" or "chronic",
  "resignationIndex": integer 0-100,
  "insight": "one counter-intuitive insight",
  "quote": "one bittersweet workplace one-liner",
  "stressFactors": [{"name": "factor", "percentage": number}]
}"#;

const ATTRIBUTION_SYSTEM_PROMPT: &str =
    "You are a funny, empathetic workplace mentor. Check in on the user in one sentence.";

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

/// Analysis object expected inside the assistant message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisContent {
    pressure_type: String,
    resignation_index: i64,
    #[serde(default)]
    insight: String,
    #[serde(default)]
    quote: String,
    #[serde(default)]
    stress_factors: Vec<serde_json::Value>,
}

/// Analyst backed by a chat-completions endpoint
pub struct ChatCompletionsAnalyst {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatCompletionsAnalyst {
    pub fn new(config: &AnalysisConfig) -> Result<Self, PressureError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PressureError::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn complete(
        &self,
        system: &str,
        user: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, AnalysisError> {
        let api_key = self.api_key.as_ref().ok_or(AnalysisError::MissingCredential)?;

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(self.chat_completions_url())
            .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::TransportError(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisError::MalformedResponse("no message content".to_string()))
    }
}

#[async_trait]
impl PressureAnalyst for ChatCompletionsAnalyst {
    fn id(&self) -> &str {
        &self.model
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AiAnalysis, AnalysisError> {
        let content = self
            .complete(SYSTEM_PROMPT, build_analysis_prompt(request), 0.7, 1000)
            .await?;
        parse_analysis_content(&content, Utc::now())
    }

    async fn proactive_attribution(
        &self,
        click_count: usize,
        peak_time: Option<DateTime<Utc>>,
    ) -> Result<String, AnalysisError> {
        let when = peak_time
            .map(|t| format!("at {}", t.format("%H:%M")))
            .unwrap_or_else(|| "just now".to_string());
        let prompt = format!(
            "The user {when} went through {click_count} taps, an unusual spike. \
             Ask them what happened in one light, empathetic, informal sentence."
        );

        let sentence = self
            .complete(ATTRIBUTION_SYSTEM_PROMPT, prompt, 0.8, 100)
            .await?;
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return Err(AnalysisError::MalformedResponse("empty sentence".to_string()));
        }
        Ok(sentence.to_string())
    }
}

/// User prompt summarizing one record
fn build_analysis_prompt(request: &AnalysisRequest) -> String {
    let mut prompt = format!(
        "Analyze this pressure data:\n\n\
         - Date: {}\n\
         - Total taps: {}\n\
         - Pressure level: {}\n\
         - Stress density: {:.2} taps/minute",
        request.date, request.click_count, request.pressure_level, request.stress_density
    );

    if let Some(peak) = request.peak_time {
        prompt.push_str(&format!("\n- Peak window: {}", peak.format("%Y-%m-%d %H:%M")));
    }
    if let Some(notes) = &request.user_notes {
        prompt.push_str(&format!("\n- User notes: {notes}"));
    }

    prompt.push_str(
        "\n\nFollowing the system instructions, classify the pressure type, score the \
         resignation index, give one insight and one quote, and break down the stress \
         sources (boss, overtime, commute, colleagues...).",
    );
    prompt
}

/// Parse the assistant message into an analysis.
///
/// Tolerates a Markdown code fence around the JSON. A missing or out-of-range
/// `resignationIndex` (or any non-object payload) is a malformed response.
/// Stress factors lacking a name or numeric percentage are skipped.
pub(crate) fn parse_analysis_content(
    content: &str,
    now: DateTime<Utc>,
) -> Result<AiAnalysis, AnalysisError> {
    let json = strip_code_fence(content);
    let parsed: AnalysisContent = serde_json::from_str(json)
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    let resignation_index = u8::try_from(parsed.resignation_index)
        .ok()
        .filter(|i| *i <= 100)
        .ok_or_else(|| {
            AnalysisError::MalformedResponse(format!(
                "resignationIndex {} outside 0-100",
                parsed.resignation_index
            ))
        })?;

    let stress_factors = parsed
        .stress_factors
        .iter()
        .filter_map(|factor| {
            let name = factor.get("name")?.as_str()?;
            let percentage = factor.get("percentage")?.as_f64()?;
            Some(StressFactor {
                name: name.to_string(),
                percentage,
            })
        })
        .collect();

    Ok(AiAnalysis {
        timestamp: now,
        pressure_type: parsed.pressure_type,
        resignation_index,
        insight: parsed.insight,
        quote: parsed.quote,
        stress_factors,
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PressureLevel;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_content() {
        let content = r#"{
            "pressureType": "acute",
            "resignationIndex": 64,
            "insight": "You tap hardest right after lunch.",
            "quote": "Coffee is a coping strategy, not a personality.",
            "stressFactors": [
                {"name": "boss", "percentage": 55},
                {"name": "commute", "percentage": 30.5},
                {"name": "broken"}
            ]
        }"#;

        let analysis = parse_analysis_content(content, Utc::now()).unwrap();
        assert_eq!(analysis.pressure_type, "acute");
        assert_eq!(analysis.resignation_index, 64);
        assert_eq!(
            analysis.stress_factors,
            vec![
                StressFactor {
                    name: "boss".to_string(),
                    percentage: 55.0
                },
                StressFactor {
                    name: "commute".to_string(),
                    percentage: 30.5
                },
            ]
        );
    }

    #[test]
    fn test_parse_fenced_content() {
        let content = "```json\n{\"pressureType\": \"chronic\", \"resignationIndex\": 12}\n```";
        let analysis = parse_analysis_content(content, Utc::now()).unwrap();

        assert_eq!(analysis.pressure_type, "chronic");
        assert_eq!(analysis.resignation_index, 12);
        assert!(analysis.insight.is_empty());
    }

    #[test]
    fn test_missing_resignation_index_is_malformed() {
        let content = r#"{"pressureType": "acute", "insight": "hmm"}"#;
        let err = parse_analysis_content(content, Utc::now()).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_out_of_range_index_is_malformed() {
        let content = r#"{"pressureType": "acute", "resignationIndex": 140}"#;
        assert!(parse_analysis_content(content, Utc::now()).is_err());

        let content = r#"{"pressureType": "acute", "resignationIndex": -3}"#;
        assert!(parse_analysis_content(content, Utc::now()).is_err());
    }

    #[test]
    fn test_prose_is_malformed() {
        let err = parse_analysis_content("Sorry, I can't help with that.", Utc::now()).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_prompt_includes_optional_fields() {
        let request = AnalysisRequest {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            click_count: 312,
            pressure_level: PressureLevel::Severe,
            stress_density: 1.234,
            peak_time: Some(Utc.with_ymd_and_hms(2024, 1, 15, 16, 40, 0).unwrap()),
            user_notes: Some("deadline moved up".to_string()),
        };

        let prompt = build_analysis_prompt(&request);
        assert!(prompt.contains("Total taps: 312"));
        assert!(prompt.contains("Pressure level: severe"));
        assert!(prompt.contains("1.23 taps/minute"));
        assert!(prompt.contains("2024-01-15 16:40"));
        assert!(prompt.contains("deadline moved up"));
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let config = AnalysisConfig {
            api_key: None,
            ..AnalysisConfig::default()
        };
        let analyst = ChatCompletionsAnalyst::new(&config).unwrap();
        let request = AnalysisRequest {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            click_count: 1,
            pressure_level: PressureLevel::Mild,
            stress_density: 0.0,
            peak_time: None,
            user_notes: None,
        };

        assert_eq!(
            analyst.analyze(&request).await.unwrap_err(),
            AnalysisError::MissingCredential
        );
    }
}
