//! LLM-backed design adapter.
//!
//! One reqwest client against a `generateContent`-style endpoint serves
//! the three language stages: intent analysis, design ideation, and
//! prompt optimization. The request's model selector resolves to a
//! concrete upstream model through a strategy table.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use pictor_core::request::ModelKind;

use crate::error::CapabilityError;
use crate::ports::{
    DesignProposal, DesignProposer, Intent, IntentAnalyzer, PromptOptimizer, RenderPrompt,
};

/// Resolve a model selector to the upstream model name.
pub fn model_name(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Pro => "gemini-1.5-pro",
        ModelKind::Flash => "gemini-1.5-flash",
    }
}

/// Temperature used for the stages that do not carry the request's
/// creativity value (ideation and optimization).
const DEFAULT_TEMPERATURE: f64 = 0.7;

const ANALYZE_INSTRUCTION: &str = "You are the intent analyser of an image generation \
assistant. Restate the user's request as a one-sentence summary, list the visual \
elements the image must contain, and name a style direction if the request implies \
one. Reply with raw JSON only: \
{\"summary\": \"...\", \"key_elements\": [\"...\"], \"style\": \"...\" or null}";

const PROPOSE_INSTRUCTION: &str = "You are a senior visual designer. Produce two to \
three distinct design proposals for the analysed request, ordered best first. Each \
proposal needs a short title, a full design direction (composition, palette, mood), \
and a rationale explaining why it answers the request. Reply with raw JSON only: \
{\"proposals\": [{\"title\": \"...\", \"direction\": \"...\", \"rationale\": \"...\"}]}";

const OPTIMIZE_INSTRUCTION: &str = "You are a prompt engineer for an image model. \
Convert the design proposal into a single detailed render prompt covering subject, \
style, composition, colour scheme, lighting, and technical detail, 100-300 words. \
Do not mention logos, QR codes, or watermarks; overlays are composited separately. \
Reply with raw JSON only: {\"prompt\": \"...\", \"rationale\": \"...\"}";

/// HTTP client for the design-side language model.
pub struct DesignClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ProposalList {
    proposals: Vec<DesignProposal>,
}

#[derive(Debug, Deserialize)]
struct OptimizedPrompt {
    prompt: String,
    rationale: String,
}

impl DesignClient {
    /// * `api_url` - Base URL, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }

    /// Send one instruction + user turn and return the model's text.
    async fn generate(
        &self,
        model: ModelKind,
        instruction: &str,
        user_text: &str,
        temperature: f64,
        inline_image: Option<&[u8]>,
    ) -> Result<String, CapabilityError> {
        let mut parts = vec![json!({ "text": user_text })];
        if let Some(bytes) = inline_image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": "image/png",
                    "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                }
            }));
        }

        let body = json!({
            "system_instruction": { "parts": [{ "text": instruction }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "temperature": temperature },
        });

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.api_url,
                model_name(model)
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CapabilityError::from_status(status.as_u16(), body));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| {
                CapabilityError::Permanent("model response contained no candidates".into())
            })?;
        Ok(text)
    }
}

/// Pull a JSON object out of a model reply that may wrap it in a fenced
/// code block or surround it with prose.
pub fn extract_json(text: &str) -> Result<serde_json::Value, CapabilityError> {
    let trimmed = text.trim();
    let candidate = if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let after_tag = after_fence
            .strip_prefix("json")
            .unwrap_or(after_fence)
            .trim_start();
        match after_tag.find("```") {
            Some(end) => &after_tag[..end],
            None => after_tag,
        }
    } else if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}')) {
        &trimmed[open..=close]
    } else {
        trimmed
    };

    serde_json::from_str(candidate.trim())
        .map_err(|e| CapabilityError::Permanent(format!("model reply was not valid JSON: {e}")))
}

#[async_trait]
impl IntentAnalyzer for DesignClient {
    async fn analyze(
        &self,
        prompt: &str,
        model: ModelKind,
        creativity: f64,
    ) -> Result<Intent, CapabilityError> {
        let text = self
            .generate(model, ANALYZE_INSTRUCTION, prompt, creativity, None)
            .await?;
        let intent: Intent = serde_json::from_value(extract_json(&text)?)
            .map_err(|e| CapabilityError::Permanent(format!("malformed intent: {e}")))?;
        tracing::debug!(summary = %intent.summary, "Intent analysed");
        Ok(intent)
    }
}

#[async_trait]
impl DesignProposer for DesignClient {
    async fn propose(
        &self,
        intent: &Intent,
        model: ModelKind,
        reference: Option<&[u8]>,
    ) -> Result<Vec<DesignProposal>, CapabilityError> {
        let mut user_text = format!("Request summary: {}\n", intent.summary);
        if !intent.key_elements.is_empty() {
            user_text.push_str(&format!("Required elements: {}\n", intent.key_elements.join(", ")));
        }
        if let Some(ref style) = intent.style {
            user_text.push_str(&format!("Style direction: {style}\n"));
        }
        if reference.is_some() {
            user_text.push_str(
                "A reference image (logo or QR code) will be composited onto the final \
                 output; leave visual room for it.\n",
            );
        }

        let text = self
            .generate(model, PROPOSE_INSTRUCTION, &user_text, DEFAULT_TEMPERATURE, reference)
            .await?;
        let list: ProposalList = serde_json::from_value(extract_json(&text)?)
            .map_err(|e| CapabilityError::Permanent(format!("malformed proposals: {e}")))?;
        if list.proposals.is_empty() {
            return Err(CapabilityError::Permanent(
                "model returned no design proposals".into(),
            ));
        }
        tracing::debug!(count = list.proposals.len(), "Design proposals received");
        Ok(list.proposals)
    }
}

#[async_trait]
impl PromptOptimizer for DesignClient {
    async fn optimize(
        &self,
        proposal: &DesignProposal,
        model: ModelKind,
    ) -> Result<RenderPrompt, CapabilityError> {
        let user_text = format!(
            "Title: {}\nDirection: {}\nRationale: {}",
            proposal.title, proposal.direction, proposal.rationale
        );
        let text = self
            .generate(model, OPTIMIZE_INSTRUCTION, &user_text, DEFAULT_TEMPERATURE, None)
            .await?;
        let optimized: OptimizedPrompt = serde_json::from_value(extract_json(&text)?)
            .map_err(|e| CapabilityError::Permanent(format!("malformed prompt: {e}")))?;
        Ok(RenderPrompt {
            text: optimized.prompt,
            rationale: optimized.rationale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn model_table_resolves_both_selectors() {
        assert_eq!(model_name(ModelKind::Pro), "gemini-1.5-pro");
        assert_eq!(model_name(ModelKind::Flash), "gemini-1.5-flash");
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let reply = "Here you go:\n```json\n{\"summary\": \"a cat\"}\n```\nanything else?";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["summary"], "a cat");
    }

    #[test]
    fn extract_json_handles_bare_objects_with_prose() {
        let reply = "Sure! {\"prompt\": \"a cat on a windowsill\", \"rationale\": \"calm\"} done.";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["rationale"], "calm");
    }

    #[test]
    fn extract_json_handles_untagged_fences() {
        let reply = "```\n{\"proposals\": []}\n```";
        let value = extract_json(reply).unwrap();
        assert!(value["proposals"].as_array().unwrap().is_empty());
    }

    #[test]
    fn extract_json_rejects_non_json() {
        assert_matches!(
            extract_json("I cannot help with that."),
            Err(CapabilityError::Permanent(_))
        );
    }
}
