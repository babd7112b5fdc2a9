use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use atlas_core::config::AppConfig;
use atlas_core::error::{AtlasError, Result};
use atlas_core::ingest::EntityExtractor;
use atlas_core::knowledge::{
    EdgeType, ExtractedItem, ExtractedKnowledge, ExtractedRelation, NodeType,
};

const MAX_TOKENS: u32 = 2048;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Entity and relation extraction through an Anthropic-compatible messages
/// endpoint (the LLM gateway).
pub struct LlmEntityExtractor {
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
    model: String,
}

// ── Messages API request/response types ────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: &'static str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

// ── Model output schema ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LlmOutput {
    #[serde(default)]
    entities: Vec<LlmEntity>,
    #[serde(default)]
    relations: Vec<LlmRelation>,
}

#[derive(Debug, Deserialize)]
struct LlmEntity {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct LlmRelation {
    source: String,
    target: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

const SYSTEM_PROMPT: &str = r#"You extract business knowledge from documents for a company knowledge graph.

Given a passage, list the notable entities, concepts and facts it mentions and the relations between them.

Return ONLY valid JSON (no markdown fences, no commentary) matching this schema:

{
  "entities": [
    {
      "name": "Canonical Name",
      "type": "entity | concept | fact",
      "description": "one sentence grounded in the passage",
      "aliases": ["optional alternate names"],
      "confidence": 0.0 to 1.0
    }
  ],
  "relations": [
    {
      "source": "Source Name",
      "target": "Target Name",
      "type": "relates_to | part_of | contains | references | derived_from | similar_to",
      "confidence": 0.0 to 1.0
    }
  ]
}

Rules:
- "entity" is a concrete thing: a company, person, product, place or account.
- "concept" is an abstract idea or category; "fact" is a single stated claim.
- Names in relations MUST match a name or alias from the entities list.
- If nothing can be extracted, return {"entities": [], "relations": []}."#;

impl LlmEntityExtractor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url: config.llm_gateway_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
        }
    }

    fn build_user_prompt(text: &str, context: &str) -> String {
        let mut prompt = String::new();
        if !context.is_empty() {
            prompt.push_str(&format!("Document: {context}\n\n"));
        }
        prompt.push_str("Passage:\n");
        prompt.push_str(text);
        prompt
    }

    async fn call_gateway(&self, text: &str, context: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: Self::build_user_prompt(text, context),
            }],
        };

        tracing::debug!(
            model = %self.model,
            context = %context,
            content_len = text.len(),
            "Sending extraction request to LLM gateway"
        );

        let response = self
            .client
            .post(&self.gateway_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AtlasError::Extraction(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(AtlasError::Extraction(format!(
                "LLM gateway returned status {status}: {body}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::Extraction(format!("Failed to parse gateway response: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| AtlasError::Extraction("No text content block in response".into()))?;

        tracing::debug!(
            stop_reason = ?parsed.stop_reason,
            response_len = text.len(),
            "Received extraction response"
        );

        Ok(text)
    }

    fn parse_node_type(s: &str) -> NodeType {
        match s.trim().to_lowercase().as_str() {
            "concept" | "idea" | "topic" | "category" => NodeType::Concept,
            "fact" | "claim" | "statement" => NodeType::Fact,
            "entity" | "organization" | "company" | "person" | "product" | "location" => {
                NodeType::Entity
            }
            other => {
                tracing::warn!(item_type = %other, "Unknown item type, defaulting to entity");
                NodeType::Entity
            }
        }
    }

    fn parse_edge_type(s: &str) -> EdgeType {
        match s.trim().to_lowercase().as_str() {
            "part_of" | "member_of" | "subsidiary_of" => EdgeType::PartOf,
            "contains" | "includes" | "owns" => EdgeType::Contains,
            "references" | "cites" => EdgeType::References,
            "derived_from" | "based_on" => EdgeType::DerivedFrom,
            "similar_to" | "same_as" => EdgeType::SimilarTo,
            "relates_to" | "related_to" | "associated_with" => EdgeType::RelatesTo,
            other => {
                tracing::warn!(relation_type = %other, "Unknown relation type, defaulting to relates_to");
                EdgeType::RelatesTo
            }
        }
    }

    fn parse_llm_response(raw: &str) -> Result<ExtractedKnowledge> {
        // Models sometimes wrap the JSON in code fences despite instructions.
        let cleaned = raw.trim();
        let cleaned = if cleaned.starts_with("```") {
            match (cleaned.find('{'), cleaned.rfind('}')) {
                (Some(start), Some(end)) if start < end => &cleaned[start..=end],
                _ => {
                    return Err(AtlasError::Extraction(
                        "LLM reply contains no JSON object".into(),
                    ))
                }
            }
        } else {
            cleaned
        };

        let output: LlmOutput = serde_json::from_str(cleaned).map_err(|e| {
            tracing::error!(raw = %cleaned, error = %e, "Failed to parse LLM extraction JSON");
            AtlasError::Extraction(format!("Failed to parse LLM JSON output: {e}"))
        })?;

        let mut items = Vec::with_capacity(output.entities.len());
        // lowercased name or alias -> canonical name
        let mut canonical: HashMap<String, String> = HashMap::new();

        for entity in output.entities {
            let name = entity.name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            canonical.insert(name.to_lowercase(), name.clone());
            for alias in &entity.aliases {
                canonical
                    .entry(alias.trim().to_lowercase())
                    .or_insert_with(|| name.clone());
            }
            items.push(ExtractedItem {
                node_type: Self::parse_node_type(&entity.kind),
                name,
                description: entity.description,
                confidence: entity.confidence.clamp(0.0, 1.0),
            });
        }

        let mut relations = Vec::with_capacity(output.relations.len());
        for relation in output.relations {
            let source = canonical.get(&relation.source.trim().to_lowercase());
            let target = canonical.get(&relation.target.trim().to_lowercase());
            match (source, target) {
                (Some(source), Some(target)) => relations.push(ExtractedRelation {
                    source: source.clone(),
                    target: target.clone(),
                    edge_type: Self::parse_edge_type(&relation.kind),
                    confidence: relation.confidence.clamp(0.0, 1.0),
                }),
                _ => {
                    tracing::warn!(
                        source_name = %relation.source,
                        target_name = %relation.target,
                        source_found = source.is_some(),
                        target_found = target.is_some(),
                        "Skipping relation: referenced item not found"
                    );
                }
            }
        }

        Ok(ExtractedKnowledge { items, relations })
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, text: &str, context: &str) -> Result<ExtractedKnowledge> {
        let raw = self.call_gateway(text, context).await?;
        let extracted = Self::parse_llm_response(&raw)?;
        tracing::info!(
            context = %context,
            items = extracted.items.len(),
            relations = extracted.relations.len(),
            "Extraction complete"
        );
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_types_map_to_node_types() {
        assert_eq!(LlmEntityExtractor::parse_node_type("Concept"), NodeType::Concept);
        assert_eq!(LlmEntityExtractor::parse_node_type("company"), NodeType::Entity);
        assert_eq!(LlmEntityExtractor::parse_node_type("FACT"), NodeType::Fact);
        assert_eq!(LlmEntityExtractor::parse_node_type("gibberish"), NodeType::Entity);
    }

    #[test]
    fn relation_types_map_to_edge_types() {
        assert_eq!(LlmEntityExtractor::parse_edge_type("subsidiary_of"), EdgeType::PartOf);
        assert_eq!(LlmEntityExtractor::parse_edge_type("related_to"), EdgeType::RelatesTo);
        assert_eq!(LlmEntityExtractor::parse_edge_type("whatever"), EdgeType::RelatesTo);
    }

    #[test]
    fn parses_items_and_relations() {
        let json = r#"{
            "entities": [
                {"name": "Acme Corp", "type": "entity", "description": "A supplier", "aliases": ["ACME"], "confidence": 0.95},
                {"name": "Net-30 terms", "type": "concept", "description": "Payment terms", "confidence": 0.8}
            ],
            "relations": [
                {"source": "acme", "target": "Net-30 terms", "type": "relates_to", "confidence": 0.7}
            ]
        }"#;

        let extracted = LlmEntityExtractor::parse_llm_response(json).unwrap();
        assert_eq!(extracted.items.len(), 2);
        assert_eq!(extracted.items[0].node_type, NodeType::Entity);
        assert_eq!(extracted.items[1].node_type, NodeType::Concept);
        assert_eq!(extracted.relations.len(), 1);
        assert_eq!(extracted.relations[0].source, "Acme Corp");
        assert_eq!(extracted.relations[0].target, "Net-30 terms");
    }

    #[test]
    fn strips_code_fences() {
        let json = "```json\n{\"entities\": [{\"name\": \"Ledger\", \"type\": \"concept\"}], \"relations\": []}\n```";
        let extracted = LlmEntityExtractor::parse_llm_response(json).unwrap();
        assert_eq!(extracted.items.len(), 1);
        assert_eq!(extracted.items[0].name, "Ledger");
        assert_eq!(extracted.items[0].confidence, 1.0);
    }

    #[test]
    fn skips_relations_with_unknown_endpoints() {
        let json = r#"{
            "entities": [{"name": "Alpha", "type": "entity"}],
            "relations": [{"source": "Alpha", "target": "Nowhere", "type": "relates_to"}]
        }"#;
        let extracted = LlmEntityExtractor::parse_llm_response(json).unwrap();
        assert_eq!(extracted.items.len(), 1);
        assert!(extracted.relations.is_empty());
    }

    #[test]
    fn blank_names_are_dropped() {
        let json = r#"{"entities": [{"name": "  ", "type": "entity"}], "relations": []}"#;
        let extracted = LlmEntityExtractor::parse_llm_response(json).unwrap();
        assert!(extracted.items.is_empty());
    }

    #[test]
    fn invalid_json_is_an_extraction_error() {
        let err = LlmEntityExtractor::parse_llm_response("not json").unwrap_err();
        assert!(matches!(err, AtlasError::Extraction(_)));
    }

    #[test]
    fn fenced_reply_with_inverted_braces_is_an_extraction_error() {
        let err = LlmEntityExtractor::parse_llm_response("```json\n} sorry, here is the data {")
            .unwrap_err();
        assert!(matches!(err, AtlasError::Extraction(_)));

        let err = LlmEntityExtractor::parse_llm_response("```\nno json at all\n```").unwrap_err();
        assert!(matches!(err, AtlasError::Extraction(_)));
    }
}
