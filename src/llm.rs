//! Language model seam and the Gemini `generateContent` client

use crate::config::ApiKey;
use crate::TravelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument};

pub const GEMINI_PROVIDER: &str = "gemini";

const API_VERSION: &str = "v1beta";

/// A function the model may choose to call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments
    pub parameters: Value,
}

/// A tool invocation chosen by the model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// String argument `key`, if present and non-blank
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// One completion request: a prompt, optional tools, optional output schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub tools: Vec<ToolSpec>,
    pub output_schema: Option<Value>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl GenerateResponse {
    pub fn tool_call(&self, name: &str) -> Option<&ToolCall> {
        self.tool_calls.iter().find(|call| call.name == name)
    }

    /// Parse the text part as structured output.
    ///
    /// Models sometimes wrap JSON in a markdown fence; the fence is stripped.
    pub fn parse_output<T: DeserializeOwned>(&self) -> Result<T, TravelError> {
        let text = self
            .text
            .as_deref()
            .ok_or_else(|| TravelError::InvalidModelOutput("response had no text".to_string()))?;
        serde_json::from_str(strip_code_fence(text))
            .map_err(|e| TravelError::InvalidModelOutput(e.to_string()))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// A completion service able to select tools and honour output schemas
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, TravelError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<ToolCall>,
}

/// Gemini expresses schema types in upper case (`OBJECT`, `STRING`, ...)
pub fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(fields) => {
            let mut converted = Map::new();
            for (key, value) in fields {
                let value = match (key.as_str(), value) {
                    ("type", Value::String(kind)) => Value::String(kind.to_uppercase()),
                    _ => gemini_schema(value),
                };
                converted.insert(key.clone(), value);
            }
            Value::Object(converted)
        }
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}

/// Google Gemini via the REST `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    api_key: ApiKey,
    model: String,
}

impl GeminiClient {
    pub fn new(http_client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: ApiKey::from(api_key),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body(request: &GenerateRequest) -> GenerateContentRequest {
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![FunctionTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|tool| FunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: gemini_schema(&tool.parameters),
                    })
                    .collect(),
            }]
        };

        let generation_config = request.output_schema.as_ref().map(|schema| {
            json!({
                "responseMimeType": "application/json",
                "responseSchema": gemini_schema(schema),
            })
        });

        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart {
                    text: request.prompt.clone(),
                }],
            }],
            tools,
            generation_config,
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    #[instrument(level = "info", skip(self, request), fields(model = %self.model, tools = request.tools.len()))]
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, TravelError> {
        let key = self.api_key.usable().ok_or(TravelError::ProviderUnconfigured {
            provider: GEMINI_PROVIDER,
        })?;
        let url = format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, API_VERSION, self.model
        );

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", key)])
            .json(&Self::build_body(&request))
            .send()
            .await?;
        let status = response.status();
        debug!(status = %status, duration_ms = start_time.elapsed().as_millis(), "Gemini request completed");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Gemini request failed");
            return Err(TravelError::ProviderError {
                provider: GEMINI_PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateContentResponse = serde_json::from_str(&response.text().await?)?;
        let parts = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default();

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(chunk) = part.text {
                text.push_str(&chunk);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(call);
            }
        }

        info!(tool_calls = tool_calls.len(), text_len = text.len(), "Gemini response received");
        Ok(GenerateResponse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(Client::new(), &server.uri(), "g-key", "gemini-2.5-flash")
    }

    #[test]
    fn test_schema_types_are_uppercased() {
        let schema = json!({
            "type": "object",
            "properties": {
                "type": {"type": "string"},
                "hotels": {"type": "array", "items": {"type": "object"}}
            }
        });
        let converted = gemini_schema(&schema);
        assert_eq!(converted["type"], "OBJECT");
        assert_eq!(converted["properties"]["type"]["type"], "STRING");
        assert_eq!(converted["properties"]["hotels"]["items"]["type"], "OBJECT");
    }

    #[test]
    fn test_parse_output_strips_fence() {
        let response = GenerateResponse {
            text: Some("```json\n{\"reasoning\": \"ok\"}\n```".to_string()),
            tool_calls: Vec::new(),
        };
        let value: Value = response.parse_output().unwrap();
        assert_eq!(value["reasoning"], "ok");

        let missing = GenerateResponse::default();
        assert!(matches!(
            missing.parse_output::<Value>(),
            Err(TravelError::InvalidModelOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_returns_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(json!({
                "tools": [{"functionDeclarations": [{"name": "hotelRecommendationTool"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [
                        {"functionCall": {"name": "hotelRecommendationTool", "args": {"location": "Bangkok"}}}
                    ]}
                }]
            })))
            .mount(&server)
            .await;

        let request = GenerateRequest::new("find hotels").with_tool(ToolSpec {
            name: "hotelRecommendationTool".to_string(),
            description: "Finds hotels".to_string(),
            parameters: json!({"type": "object", "properties": {"location": {"type": "string"}}}),
        });
        let response = client_for(&server).generate(request).await.unwrap();
        let call = response.tool_call("hotelRecommendationTool").unwrap();
        assert_eq!(call.str_arg("location"), Some("Bangkok"));
        assert!(response.text.is_none());
    }

    #[tokio::test]
    async fn test_generate_requests_json_when_schema_given() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
            })))
            .mount(&server)
            .await;

        let request = GenerateRequest::new("structured").with_output_schema(json!({"type": "object"}));
        let response = client_for(&server).generate(request).await.unwrap();
        let value: Value = response.parse_output().unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn test_generate_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let result = client_for(&server).generate(GenerateRequest::new("hi")).await;
        match result {
            Err(TravelError::ProviderError { provider, status, .. }) => {
                assert_eq!(provider, GEMINI_PROVIDER);
                assert_eq!(status, 429);
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }
}
