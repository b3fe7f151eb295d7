//! Per-provider profiles: endpoint chains, marker vocabularies, wire shapes.

use serde_json::{json, Value};

use super::{ChatMessage, Marker, ProviderProfile, Role, TokenUsage};

/// Markers every OpenAI-compatible provider shares.
const OPENAI_STYLE_MARKERS: &[Marker] = &[
    Marker::permanent("invalid_api_key"),
    Marker::permanent("incorrect api key"),
    Marker::permanent("account_deactivated"),
];

const QWEN_MARKERS: &[Marker] = &[
    Marker::permanent("invalid_api_key"),
    Marker::permanent("incorrect api key"),
    Marker::permanent("invalid access token"),
];

const GEMINI_MARKERS: &[Marker] = &[
    Marker::permanent("invalid_api_key"),
    Marker::permanent("incorrect api key"),
    Marker::permanent("api key not valid"),
    Marker::temporary("model is overloaded"),
];

/// Look up the profile for a provider identifier.
pub fn profile_for(provider: &str) -> Option<&'static dyn ProviderProfile> {
    match provider {
        "qwen" => Some(&QwenProfile),
        "openai" => Some(&OpenAiProfile),
        "grok" => Some(&GrokProfile),
        "gemini" => Some(&GeminiProfile),
        "openrouter" => Some(&OpenRouterProfile),
        _ => None,
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Standard OpenAI-style message array, system prompt first when present.
fn openai_style_messages(system_prompt: Option<&str>, messages: &[ChatMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if let Some(prompt) = system_prompt {
        out.push(json!({ "role": "system", "content": prompt }));
    }
    for message in messages {
        out.push(json!({ "role": role_str(message.role), "content": message.content }));
    }
    out
}

fn openai_style_body(model: &str, system_prompt: Option<&str>, messages: &[ChatMessage]) -> Value {
    json!({
        "model": model,
        "messages": openai_style_messages(system_prompt, messages),
    })
}

fn openai_style_content(payload: &Value) -> Option<String> {
    let content = payload
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Alibaba DashScope. Uses the native text-generation wire format; the
/// international endpoint serves the same API.
pub struct QwenProfile;

impl ProviderProfile for QwenProfile {
    fn name(&self) -> &'static str {
        "qwen"
    }

    fn fallback_endpoints(&self) -> &'static [&'static str] {
        &[
            "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation",
            "https://dashscope-intl.aliyuncs.com/api/v1/services/aigc/text-generation/generation",
        ]
    }

    fn markers(&self) -> &'static [Marker] {
        QWEN_MARKERS
    }

    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        vec![("X-DashScope-SSE", "disable".to_string())]
    }

    fn request_body(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Value {
        json!({
            "model": model,
            "input": {
                "messages": openai_style_messages(system_prompt, messages),
            },
            "parameters": {
                "incremental_output": false,
                "result_format": "message",
            },
        })
    }

    fn extract_content(&self, payload: &Value) -> Option<String> {
        let content = payload
            .get("output")?
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }

    fn extract_usage(&self, payload: &Value) -> Option<TokenUsage> {
        let usage = payload.get("usage")?;
        Some(TokenUsage::new(
            usage.get("input_tokens")?.as_u64()?,
            usage.get("output_tokens")?.as_u64()?,
        ))
    }
}

pub struct OpenAiProfile;

impl ProviderProfile for OpenAiProfile {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn fallback_endpoints(&self) -> &'static [&'static str] {
        &["https://api.openai.com/v1/chat/completions"]
    }

    fn markers(&self) -> &'static [Marker] {
        OPENAI_STYLE_MARKERS
    }

    fn request_body(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Value {
        openai_style_body(model, system_prompt, messages)
    }

    fn extract_content(&self, payload: &Value) -> Option<String> {
        openai_style_content(payload)
    }
}

/// xAI. The legacy grok.com endpoint is kept as a fallback for older
/// deployments still routed through it.
pub struct GrokProfile;

impl ProviderProfile for GrokProfile {
    fn name(&self) -> &'static str {
        "grok"
    }

    fn fallback_endpoints(&self) -> &'static [&'static str] {
        &[
            "https://api.x.ai/v1/chat/completions",
            "https://api.grok.com/v1/chat/completions",
        ]
    }

    fn markers(&self) -> &'static [Marker] {
        OPENAI_STYLE_MARKERS
    }

    fn request_body(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Value {
        openai_style_body(model, system_prompt, messages)
    }

    fn extract_content(&self, payload: &Value) -> Option<String> {
        openai_style_content(payload)
    }
}

/// Google Gemini through its OpenAI-compatible surface, so authorization
/// stays in a bearer header instead of the URL.
pub struct GeminiProfile;

impl ProviderProfile for GeminiProfile {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn fallback_endpoints(&self) -> &'static [&'static str] {
        &["https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"]
    }

    fn markers(&self) -> &'static [Marker] {
        GEMINI_MARKERS
    }

    fn request_body(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Value {
        openai_style_body(model, system_prompt, messages)
    }

    fn extract_content(&self, payload: &Value) -> Option<String> {
        openai_style_content(payload)
    }
}

pub struct OpenRouterProfile;

impl ProviderProfile for OpenRouterProfile {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    fn fallback_endpoints(&self) -> &'static [&'static str] {
        &["https://openrouter.ai/api/v1/chat/completions"]
    }

    fn markers(&self) -> &'static [Marker] {
        OPENAI_STYLE_MARKERS
    }

    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("HTTP-Referer", "https://github.com/keyrotor".to_string()),
            ("X-Title", "keyrotor".to_string()),
        ]
    }

    fn request_body(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Value {
        openai_style_body(model, system_prompt, messages)
    }

    fn extract_content(&self, payload: &Value) -> Option<String> {
        openai_style_content(payload)
    }
}
