//! Message adapters - convert between different API formats

use crate::domain::types::{ChatMessage, MessageRole};
use serde_json::{Value, json};

/// Adapter for converting messages to different API formats
pub struct MessageAdapter;

impl MessageAdapter {
    /// Convert messages to OpenAI-style format
    ///
    /// Messages with images use the content-array form with `image_url`
    /// data URLs; plain messages keep the string form.
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                if !msg.has_images() {
                    return json!({
                        "role": msg.role.as_str(),
                        "content": msg.content.clone()
                    });
                }
                let mut parts = vec![json!({"type": "text", "text": msg.content.clone()})];
                parts.extend(msg.images.iter().map(|image| {
                    json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:image/png;base64,{image}")}
                    })
                }));
                json!({
                    "role": msg.role.as_str(),
                    "content": parts
                })
            })
            .collect()
    }

    /// Convert messages to Ollama format
    /// Returns: [{"role": "...", "content": "...", "images": [...]}]
    pub fn to_ollama_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut value = json!({
                    "role": msg.role.as_str(),
                    "content": msg.content.clone()
                });
                if msg.has_images() {
                    value["images"] = json!(msg.images);
                }
                value
            })
            .collect()
    }

    /// Convert messages to Gemini format
    /// Returns: (system_instruction_text, contents)
    pub fn to_gemini_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for message in messages {
            let role = match message.role {
                MessageRole::System => {
                    system_parts.push(message.content.clone());
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };

            let mut parts = vec![json!({"text": message.content.clone()})];
            parts.extend(message.images.iter().map(|image| {
                json!({"inline_data": {"mime_type": "image/png", "data": image}})
            }));
            contents.push(json!({"role": role, "parts": parts}));
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system_instruction, contents)
    }
}
