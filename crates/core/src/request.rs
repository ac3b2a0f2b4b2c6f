use serde_json::{Value, json};

use crate::{
    assets::{Asset, AssetKind, MAX_IMAGES},
    config::GeneratorConfig,
    error::{Result, StoryforgeError},
    types::{GenerationRequest, ScenarioMode},
};

pub const DEFAULT_STYLE_LABEL: &str = "General";
pub const VIDEO_MARKER: &str = "[USER UPLOADED A VIDEO]";
pub const SCRIPT_COUNT: usize = 3;

static DIRECTOR_PROMPT: &str = r#"
You are an AI Director. Your job is to create storyboards for short vertical videos.

STRICT RULES:
1. Total clip length is 15-30 seconds.
2. Arrange the user's assets (images/video) in an order that tells the story.
3. When a scene has no user image, write a detailed English prompt (visual_prompt_en) for generating one.

OUTPUT: a JSON array of exactly 3 storyboard concepts, each with:
- concept_name: clip title (40-60 characters)
- insight, hook, hashtags
- scenes[]: {asset_type, asset_index, visual_prompt_th, visual_prompt_en, voiceover}

asset_type is "user_asset" when the scene uses one of the user's images, with asset_index
set to that image's 1-based position in the order supplied. Otherwise asset_type is
"generated" and asset_index is omitted.
"#;

/// Classify the inputs and assemble a request. Nothing is sent when there is
/// neither a topic nor any asset.
pub fn build_request(topic: &str, style_label: &str, assets: Vec<Asset>) -> Result<GenerationRequest> {
    let topic = topic.trim();
    let image_count = assets.iter().filter(|a| a.kind == AssetKind::Image).count();
    let video_count = assets.iter().filter(|a| a.kind == AssetKind::Video).count();

    if topic.is_empty() && assets.is_empty() {
        return Err(StoryforgeError::validation(
            "enter a topic, attach images, or attach a video",
        ));
    }
    if image_count > MAX_IMAGES {
        return Err(StoryforgeError::validation(format!(
            "at most {MAX_IMAGES} images can be attached, got {image_count}"
        )));
    }

    let scenario_mode = ScenarioMode::classify(image_count > 0, video_count > 0);
    tracing::debug!(
        scenario = scenario_mode.as_str(),
        images = image_count,
        video = video_count > 0,
        "Request built"
    );

    Ok(GenerationRequest {
        topic: topic.to_string(),
        style_label: style_label.trim().to_string(),
        assets,
        scenario_mode,
    })
}

impl GenerationRequest {
    pub fn style_or_default(&self) -> &str {
        if self.style_label.is_empty() {
            DEFAULT_STYLE_LABEL
        } else {
            &self.style_label
        }
    }

    pub fn has_video(&self) -> bool {
        self.assets.iter().any(|a| a.kind == AssetKind::Video)
    }

    pub fn instruction_text(&self) -> String {
        format!(
            "Mode: {}\nTopic: \"{}\"\nStyle: \"{}\"",
            self.scenario_mode.as_str(),
            self.topic,
            self.style_or_default()
        )
    }

    /// Content parts in wire order: instruction, images as selected, then
    /// the video marker. Video bytes are never sent.
    pub fn content_parts(&self) -> Vec<Value> {
        let mut parts = vec![json!({ "text": self.instruction_text() })];
        parts.extend(
            self.assets
                .iter()
                .filter(|a| a.kind == AssetKind::Image)
                .map(|image| {
                    json!({
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": image.data,
                        }
                    })
                }),
        );
        if self.has_video() {
            parts.push(json!({ "text": VIDEO_MARKER }));
        }
        parts
    }

    pub fn to_payload(&self, config: &GeneratorConfig) -> Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": self.content_parts(),
                }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
                "maxOutputTokens": config.max_output_tokens,
                "temperature": config.temperature,
            },
            "systemInstruction": {
                "parts": [{ "text": DIRECTOR_PROMPT.trim() }],
            },
        })
    }
}

/// Output shape declared to the backend: exactly three scripts.
pub fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "minItems": SCRIPT_COUNT,
        "maxItems": SCRIPT_COUNT,
        "items": {
            "type": "OBJECT",
            "properties": {
                "concept_name": { "type": "STRING" },
                "insight": { "type": "STRING" },
                "hook": { "type": "STRING" },
                "hashtags": { "type": "ARRAY", "items": { "type": "STRING" } },
                "scenes": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "asset_type": { "type": "STRING", "enum": ["user_asset", "generated"] },
                            "asset_index": { "type": "NUMBER" },
                            "visual_prompt_th": { "type": "STRING" },
                            "visual_prompt_en": { "type": "STRING" },
                            "voiceover": { "type": "STRING" }
                        },
                        "required": ["asset_type", "voiceover", "visual_prompt_en"]
                    }
                }
            },
            "required": ["concept_name", "insight", "hook", "hashtags", "scenes"]
        }
    })
}
