use serde::{Deserialize, Deserializer, Serialize};

use crate::assets::Asset;

/// Which asset kinds a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioMode {
    TextOnly,
    ImagesOnly,
    VideoOnly,
    MixedMedia,
}

impl ScenarioMode {
    pub fn classify(has_images: bool, has_video: bool) -> Self {
        match (has_images, has_video) {
            (true, true) => ScenarioMode::MixedMedia,
            (true, false) => ScenarioMode::ImagesOnly,
            (false, true) => ScenarioMode::VideoOnly,
            (false, false) => ScenarioMode::TextOnly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioMode::TextOnly => "TEXT_ONLY",
            ScenarioMode::ImagesOnly => "IMAGES_ONLY",
            ScenarioMode::VideoOnly => "VIDEO_ONLY",
            ScenarioMode::MixedMedia => "MIXED_MEDIA",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub style_label: String,
    pub assets: Vec<Asset>,
    pub scenario_mode: ScenarioMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    #[serde(alias = "user_image")]
    UserAsset,
    #[serde(other)]
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(alias = "assetType")]
    pub asset_type: AssetType,

    /// 1-based position in the request's asset list.
    #[serde(
        default,
        alias = "assetIndex",
        deserialize_with = "lenient_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset_index: Option<u32>,

    #[serde(default, alias = "visualPromptTh")]
    pub visual_prompt_th: String,

    #[serde(alias = "visualPromptEn")]
    pub visual_prompt_en: String,

    pub voiceover: String,
}

impl Scene {
    /// Looks up the user asset this scene points at. Anything that does not
    /// resolve is treated as "no asset".
    pub fn resolve_asset<'a>(&self, assets: &'a [Asset]) -> Option<&'a Asset> {
        if self.asset_type != AssetType::UserAsset {
            return None;
        }
        let index = self.asset_index? as usize;
        index.checked_sub(1).and_then(|i| assets.get(i))
    }

    /// Thai prompt when the model wrote one, English otherwise.
    pub fn visual_description(&self) -> &str {
        if self.visual_prompt_th.trim().is_empty() {
            &self.visual_prompt_en
        } else {
            &self.visual_prompt_th
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(alias = "conceptName")]
    pub concept_name: String,
    pub insight: String,
    pub hook: String,
    pub hashtags: Vec<String>,
    pub scenes: Vec<Scene>,
}

// The schema declares asset_index as a number, so models send `2`, `2.0`,
// `"2"` or null interchangeably.
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
    .and_then(|n| u32::try_from(n).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Asset, AssetKind};

    fn image(name: &str) -> Asset {
        Asset {
            kind: AssetKind::Image,
            name: name.to_string(),
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        }
    }

    #[test]
    fn scenario_mode_depends_only_on_asset_kinds() {
        assert_eq!(ScenarioMode::classify(false, false), ScenarioMode::TextOnly);
        assert_eq!(ScenarioMode::classify(true, false), ScenarioMode::ImagesOnly);
        assert_eq!(ScenarioMode::classify(false, true), ScenarioMode::VideoOnly);
        assert_eq!(ScenarioMode::classify(true, true), ScenarioMode::MixedMedia);
    }

    #[test]
    fn scene_accepts_legacy_and_camel_case_names() {
        let scene: Scene = serde_json::from_value(serde_json::json!({
            "assetType": "user_image",
            "assetIndex": 2.0,
            "visualPromptEn": "close-up of latte art",
            "voiceover": "Look at this"
        }))
        .unwrap();

        assert_eq!(scene.asset_type, AssetType::UserAsset);
        assert_eq!(scene.asset_index, Some(2));
        assert_eq!(scene.visual_prompt_th, "");
    }

    #[test]
    fn unknown_asset_type_means_generated() {
        let scene: Scene = serde_json::from_value(serde_json::json!({
            "asset_type": "stock_footage",
            "visual_prompt_en": "city at dawn",
            "voiceover": "..."
        }))
        .unwrap();

        assert_eq!(scene.asset_type, AssetType::Generated);
        assert_eq!(scene.asset_index, None);
    }

    #[test]
    fn scene_without_english_prompt_is_rejected() {
        let result: Result<Scene, _> = serde_json::from_value(serde_json::json!({
            "asset_type": "generated",
            "voiceover": "..."
        }));
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_asset_index_resolves_to_nothing() {
        let assets = vec![image("a.png"), image("b.png")];
        let mut scene = Scene {
            asset_type: AssetType::UserAsset,
            asset_index: Some(2),
            visual_prompt_th: String::new(),
            visual_prompt_en: "x".into(),
            voiceover: "y".into(),
        };
        assert_eq!(scene.resolve_asset(&assets).map(|a| a.name.as_str()), Some("b.png"));

        scene.asset_index = Some(3);
        assert!(scene.resolve_asset(&assets).is_none());

        scene.asset_index = Some(0);
        assert!(scene.resolve_asset(&assets).is_none());

        scene.asset_index = Some(1);
        scene.asset_type = AssetType::Generated;
        assert!(scene.resolve_asset(&assets).is_none());
    }
}
