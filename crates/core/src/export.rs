use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tokio::fs;

use crate::{
    error::{Result, StoryforgeError},
    types::Script,
};

const SAFE_NAME_LEN: usize = 30;

/// Format hashtags as `#a #b`, without doubling an existing `#`
pub fn format_hashtags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.starts_with('#') {
                t.to_string()
            } else {
                format!("#{}", t)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Plain-text export: title, hashtags, hook, insight, then one block per scene.
pub fn format_script_export(script: &Script) -> String {
    let mut output = String::new();
    output.push_str(&format!("TITLE: {}\n", script.concept_name));
    output.push_str(&format!("HASHTAGS: {}\n", format_hashtags(&script.hashtags)));
    output.push_str(&format!("HOOK: {}\n", script.hook));
    output.push_str(&format!("INSIGHT: {}\n", script.insight));
    output.push_str(&"=".repeat(50));
    output.push_str("\n\n");

    for (i, scene) in script.scenes.iter().enumerate() {
        output.push_str(&format!("[SCENE {}] (~3-5s)\n", i + 1));
        output.push_str(&format!("VISUAL: {}\n", scene.visual_description()));
        output.push_str(&format!("VOICEOVER: \"{}\"\n", scene.voiceover));
        output.push_str(&"-".repeat(50));
        output.push('\n');
    }

    output
}

/// `YYYY-MM-DD_HH-MM_<concept>.txt`
pub fn export_file_name<Tz: TimeZone>(script: &Script, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let safe: String = script
        .concept_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' || ('\u{0E01}'..='\u{0E59}').contains(&c) {
                c
            } else {
                '_'
            }
        })
        .take(SAFE_NAME_LEN)
        .collect();
    format!("{}_{}.txt", at.format("%Y-%m-%d_%H-%M"), safe)
}

/// Write the export into `dir` and return the file path
pub async fn save_export<Tz: TimeZone>(script: &Script, dir: &Path, at: &DateTime<Tz>) -> Result<PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    fs::create_dir_all(dir)
        .await
        .map_err(|e| StoryforgeError::io(dir, e))?;
    let path = dir.join(export_file_name(script, at));
    fs::write(&path, format_script_export(script))
        .await
        .map_err(|e| StoryforgeError::io(&path, e))?;
    Ok(path)
}
