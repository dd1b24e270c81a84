//! Channel persona store and prompt rendering
//!
//! Channel prompts are produced by the (external) channel-analysis step as
//! one TOML file per channel under the prompts directory. Missing files
//! fall back to a generic persona. Loaded prompts are read-only for the
//! lifetime of the process.

use crate::types::{AnswerStyle, ChannelPrompt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Loads and memoizes per-channel personas
pub struct ChannelPromptStore {
    prompts_dir: Option<PathBuf>,
    loaded: Mutex<HashMap<String, ChannelPrompt>>,
}

impl ChannelPromptStore {
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        Self {
            prompts_dir,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the persona for a channel, falling back to the generic one
    pub fn get(&self, channel_name: &str) -> ChannelPrompt {
        if let Ok(loaded) = self.loaded.lock() {
            if let Some(prompt) = loaded.get(channel_name) {
                return prompt.clone();
            }
        }

        let prompt = self
            .load_from_disk(channel_name)
            .unwrap_or_else(|| ChannelPrompt::generic(channel_name))
            .truncated();

        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.insert(channel_name.to_string(), prompt.clone());
        }
        prompt
    }

    fn load_from_disk(&self, channel_name: &str) -> Option<ChannelPrompt> {
        let dir = self.prompts_dir.as_ref()?;
        let slug: String = channel_name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let path = dir.join(format!("{}.toml", slug));

        let contents = std::fs::read_to_string(&path).ok()?;
        match toml::from_str::<ChannelPrompt>(&contents) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                debug!("unparseable channel prompt {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// System message for answer generation: persona + tone
pub fn render_system_message(prompt: &ChannelPrompt) -> String {
    format!(
        "{} Persona: {}. Answer in a {} style, grounded in the channel's transcripts.",
        prompt.system_prompt, prompt.persona, prompt.tone
    )
}

/// JSON-schema instruction appended to every answer prompt
///
/// The model must reply with a single JSON object; anything else is
/// treated as a parse failure downstream.
pub fn render_schema_instruction(style: AnswerStyle) -> String {
    let style_guidance = match style {
        AnswerStyle::BulletPoints => {
            "Format the answer field as at most 5 markdown bullets, each ending with the \
             supporting [video_id]."
        }
        AnswerStyle::Structured => {
            "Format the answer field as short markdown sections with headers, citing \
             [video_id] per section."
        }
        AnswerStyle::Conversational => {
            "Format the answer field as flowing prose, citing [video_id] inline."
        }
    };

    format!(
        "Respond with a single JSON object and nothing else. Required fields:\n\
         {{\n\
           \"answer\": \"string, the answer text\",\n\
           \"key_points\": [\"string\"],\n\
           \"sources\": [\"video_id\"],\n\
           \"confidence\": 0.0,\n\
           \"summary\": \"one-line summary\"\n\
         }}\n\
         {}\n\
         Do not wrap the JSON in commentary.",
        style_guidance
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_missing_dir_falls_back_to_generic() {
        let store = ChannelPromptStore::new(None);
        let prompt = store.get("demo");
        assert!(prompt.persona.contains("demo"));
    }

    #[test]
    fn test_loads_channel_toml() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("tokyo_re.toml")).unwrap();
        writeln!(
            file,
            "channel_name = \"Tokyo RE\"\npersona = \"veteran Tokyo investor\"\n\
             tone = \"direct\"\nsystem_prompt = \"You advise on Tokyo property.\"\n\
             expertise_keywords = [\"yield\", \"ward\"]"
        )
        .unwrap();

        let store = ChannelPromptStore::new(Some(dir.path().to_path_buf()));
        let prompt = store.get("Tokyo RE");
        assert_eq!(prompt.persona, "veteran Tokyo investor");
        assert_eq!(prompt.expertise_keywords, vec!["yield", "ward"]);
    }

    #[test]
    fn test_unparseable_toml_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("demo.toml"), "not valid toml [[[").unwrap();

        let store = ChannelPromptStore::new(Some(dir.path().to_path_buf()));
        let prompt = store.get("demo");
        assert!(prompt.persona.contains("demo"));
    }

    #[test]
    fn test_memoized_after_first_load() {
        let dir = TempDir::new().unwrap();
        let store = ChannelPromptStore::new(Some(dir.path().to_path_buf()));
        let first = store.get("demo");
        // deleting the dir does not matter, the prompt is cached
        drop(dir);
        let second = store.get("demo");
        assert_eq!(first.persona, second.persona);
    }

    #[test]
    fn test_schema_instruction_mentions_fields() {
        for style in [
            AnswerStyle::BulletPoints,
            AnswerStyle::Structured,
            AnswerStyle::Conversational,
        ] {
            let instruction = render_schema_instruction(style);
            for field in ["answer", "key_points", "sources", "confidence", "summary"] {
                assert!(instruction.contains(field));
            }
        }
    }

    #[test]
    fn test_system_message_includes_persona() {
        let prompt = ChannelPrompt::generic("demo");
        let message = render_system_message(&prompt);
        assert!(message.contains(&prompt.persona));
    }
}
