//! Model discovery for a local Ollama server (`GET /api/tags`).

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct LocalModel {
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,
}

impl LocalModel {
    /// `"llava"` matches both `llava` and `llava:latest`.
    pub fn answers_to(&self, wanted: &str) -> bool {
        self.name == wanted || self.name.strip_suffix(":latest") == Some(wanted)
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<LocalModel>,
}

/// List the models available at `base_url`.
///
/// Returns `Err(reason)` when the server is offline or answers with
/// something other than a model list.
pub fn fetch_models(base_url: &str) -> Result<Vec<LocalModel>, String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| format!("HTTP client setup failed: {}", e))?;
    let response = client
        .get(&url)
        .send()
        .map_err(|e| format!("Model server unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Model server returned HTTP {}", response.status()));
    }

    let tags: TagsResponse = response
        .json()
        .map_err(|e| format!("Failed to parse model list: {}", e))?;
    Ok(tags.models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_tag_is_implicit() {
        let m = LocalModel {
            name: "llava:latest".to_string(),
            size: 0,
        };
        assert!(m.answers_to("llava"));
        assert!(m.answers_to("llava:latest"));
        assert!(!m.answers_to("llava:13b"));
    }

    #[test]
    fn tags_response_parses() {
        let raw = r#"{"models": [{"name": "llava:7b", "size": 4109865159, "digest": "abc"}, {"name": "llama3"}]}"#;
        let tags: TagsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(tags.models.len(), 2);
        assert_eq!(tags.models[0].size, 4_109_865_159);
        assert_eq!(tags.models[1].size, 0);
    }
}
