//! Remote generation-model boundary.
//!
//! The engine uses the generation model for two things: narrating an
//! analysis and estimating a salary band when no comparable data exists.
//! Responses are expected to carry a JSON object somewhere in the returned
//! text, usually wrapped in Markdown fences; [`extract_json_object`] digs
//! it out. Failures at this boundary always degrade to fixed fallback
//! values — a broken model response must never fail a search or an
//! ingestion.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised at the generation boundary.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("Generation call failed: {0}")]
    CallFailed(String),

    #[error("No JSON object found in model response")]
    MissingJson,

    #[error("Model response JSON is malformed: {0}")]
    Malformed(String),
}

/// A remote text-generation model. Synchronous; the implementation owns
/// its own timeout, and a timeout surfaces as [`GenerationError::CallFailed`].
pub trait GenerativeModel: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// A model that is not configured. Every call fails with `Unavailable`,
/// which pushes callers onto their deterministic fallbacks.
pub struct DisabledModel;

impl GenerativeModel for DisabledModel {
    fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable(
            "no generation backend configured".to_string(),
        ))
    }
}

/// Strips surrounding Markdown code fences from a model response.
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the fence line itself ("```json" or bare "```").
        text = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Extracts the first balanced `{...}` object from model output.
///
/// Tolerates fence markup, prose before and after the object, and braces
/// inside string literals.
pub fn extract_json_object(raw: &str) -> Result<serde_json::Value, GenerationError> {
    let text = strip_fences(raw);
    let start = text.find('{').ok_or(GenerationError::MissingJson)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let object = &text[start..start + offset + c.len_utf8()];
                    return serde_json::from_str(object)
                        .map_err(|e| GenerationError::Malformed(e.to_string()));
                }
            }
            _ => {}
        }
    }
    Err(GenerationError::MissingJson)
}

/// Extracts and deserializes the model's JSON object into a typed response.
pub fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<T, GenerationError> {
    let value = extract_json_object(raw)?;
    serde_json::from_value(value).map_err(|e| GenerationError::Malformed(e.to_string()))
}

/// Prompt asking for a salary band when no comparable data exists.
#[must_use]
pub fn estimate_prompt(job_title: &str, location: &str, experience_years: f32) -> String {
    format!(
        "You are an HR compensation expert. For this profile:\n\n\
         Position: {job_title}\n\
         Location: {location}\n\
         Experience: {experience_years} years\n\n\
         Estimate a realistic monthly salary range in MAD for this market.\n\
         Respond with ONLY this JSON object:\n\
         {{\"estimated_min\": X, \"estimated_max\": Y}}"
    )
}

/// Prompt asking for a grounded answer over retrieved document chunks.
#[must_use]
pub fn document_answer_prompt(question: &str, contexts: &[String]) -> String {
    let joined = contexts.join("\n\n--- CONTEXT ---\n\n");
    format!(
        "You are a document analysis assistant. Ground your answer in the\n\
         reference context first, then the question.\n\n\
         === REFERENCE CONTEXT ===\n{joined}\n\n\
         === QUESTION ===\n{question}\n\n\
         Respond with ONLY a valid JSON object:\n\
         {{\n\
           \"answer\": \"...\",\n\
           \"key_points\": [\"...\"],\n\
           \"recommendations\": [\"...\"]\n\
         }}\n\
         Rules: no Markdown fences, the object must parse as JSON, use []\n\
         for anything not found in the context."
    )
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Returns a canned response, recording each prompt.
    pub struct StaticModel {
        response: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl StaticModel {
        pub fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl GenerativeModel for StaticModel {
        fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    /// Fails every call, for exercising fallbacks.
    pub struct FailingModel;

    impl GenerativeModel for FailingModel {
        fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::CallFailed("simulated outage".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_object() {
        let value = extract_json_object(r#"{"a": 1, "b": "x"}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn extracts_fenced_object() {
        let raw = "```json\n{\"estimated_min\": 9000, \"estimated_max\": 15000}\n```";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["estimated_min"], 9000);
    }

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let raw = "Here is the analysis you asked for:\n{\"answer\": \"ok\"}\nHope it helps!";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["answer"], "ok");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scan() {
        let raw = r#"{"note": "uses { and } freely", "n": 2}"#;
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn nested_objects_are_taken_whole() {
        let raw = r#"prefix {"outer": {"inner": 1}} suffix {"second": 2}"#;
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["outer"]["inner"], 1);
        assert!(value.get("second").is_none());
    }

    #[test]
    fn missing_object_is_an_error() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(GenerationError::MissingJson)
        ));
        assert!(matches!(
            extract_json_object("{unbalanced"),
            Err(GenerationError::MissingJson)
        ));
    }

    #[test]
    fn malformed_object_is_an_error() {
        assert!(matches!(
            extract_json_object("{'single': 'quotes'}"),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn typed_parse_applies_defaults() {
        #[derive(serde::Deserialize)]
        struct Band {
            estimated_min: f64,
            estimated_max: f64,
        }
        let band: Band =
            parse_response("```json\n{\"estimated_min\": 1.0, \"estimated_max\": 2.0}\n```")
                .unwrap();
        assert_eq!(band.estimated_min, 1.0);
        assert_eq!(band.estimated_max, 2.0);
    }

    #[test]
    fn disabled_model_always_fails() {
        assert!(DisabledModel.generate("anything").is_err());
    }
}
