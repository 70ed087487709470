//! Gift classification: image in, [`ObjectAttributes`] out.
//!
//! [`ObjectClassifier`] is the seam; [`VisionClassifier`] implements it with
//! a vision-capable chat model.  The game never looks at pixels itself.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use doda_hal::CameraFrame;
use doda_types::{DodaError, ObjectAttributes};
use schemars::schema_for;
use tracing::{debug, warn};

use crate::llm_driver::{ChatMessage, LlmDriver, strip_code_fences};

/// Instructions sent alongside the gift photo.
pub const VISION_PROMPT: &str = r#"Analyze this object and describe what you see.

Return a JSON object of this shape:

{
  "object_type": "physical_object" or "dodo_bird",
  "description": "detailed description including colors, shapes, textures, materials",
  "special_features": {
    "is_special_class": true or false,
    "beak_size": "small" or "medium" or "large" or "N/A",
    "beak_color": "detailed color description" or "N/A"
  }
}

Guidelines:
- Use "dodo_bird" for object_type ONLY if this is clearly a dodo bird (toy, drawing, figurine, or photo).
- Set is_special_class to true for any dodo bird representation.
- For dodo birds, judge beak_size relative to the bird's body and describe beak_color in detail (e.g. "bright orange", "rainbow striped").
- For anything else, set beak_size and beak_color to "N/A".
- Be thorough in the description and mention everything visible."#;

/// Turns a captured frame into structured gift attributes.
#[async_trait]
pub trait ObjectClassifier: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Classify `frame`.
    ///
    /// # Errors
    ///
    /// [`DodaError::ClassifierFailed`] when the frame cannot be sent or the
    /// reply cannot be parsed.
    async fn classify(&self, frame: &CameraFrame) -> Result<ObjectAttributes, DodaError>;
}

/// Classifier backed by a vision model behind an OpenAI-compatible API.
pub struct VisionClassifier {
    llm: LlmDriver,
}

impl VisionClassifier {
    pub fn new(llm: LlmDriver) -> Self {
        Self { llm }
    }
}

/// Encode an image frame as a `data:` URL.
///
/// # Errors
///
/// [`DodaError::ClassifierFailed`] for raw frames, which vision models cannot
/// read.
pub fn data_url(frame: &CameraFrame) -> Result<String, DodaError> {
    if !frame.is_encoded() {
        return Err(DodaError::ClassifierFailed(format!(
            "frame of type '{}' is not a JPEG or PNG image",
            frame.mime
        )));
    }
    Ok(format!("data:{};base64,{}", frame.mime, STANDARD.encode(&frame.data)))
}

/// Parse a classifier reply, tolerating markdown code fences.
///
/// # Errors
///
/// [`DodaError::ClassifierFailed`] when the reply is not the expected JSON.
pub fn parse_attributes(reply: &str) -> Result<ObjectAttributes, DodaError> {
    let attrs: ObjectAttributes = serde_json::from_str(strip_code_fences(reply))
        .map_err(|e| DodaError::ClassifierFailed(format!("unparsable classifier reply: {e}")))?;
    if attrs.description.trim().is_empty() {
        return Err(DodaError::ClassifierFailed(
            "classifier returned an empty description".to_string(),
        ));
    }
    Ok(attrs)
}

#[async_trait]
impl ObjectClassifier for VisionClassifier {
    fn name(&self) -> &str {
        "vision"
    }

    async fn classify(&self, frame: &CameraFrame) -> Result<ObjectAttributes, DodaError> {
        let url = data_url(frame)?;
        let schema = serde_json::to_value(schema_for!(ObjectAttributes))
            .unwrap_or(serde_json::Value::Null);
        let messages = [ChatMessage::user_with_image(VISION_PROMPT, url)];

        let reply = self
            .llm
            .complete(&messages, Some(("object_attributes", schema)))
            .await
            .map_err(|e| {
                warn!(error = %e, model = self.llm.model(), "vision request failed");
                DodaError::ClassifierFailed(e.to_string())
            })?;

        let attrs = parse_attributes(&reply)?;
        debug!(kind = %attrs.kind, description = %attrs.description, "gift classified");
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doda_hal::camera::RAW_GRAY_MIME;
    use doda_types::ObjectKind;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jpeg() -> CameraFrame {
        CameraFrame {
            width: 0,
            height: 0,
            mime: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8, 0xFF],
        }
    }

    #[test]
    fn data_url_encodes_base64() {
        assert_eq!(data_url(&jpeg()).unwrap(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn raw_frames_are_rejected() {
        let frame = CameraFrame {
            width: 4,
            height: 4,
            mime: RAW_GRAY_MIME.to_string(),
            data: vec![0; 16],
        };
        assert!(matches!(data_url(&frame), Err(DodaError::ClassifierFailed(_))));
    }

    #[test]
    fn parse_attributes_accepts_fenced_legacy_reply() {
        let reply = "```json\n{\"object_type\": \"dodo_bird\", \"description\": \"plush dodo\", \
                     \"special_features\": {\"is_dodo_bird\": true, \"beak_size\": \"large\", \
                     \"beak_color\": \"rainbow\"}}\n```";
        let attrs = parse_attributes(reply).unwrap();
        assert_eq!(attrs.kind, ObjectKind::SpecialClass);
        assert!(attrs.is_special_class());
        assert_eq!(attrs.special.beak_color, "rainbow");
    }

    #[test]
    fn parse_attributes_rejects_garbage() {
        assert!(parse_attributes("I see a feather!").is_err());
        assert!(parse_attributes(r#"{"description": "  "}"#).is_err());
    }

    #[tokio::test]
    async fn vision_classifier_sends_image_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("data:image/jpeg;base64,/9j/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant",
                    "content": "{\"object_type\": \"physical_object\", \"description\": \"a blue feather\"}"}}]
            })))
            .mount(&server)
            .await;

        let classifier = VisionClassifier::new(LlmDriver::new(server.uri(), "llava"));
        let attrs = classifier.classify(&jpeg()).await.unwrap();
        assert_eq!(attrs.kind, ObjectKind::Generic);
        assert_eq!(attrs.description, "a blue feather");
    }

    #[tokio::test]
    async fn unreachable_server_is_classifier_failure() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let classifier = VisionClassifier::new(LlmDriver::new(uri, "llava"));
        let err = classifier.classify(&jpeg()).await.unwrap_err();
        assert!(matches!(err, DodaError::ClassifierFailed(_)));
    }
}
