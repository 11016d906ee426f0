//! Model output parsing and pacing-contract normalisation.
//!
//! Parsing never fails: a completion without a usable JSON object becomes a
//! minimal playable scene built from the raw text.

use serde_json::{Map, Value};

use super::types::{Choices, EndingType};

/// Labels used when the model leaves a non-ending choice blank.
pub const FALLBACK_LEFT_LABEL: &str = "Left";
pub const FALLBACK_RIGHT_LABEL: &str = "Right";

/// Scene fields produced by the text model.
///
/// `objective_score` and `inventory` stay `None` when the model omitted them
/// so the caller can carry the previous values forward.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePayload {
    pub text: String,
    /// Visual description handed to the image model.
    pub image_prompt: String,
    pub choices: Choices,
    pub is_ending: bool,
    pub ending_type: EndingType,
    pub objective_score: Option<u8>,
    pub inventory: Option<Vec<String>>,
}

impl ScenePayload {
    /// Degenerate scene used when the completion has no parseable JSON.
    pub fn fallback(raw: &str) -> Self {
        Self {
            text: raw.trim().to_string(),
            image_prompt: String::new(),
            choices: Choices::new(FALLBACK_LEFT_LABEL, FALLBACK_RIGHT_LABEL),
            is_ending: false,
            ending_type: EndingType::Neutral,
            objective_score: None,
            inventory: None,
        }
    }
}

/// Locate the first balanced top-level `{...}` span, ignoring braces inside strings.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn score_field(obj: &Map<String, Value>) -> Option<u8> {
    let raw = match obj.get("objectiveScore")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

fn inventory_field(obj: &Map<String, Value>) -> Option<Vec<String>> {
    let items = obj.get("inventory")?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn choices_field(obj: &Map<String, Value>) -> Choices {
    match obj.get("choices").and_then(Value::as_object) {
        Some(choices) => Choices::new(
            string_field(choices, "left"),
            string_field(choices, "right"),
        ),
        None => Choices::default(),
    }
}

/// Parse a raw completion into scene fields.
pub fn parse_completion(content: &str) -> ScenePayload {
    let object = extract_json_object(content)
        .and_then(|span| serde_json::from_str::<Value>(span).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        });

    let Some(obj) = object else {
        return ScenePayload::fallback(content);
    };

    let text = string_field(&obj, "text");
    ScenePayload {
        text: if text.is_empty() {
            content.trim().to_string()
        } else {
            text
        },
        image_prompt: string_field(&obj, "image"),
        choices: choices_field(&obj),
        is_ending: bool_field(&obj, "isEnding"),
        ending_type: obj
            .get("endingType")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        objective_score: score_field(&obj),
        inventory: inventory_field(&obj),
    }
}

/// Enforce the pacing contract regardless of what the model returned.
///
/// At or beyond `terminal_depth` the scene is an ending. Endings carry two
/// empty choices; every other scene carries two non-empty ones.
pub fn normalize(mut scene: ScenePayload, depth: u32, terminal_depth: u32) -> ScenePayload {
    if depth >= terminal_depth {
        scene.is_ending = true;
    }

    if scene.is_ending {
        scene.choices = Choices::default();
    } else {
        if scene.choices.left.is_empty() {
            scene.choices.left = FALLBACK_LEFT_LABEL.to_string();
        }
        if scene.choices.right.is_empty() {
            scene.choices.right = FALLBACK_RIGHT_LABEL.to_string();
        }
    }

    scene
}
