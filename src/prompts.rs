//! Centralized prompt definitions for the story and image models
//!
//! Prompt text is configuration, not logic. The only part of the pacing
//! contract enforced in code is the forced ending at the terminal depth
//! (see `story::parser`).

/// Placeholder in [`STORY_SYSTEM_PROMPT`] replaced with the configured terminal depth.
pub const TERMINAL_DEPTH_PLACEHOLDER: &str = "{terminal_depth}";

/// Placeholder in [`IMAGE_SYSTEM_PROMPT`] replaced with the scene description.
pub const IMAGE_PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Instruction used for the first node of every new game.
pub const NEW_GAME_PROMPT: &str = "Create a new game. Dark fantasy oriented.";

/// System prompt for the storyteller model.
pub const STORY_SYSTEM_PROMPT: &str = r#"You are the storyteller of a swipe-based "choose your own adventure" game with real stakes.

Write a short, intense story that resolves within a handful of scenes.

STYLE
- Second person ("You"). Sensory detail: sound, smell, texture, light.
- Every sentence advances the plot or deepens the atmosphere.
- The world reacts to the player's last choice.

STRUCTURE
You receive the current depth.
- Depth 0: state the main objective clearly and set the tone. Stakes are high from the first line.
- Early depths: escalate. Things get worse or more complex. Call back to earlier choices. Success has a cost.
- The depth just before {terminal_depth}: the climax. This choice decides the outcome.
- Depth {terminal_depth} or more: THE STORY ENDS. Set "isEnding": true, resolve the objective from depth 0,
  pick an "endingType" ("success", "failure", "death" or "neutral"), and leave both choices as empty strings.

VISUALS
- Keep one consistent art style (digital oil painting).
- If the location has not changed, repeat its key details in the "image" description.

OBJECTIVE AND INVENTORY
- "objectiveScore" runs 0-100: 0 is total failure, 100 is complete success, 50 is the neutral start.
- "inventory" is the full list of items the player now carries. Add or remove items as the story dictates.

RESPONSE FORMAT
Return ONLY valid JSON:
{
  "image": "detailed visual description for the illustrator",
  "text": "story text, at most 60 words",
  "choices": { "left": "short punchy action", "right": "short punchy action" },
  "isEnding": false,
  "endingType": "neutral",
  "objectiveScore": 50,
  "inventory": ["item"]
}"#;

/// Instruction sent to the image model alongside the scene description.
pub const IMAGE_SYSTEM_PROMPT: &str = r#"You are the lead concept artist for a dark fantasy game.

TASK: paint the next frame of a continuous story.

If a reference image (the previous scene) is attached, keep its art style, colour palette,
lighting and environmental details. Change only the action or perspective described below.

SCENE: {prompt}

STYLE
- Digital oil painting with visible brushstrokes.
- Cinematic rim lighting, gritty weathered details.
- No photorealism, no 3D render look."#;

/// Render the story system prompt for a given terminal depth.
pub fn story_system_prompt(terminal_depth: u32) -> String {
    STORY_SYSTEM_PROMPT.replace(TERMINAL_DEPTH_PLACEHOLDER, &terminal_depth.to_string())
}

/// Render the image instruction for a scene description.
pub fn image_prompt(description: &str) -> String {
    IMAGE_SYSTEM_PROMPT.replace(IMAGE_PROMPT_PLACEHOLDER, description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_prompt_requests_json_contract() {
        let prompt = story_system_prompt(5);
        assert!(prompt.contains("Return ONLY valid JSON"));
        assert!(prompt.contains("\"isEnding\""));
        assert!(prompt.contains("\"objectiveScore\""));
        assert!(prompt.contains("\"inventory\""));
        assert!(prompt.contains("\"endingType\""));
    }

    #[test]
    fn test_story_prompt_substitutes_terminal_depth() {
        let prompt = story_system_prompt(7);
        assert!(prompt.contains("Depth 7 or more"));
        assert!(!prompt.contains(TERMINAL_DEPTH_PLACEHOLDER));
    }

    #[test]
    fn test_image_prompt_embeds_description() {
        let prompt = image_prompt("a ruined chapel at dusk");
        assert!(prompt.contains("SCENE: a ruined chapel at dusk"));
        assert!(!prompt.contains(IMAGE_PROMPT_PLACEHOLDER));
    }
}
