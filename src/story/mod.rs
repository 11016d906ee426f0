//! Story generation: the node data model, prompt construction, model output
//! parsing, and the [`NodeGenerator`] that combines text, image and caches.

mod generator;
mod parser;
mod pipeline;
mod prompt;
mod types;

pub use generator::StoryGenerator;
pub use parser::{
    extract_json_object, normalize, parse_completion, ScenePayload, FALLBACK_LEFT_LABEL,
    FALLBACK_RIGHT_LABEL,
};
pub use pipeline::{CachedScene, NodeGenerator};
pub use prompt::{build_prompt, context_entries, format_history};
pub use types::*;
