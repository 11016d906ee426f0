use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Objective score of a fresh game.
pub const NEUTRAL_OBJECTIVE_SCORE: u8 = 50;

/// Choice label recorded in the id of a new game's first node.
pub const START_LABEL: &str = "start";

fn default_objective_score() -> u8 {
    NEUTRAL_OBJECTIVE_SCORE
}

/// Swipe direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Both directions, in preload order.
    pub const BOTH: [Direction; 2] = [Direction::Left, Direction::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// The direction not taken.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// The two labelled options of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choices {
    #[serde(default)]
    pub left: String,
    #[serde(default)]
    pub right: String,
}

impl Choices {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn label(&self, direction: Direction) -> &str {
        match direction {
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }

    /// Both labels empty, as required of an ending.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// Display classification of a terminal node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndingType {
    Success,
    Failure,
    Death,
    #[default]
    #[serde(other)]
    Neutral,
}

/// One generated scene: the unit of game state exchanged with the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// Data URI of the illustration, or the placeholder URL.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub choices: Choices,
    #[serde(default)]
    pub is_ending: bool,
    #[serde(default)]
    pub ending_type: EndingType,
    #[serde(default = "default_objective_score")]
    pub objective_score: u8,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub depth: u32,
}

impl StoryNode {
    /// Mint a node id from the creation time and the choice that produced it.
    ///
    /// A random suffix keeps ids unique when two nodes share a millisecond.
    pub fn new_id(choice_label: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}:{}",
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8],
            choice_label
        )
    }
}

/// The slice of a past node that feeds prompt context.
///
/// Clients send whole nodes (inline images included); only these fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
}

impl From<&StoryNode> for HistoryEntry {
    fn from(node: &StoryNode) -> Self {
        Self {
            id: node.id.clone(),
            text: node.text.clone(),
        }
    }
}

/// Inputs that fully determine one story prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    /// First node of a game, driven by a fixed instruction.
    NewGame { prompt: String },
    /// Continuation after the player swiped `choice` on `current`.
    Continue {
        current: StoryNode,
        choice: Direction,
        history: Vec<HistoryEntry>,
        depth: u32,
    },
}

impl GenerationRequest {
    pub fn new_game(prompt: impl Into<String>) -> Self {
        GenerationRequest::NewGame {
            prompt: prompt.into(),
        }
    }

    pub fn continue_from(
        current: StoryNode,
        choice: Direction,
        history: Vec<HistoryEntry>,
        depth: u32,
    ) -> Self {
        GenerationRequest::Continue {
            current,
            choice,
            history,
            depth,
        }
    }

    /// New games always bypass the story cache.
    pub fn is_start(&self) -> bool {
        matches!(self, GenerationRequest::NewGame { .. })
    }

    /// Depth of the node this request produces.
    pub fn depth(&self) -> u32 {
        match self {
            GenerationRequest::NewGame { .. } => 0,
            GenerationRequest::Continue { depth, .. } => *depth,
        }
    }

    pub fn choice_label(&self) -> &str {
        match self {
            GenerationRequest::NewGame { .. } => START_LABEL,
            GenerationRequest::Continue { choice, .. } => choice.as_str(),
        }
    }

    pub fn current(&self) -> Option<&StoryNode> {
        match self {
            GenerationRequest::NewGame { .. } => None,
            GenerationRequest::Continue { current, .. } => Some(current),
        }
    }
}
