//! Deterministic prompt construction.
//!
//! Identical requests must yield byte-identical prompts: the prompt's
//! fingerprint is the story cache key.

use super::types::{GenerationRequest, HistoryEntry};

/// Entries folded into the prompt: the trailing `window`, plus the very first
/// entry when it has already scrolled out (it carries the game's objective).
pub fn context_entries(history: &[HistoryEntry], window: usize) -> Vec<&HistoryEntry> {
    let start = history.len().saturating_sub(window);
    let mut entries: Vec<&HistoryEntry> = history[start..].iter().collect();
    if start > 0 {
        entries.insert(0, &history[0]);
    }
    entries
}

/// Numbered `(n) text` lines.
pub fn format_history(entries: &[&HistoryEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("({}) {}", i + 1, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the user prompt for a generation request.
pub fn build_prompt(request: &GenerationRequest, history_window: usize) -> String {
    match request {
        GenerationRequest::NewGame { prompt } => prompt.clone(),
        GenerationRequest::Continue {
            current,
            choice,
            history,
            depth,
        } => {
            let previous = format_history(&context_entries(history, history_window));
            let inventory =
                serde_json::to_string(&current.inventory).unwrap_or_else(|_| "[]".to_string());

            format!(
                "Previous scenes:\n{previous}\n\
                 Current scene: {scene}\n\
                 Player swiped: {choice} - {label}.\n\
                 Current depth: {depth}\n\
                 Current objective score: {score}\n\
                 Current inventory: {inventory}\n\
                 Describe what happens next.",
                scene = current.text,
                label = current.choices.label(*choice),
                score = current.objective_score,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::types::{Choices, Direction, StoryNode};

    fn entry(i: usize) -> HistoryEntry {
        HistoryEntry {
            id: format!("n{}", i),
            text: format!("scene {}", i),
        }
    }

    fn node() -> StoryNode {
        StoryNode {
            id: "n9".to_string(),
            text: "The bridge sways.".to_string(),
            image: String::new(),
            choices: Choices::new("Cross it", "Cut the ropes"),
            is_ending: false,
            ending_type: Default::default(),
            objective_score: 65,
            inventory: vec!["Rope".to_string(), "Lantern".to_string()],
            depth: 2,
        }
    }

    #[test]
    fn test_context_short_history_is_unchanged() {
        let history: Vec<_> = (0..3).map(entry).collect();
        let ids: Vec<_> = context_entries(&history, 5)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["n0", "n1", "n2"]);
    }

    #[test]
    fn test_context_keeps_first_entry_when_scrolled() {
        let history: Vec<_> = (0..8).map(entry).collect();
        let ids: Vec<_> = context_entries(&history, 5)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["n0", "n3", "n4", "n5", "n6", "n7"]);
    }

    #[test]
    fn test_context_exact_window_has_no_duplicate() {
        let history: Vec<_> = (0..5).map(entry).collect();
        assert_eq!(context_entries(&history, 5).len(), 5);
        assert!(context_entries(&[], 5).is_empty());
    }

    #[test]
    fn test_format_history_numbering() {
        let history: Vec<_> = (0..2).map(entry).collect();
        let refs: Vec<_> = history.iter().collect();
        assert_eq!(format_history(&refs), "(1) scene 0\n(2) scene 1");
    }

    #[test]
    fn test_continue_prompt_contents() {
        let request = GenerationRequest::continue_from(
            node(),
            Direction::Right,
            vec![entry(0)],
            3,
        );
        let prompt = build_prompt(&request, 5);

        assert!(prompt.contains("(1) scene 0"));
        assert!(prompt.contains("Current scene: The bridge sways."));
        assert!(prompt.contains("Player swiped: right - Cut the ropes."));
        assert!(prompt.contains("Current depth: 3"));
        assert!(prompt.contains("Current objective score: 65"));
        assert!(prompt.contains(r#"Current inventory: ["Rope","Lantern"]"#));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = GenerationRequest::continue_from(node(), Direction::Left, vec![entry(0)], 3);
        let b = GenerationRequest::continue_from(node(), Direction::Left, vec![entry(0)], 3);
        assert_eq!(build_prompt(&a, 5), build_prompt(&b, 5));

        let c = GenerationRequest::continue_from(node(), Direction::Right, vec![entry(0)], 3);
        assert_ne!(build_prompt(&a, 5), build_prompt(&c, 5));
    }

    #[test]
    fn test_new_game_prompt_is_forced_text() {
        let request = GenerationRequest::new_game("Create a new game.");
        assert_eq!(build_prompt(&request, 5), "Create a new game.");
    }
}
