use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Speaker {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub sequence: u64,
}

/// Append-only, strictly ordered conversation history for one session.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
    next_sequence: u64,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: String) {
        self.push(Speaker::User, text);
    }

    /// An agent turn is only valid once the user turn that triggered it is
    /// already in history.
    pub fn push_agent(&mut self, text: String) -> Result<()> {
        if !self.turns.iter().any(|turn| turn.speaker == Speaker::User) {
            bail!("agent turn without a preceding user turn");
        }
        self.push(Speaker::Agent, text);
        Ok(())
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.turns.push(ConversationTurn {
            speaker,
            text,
            sequence,
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Serialize the full history as the ordered text context sent to the
    /// dialogue service.
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for turn in &self.turns {
            let label = match turn.speaker {
                Speaker::User => "You",
                Speaker::Agent => "Coach",
            };
            let _ = writeln!(rendered, "{}: {}", label, turn.text);
        }
        rendered
    }

    /// Explicit user action only; history is never cleared implicitly.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.next_sequence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_strictly_increasing() {
        let mut history = ConversationHistory::new();
        history.push_user("first".into());
        history.push_agent("reply".into()).unwrap();
        history.push_user("second".into());

        let sequences: Vec<u64> = history.turns().iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn agent_turn_requires_a_user_turn() {
        let mut history = ConversationHistory::new();
        assert!(history.push_agent("unprompted".into()).is_err());
        assert!(history.is_empty());

        history.push_user("question".into());
        assert!(history.push_agent("answer".into()).is_ok());
    }

    #[test]
    fn render_labels_speakers_in_order() {
        let mut history = ConversationHistory::new();
        history.push_user("tell me about yourself".into());
        history.push_agent("good structure, watch your pacing".into()).unwrap();

        assert_eq!(
            history.render(),
            "You: tell me about yourself\nCoach: good structure, watch your pacing\n"
        );
    }
}
