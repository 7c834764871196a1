//! Interaction flow: view states, action tokens and allowed transitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use weft_patterns::PatternCategory;

use crate::error::EngineError;
use crate::navigation::Direction;

/// What the user is looking at.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum FlowState {
    ShowingInputChunk { index: usize },
    ShowingOutputChunk { pattern: String, index: usize },
    #[default]
    ShowingCategoryMenu,
    ShowingPatternMenu,
    Processing,
    ShowingResult { pattern: String },
    Error,
}

impl FlowState {
    /// Result key being viewed, if any.
    pub fn viewed_result(&self) -> Option<&str> {
        match self {
            FlowState::ShowingOutputChunk { pattern, .. } | FlowState::ShowingResult { pattern } => {
                Some(pattern)
            }
            _ => None,
        }
    }
}

/// Action tokens routed in from the delivery channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionToken {
    /// Accept the current suggestion.
    Use,
    /// Browse patterns instead of the suggestion.
    More,
    Category(Option<PatternCategory>),
    Pattern(String),
    Back,
    BackToMenu,
    Skip,
    NextPage,
    PrevPage,
    Chunk(Direction),
    InputChunk(Direction),
    SelectChunk,
    ProcessAll,
    ApplyToChunk,
    SelectOutput(Option<String>),
    UseFullInput,
    Download,
}

impl ActionToken {
    /// Tokens that end the interactive flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionToken::Skip | ActionToken::Download)
    }

    /// Tokens that start a backend pattern run.
    pub fn runs_pattern(&self) -> bool {
        matches!(
            self,
            ActionToken::Use
                | ActionToken::Pattern(_)
                | ActionToken::ProcessAll
                | ActionToken::ApplyToChunk
        )
    }
}

impl FromStr for ActionToken {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (head, arg) = match s.split_once(':') {
            Some((head, arg)) => (head, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (s, None),
        };
        let invalid = || EngineError::InvalidAction(s.to_string());

        let token = match (head, arg) {
            ("use", None) => ActionToken::Use,
            ("more", None) => ActionToken::More,
            ("category", None) => ActionToken::Category(None),
            ("category", Some(name)) => {
                ActionToken::Category(Some(name.parse().map_err(|_| invalid())?))
            }
            ("pattern", Some(name)) => ActionToken::Pattern(name.to_string()),
            ("back", None) => ActionToken::Back,
            ("back_to_menu", None) => ActionToken::BackToMenu,
            ("skip", None) => ActionToken::Skip,
            ("next_page", None) => ActionToken::NextPage,
            ("prev_page", None) => ActionToken::PrevPage,
            ("chunk", Some(dir)) => ActionToken::Chunk(dir.parse()?),
            ("input_chunk", Some(dir)) => ActionToken::InputChunk(dir.parse()?),
            ("select_chunk", None) => ActionToken::SelectChunk,
            ("process_all", None) => ActionToken::ProcessAll,
            ("apply_to_chunk", None) => ActionToken::ApplyToChunk,
            ("select_output", key) => ActionToken::SelectOutput(key.map(str::to_string)),
            ("use_full_input", None) => ActionToken::UseFullInput,
            ("download", None) => ActionToken::Download,
            _ => return Err(invalid()),
        };
        Ok(token)
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionToken::Use => f.write_str("use"),
            ActionToken::More => f.write_str("more"),
            ActionToken::Category(None) => f.write_str("category"),
            ActionToken::Category(Some(c)) => write!(f, "category:{}", c),
            ActionToken::Pattern(name) => write!(f, "pattern:{}", name),
            ActionToken::Back => f.write_str("back"),
            ActionToken::BackToMenu => f.write_str("back_to_menu"),
            ActionToken::Skip => f.write_str("skip"),
            ActionToken::NextPage => f.write_str("next_page"),
            ActionToken::PrevPage => f.write_str("prev_page"),
            ActionToken::Chunk(d) => write!(f, "chunk:{}", d),
            ActionToken::InputChunk(d) => write!(f, "input_chunk:{}", d),
            ActionToken::SelectChunk => f.write_str("select_chunk"),
            ActionToken::ProcessAll => f.write_str("process_all"),
            ActionToken::ApplyToChunk => f.write_str("apply_to_chunk"),
            ActionToken::SelectOutput(None) => f.write_str("select_output"),
            ActionToken::SelectOutput(Some(key)) => write!(f, "select_output:{}", key),
            ActionToken::UseFullInput => f.write_str("use_full_input"),
            ActionToken::Download => f.write_str("download"),
        }
    }
}

/// Validate that a view transition is allowed.
///
/// Valid transitions:
/// - anything but Processing -> Processing
/// - Processing -> ShowingResult / ShowingOutputChunk / Error
/// - ShowingResult(p) / ShowingOutputChunk(p) -> ShowingOutputChunk(p)
/// - anything but Processing -> input chunks, menus, Error
pub fn validate_transition(from: &FlowState, to: &FlowState) -> Result<(), EngineError> {
    use FlowState::*;

    let valid = match (from, to) {
        (Processing, ShowingResult { .. } | ShowingOutputChunk { .. } | Error) => true,
        (Processing, _) => false,
        (_, Processing) => true,
        (_, ShowingResult { .. }) => false,
        (ShowingResult { pattern: a } | ShowingOutputChunk { pattern: a, .. }, ShowingOutputChunk { pattern: b, .. }) => {
            a == b
        }
        (_, ShowingOutputChunk { .. }) => false,
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidAction(format!(
            "cannot go from {:?} to {:?}",
            from, to
        )))
    }
}
