//! Cursor movement over chunked input and output.
//!
//! Chunking is lazy: input is split the first time it is navigated, a
//! result's output the first time it is paged.

use std::fmt;
use std::str::FromStr;

use crate::chunker::Chunker;
use crate::error::EngineError;
use crate::session::{ChunkSet, SessionState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
    First,
    Last,
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Direction::Next),
            "prev" | "previous" => Ok(Direction::Prev),
            "first" => Ok(Direction::First),
            "last" => Ok(Direction::Last),
            other => Err(EngineError::InvalidAction(format!("unknown direction: {}", other))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Next => "next",
            Direction::Prev => "prev",
            Direction::First => "first",
            Direction::Last => "last",
        };
        f.write_str(s)
    }
}

/// Result of a cursor move. `moved` is false when clamped at a bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Movement {
    pub cursor: usize,
    pub moved: bool,
}

/// Move `cursor` over `len` items. `next`/`prev` clamp instead of wrapping.
pub fn move_cursor(cursor: usize, direction: Direction, len: usize) -> Movement {
    if len == 0 {
        return Movement {
            cursor: 0,
            moved: false,
        };
    }
    let cursor = cursor.min(len - 1);
    let target = match direction {
        Direction::Next => (cursor + 1).min(len - 1),
        Direction::Prev => cursor.saturating_sub(1),
        Direction::First => 0,
        Direction::Last => len - 1,
    };
    Movement {
        cursor: target,
        moved: target != cursor,
    }
}

/// Navigation over a session's input chunks and result pages.
///
/// Cursors are written into the [`SessionState`]; the caller persists it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NavigationController {
    chunker: Chunker,
}

impl NavigationController {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    /// Move over the input chunks, splitting the input on first use.
    pub fn navigate_input(
        &self,
        state: &mut SessionState,
        direction: Direction,
    ) -> Result<Movement, EngineError> {
        let chunks = self.input_chunks(state)?;
        let movement = move_cursor(chunks.cursor(), direction, chunks.len());
        chunks.set_cursor(movement.cursor);
        Ok(movement)
    }

    /// Move over the display pages of result `key`, paging it on first use.
    pub fn navigate_output(
        &self,
        state: &mut SessionState,
        key: &str,
        direction: Direction,
    ) -> Result<Movement, EngineError> {
        let pages = self.output_pages(state, key)?;
        let movement = move_cursor(pages.cursor(), direction, pages.len());
        pages.set_cursor(movement.cursor);
        Ok(movement)
    }

    /// Input chunks of the session, created on first access.
    pub fn input_chunks<'a>(
        &self,
        state: &'a mut SessionState,
    ) -> Result<&'a mut ChunkSet, EngineError> {
        if state.input_chunks.is_none() {
            state.input_chunks = Some(ChunkSet::new(self.chunker.split(&state.original_input))?);
        }
        let chunks = state.input_chunks.as_mut().ok_or(EngineError::NoContent)?;
        chunks.touch();
        Ok(chunks)
    }

    /// Display pages of result `key`, created on first access.
    pub fn output_pages<'a>(
        &self,
        state: &'a mut SessionState,
        key: &str,
    ) -> Result<&'a mut ChunkSet, EngineError> {
        let result = state
            .results
            .get_mut(key)
            .ok_or_else(|| EngineError::InvalidAction(format!("no result named {}", key)))?;
        if result.chunks.is_none() {
            result.chunks = Some(ChunkSet::new(self.chunker.split_for_display(&result.output))?);
        }
        let pages = result.chunks.as_mut().ok_or(EngineError::NoContent)?;
        pages.touch();
        Ok(pages)
    }
}
