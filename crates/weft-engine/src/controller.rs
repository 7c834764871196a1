//! Interaction flow controller.
//!
//! Routes action tokens from the delivery channel to one handler each,
//! keeping the per-user [`SessionState`] in the session store. Replies carry
//! pages already bounded for display, an optional menu and a terminal flag.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use weft_core::{UserId, WeftConfig};
use weft_patterns::PatternCategory;

use crate::advisor::{InteractionType, PatternAdvisor, Suggestion};
use crate::batch::BatchProcessor;
use crate::chunker::{char_len, Chunker};
use crate::error::EngineError;
use crate::executor::PatternExecutor;
use crate::export::{ExportArtifact, Exporter};
use crate::flow::{validate_transition, ActionToken, FlowState};
use crate::guard::SingleFlight;
use crate::navigation::{Direction, NavigationController};
use crate::session::{PatternResult, SessionState};
use crate::store::SessionStore;

// =============================================================================
// Replies
// =============================================================================

/// One selectable menu entry; `token` is sent back to [`FlowController::handle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuOption {
    pub label: String,
    pub token: String,
}

impl MenuOption {
    fn new(label: impl Into<String>, token: impl ToString) -> Self {
        Self {
            label: label.into(),
            token: token.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Menu {
    pub title: String,
    pub options: Vec<MenuOption>,
    pub page: usize,
    pub total_pages: usize,
}

impl Menu {
    fn single(title: impl Into<String>, options: Vec<MenuOption>) -> Self {
        Self {
            title: title.into(),
            options,
            page: 0,
            total_pages: 1,
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.token.as_str())
    }
}

/// Position of the shown page within its chunk set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub total: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.total)
    }
}

/// What the delivery channel should show.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowReply {
    pub pages: Vec<String>,
    pub position: Option<Position>,
    pub menu: Option<Menu>,
    /// View after the action; `None` when there is no session.
    pub state: Option<FlowState>,
    /// The interactive flow is over and control returns to the channel.
    pub terminal: bool,
    pub artifact: Option<ExportArtifact>,
}

impl FlowReply {
    /// Reply for a user whose session expired or never existed.
    pub fn start_over() -> Self {
        Self {
            pages: vec!["Your session has expired. Please send your text again.".to_string()],
            terminal: true,
            ..Self::default()
        }
    }

    fn text(text: impl Into<String>, state: &FlowState) -> Self {
        Self {
            pages: vec![text.into()],
            state: Some(state.clone()),
            ..Self::default()
        }
    }
}

// =============================================================================
// FlowController
// =============================================================================

pub struct FlowController {
    executor: Arc<PatternExecutor>,
    advisor: PatternAdvisor,
    batch: BatchProcessor,
    navigation: NavigationController,
    store: SessionStore,
    guard: SingleFlight,
    exporter: Arc<dyn Exporter>,
    chunker: Chunker,
    patterns_per_page: usize,
}

impl FlowController {
    pub fn new(
        executor: Arc<PatternExecutor>,
        store: SessionStore,
        exporter: Arc<dyn Exporter>,
        config: &WeftConfig,
    ) -> Self {
        let chunker = Chunker::new(&config.chunking);
        Self {
            advisor: PatternAdvisor::new(Arc::clone(&executor)),
            batch: BatchProcessor::new(Arc::clone(&executor), config),
            navigation: NavigationController::new(chunker),
            executor,
            store,
            guard: SingleFlight::new(config.session.single_flight),
            exporter,
            chunker,
            patterns_per_page: config.menu.patterns_per_page.max(1),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Start a session for new input: suggest a pattern, or run it when the
    /// input asks for one explicitly.
    pub async fn start(
        &self,
        user: &UserId,
        input: &str,
        interaction: InteractionType,
    ) -> Result<FlowReply, EngineError> {
        if input.trim().is_empty() {
            return Err(EngineError::NoContent);
        }
        let _flight = self.guard.try_acquire(user)?;
        let mut state = SessionState::new(input);

        let suggestion = match self.advisor.suggest(input, None, interaction).await {
            Ok(s) => s,
            Err(e) => {
                state.view = FlowState::Error;
                self.store.save_state(user, &state)?;
                return Err(e);
            }
        };

        let reply = match suggestion {
            Some(Suggestion::Executed(executed)) => {
                let key = executed.pattern.clone();
                state.record_result(&key, PatternResult::new(&key, &executed.output));
                state.suggestion = Some(Suggestion::Executed(executed));
                state.view = FlowState::Processing;
                self.render_output(&mut state, &key, None)?
            }
            Some(Suggestion::Ranked(ranked)) => {
                let mut options = vec![MenuOption::new(format!("Use {}", ranked.pattern), ActionToken::Use)];
                options.extend(
                    ranked
                        .alternatives
                        .iter()
                        .map(|alt| MenuOption::new(alt.clone(), ActionToken::Pattern(alt.clone()))),
                );
                options.push(MenuOption::new("More patterns", ActionToken::More));
                options.push(MenuOption::new("Skip", ActionToken::Skip));

                let text = format!(
                    "Suggested pattern: {} ({:.0}% confident). {}",
                    ranked.pattern,
                    ranked.confidence * 100.0,
                    ranked.reasoning
                );
                state.suggestion = Some(Suggestion::Ranked(ranked));
                state.view = FlowState::ShowingCategoryMenu;
                FlowReply {
                    menu: Some(Menu::single("Suggestion", options)),
                    ..FlowReply::text(text.trim_end(), &state.view)
                }
            }
            None => self.category_menu(&mut state)?,
        };

        self.store.save_state(user, &state)?;
        Ok(reply)
    }

    /// Apply `pattern` to fresh input without a suggestion step. With `all`,
    /// the input is chunked and batch processed.
    pub async fn run(
        &self,
        user: &UserId,
        input: &str,
        pattern: &str,
        all: bool,
    ) -> Result<FlowReply, EngineError> {
        let _flight = self.guard.try_acquire(user)?;
        let mut state = SessionState::new(input);
        let result = if all {
            self.process_all(&mut state, pattern).await
        } else {
            self.run_pattern(&mut state, pattern).await
        };
        self.store.save_state(user, &state)?;
        result
    }

    /// Handle one action token for `user`.
    pub async fn handle(&self, user: &UserId, token: &str) -> Result<FlowReply, EngineError> {
        let token: ActionToken = token.parse()?;
        let Some(mut state) = self.store.load_state(user) else {
            debug!(user = %user, token = %token, "No session, asking to start over");
            return Ok(FlowReply::start_over());
        };

        let runs_pattern = token.runs_pattern();
        let _flight = if runs_pattern {
            Some(self.guard.try_acquire(user)?)
        } else {
            None
        };

        let result = self.dispatch(&mut state, token).await;
        // A session cleared or expired while the pattern ran stays gone.
        if runs_pattern && self.store.load_state(user).is_none() {
            debug!(user = %user, "Session ended during pattern run, dropping result");
            return Ok(FlowReply::start_over());
        }
        if result.is_ok() || state.view == FlowState::Error {
            self.store.save_state(user, &state)?;
        }
        result
    }

    /// Forget a user's session.
    pub fn clear(&self, user: &UserId) -> Result<(), EngineError> {
        info!(user = %user, "Clearing session");
        self.store.clear(user)
    }

    async fn dispatch(
        &self,
        state: &mut SessionState,
        token: ActionToken,
    ) -> Result<FlowReply, EngineError> {
        match token {
            ActionToken::Use => match state.suggestion.clone() {
                Some(Suggestion::Ranked(ranked)) => self.run_pattern(state, &ranked.pattern).await,
                Some(Suggestion::Executed(_)) => Err(EngineError::InvalidAction(
                    "suggestion already applied".to_string(),
                )),
                None => self.category_menu(state),
            },
            ActionToken::More | ActionToken::BackToMenu | ActionToken::Category(None) => {
                self.category_menu(state)
            }
            ActionToken::Category(Some(category)) => self.pattern_menu(state, category, 0),
            ActionToken::Pattern(name) => self.run_pattern(state, &name).await,
            ActionToken::Back => match state.view {
                FlowState::ShowingCategoryMenu => self.input_view(state, None),
                _ => self.category_menu(state),
            },
            ActionToken::Skip => Ok(FlowReply {
                terminal: true,
                ..FlowReply::text("Okay, no pattern applied.", &state.view)
            }),
            ActionToken::NextPage | ActionToken::PrevPage => {
                let category = match (&state.view, state.menu_category) {
                    (FlowState::ShowingPatternMenu, Some(category)) => category,
                    _ => {
                        return Err(EngineError::InvalidAction(
                            "no pattern menu is open".to_string(),
                        ))
                    }
                };
                let page = if token == ActionToken::NextPage {
                    state.menu_page + 1
                } else {
                    state.menu_page.saturating_sub(1)
                };
                self.pattern_menu(state, category, page)
            }
            ActionToken::Chunk(direction) => {
                let key = state
                    .view
                    .viewed_result()
                    .map(str::to_string)
                    .or_else(|| state.selection.last_processed_pattern.clone())
                    .ok_or_else(|| EngineError::InvalidAction("no result to page".to_string()))?;
                self.navigation.navigate_output(state, &key, direction)?;
                self.render_output(state, &key, None)
            }
            ActionToken::InputChunk(direction) => self.input_view(state, Some(direction)),
            ActionToken::SelectChunk => {
                let index = self.navigation.input_chunks(state)?.cursor();
                state.select_input_chunk(index)?;
                self.category_menu(state)
            }
            ActionToken::ProcessAll => {
                let pattern = current_pattern(state)?;
                self.process_all(state, &pattern).await
            }
            ActionToken::ApplyToChunk => {
                let pattern = current_pattern(state)?;
                let index = self.navigation.input_chunks(state)?.cursor();
                state.select_input_chunk(index)?;
                self.run_pattern(state, &pattern).await
            }
            ActionToken::SelectOutput(key) => {
                let key = key
                    .or_else(|| state.selection.last_processed_pattern.clone())
                    .ok_or_else(|| EngineError::InvalidAction("no result to select".to_string()))?;
                state.select_output(&key)?;
                self.category_menu(state)
            }
            ActionToken::UseFullInput => {
                state.use_full_input();
                self.category_menu(state)
            }
            ActionToken::Download => self.download(state),
        }
    }

    // ---- pattern runs ----

    async fn run_pattern(
        &self,
        state: &mut SessionState,
        pattern: &str,
    ) -> Result<FlowReply, EngineError> {
        validate_transition(&state.view, &FlowState::Processing)?;
        let (content, source) = state.selected_content();
        state.view = FlowState::Processing;

        match self.executor.apply_large_with_retry(pattern, &content).await {
            Ok(output) => {
                info!(pattern = %pattern, chars = output.len(), "Pattern applied");
                let result = PatternResult::new(pattern, output).with_source(&source);
                state.record_result(pattern, result);
                self.render_output(state, pattern, None)
            }
            Err(e) => {
                state.view = FlowState::Error;
                Err(e)
            }
        }
    }

    async fn process_all(
        &self,
        state: &mut SessionState,
        pattern: &str,
    ) -> Result<FlowReply, EngineError> {
        validate_transition(&state.view, &FlowState::Processing)?;
        let chunks = self.navigation.input_chunks(state)?.clone();
        state.view = FlowState::Processing;

        match self.batch.process_all(&chunks, pattern).await {
            Ok(outcome) => {
                let notice = outcome.summary();
                state.record_result(&outcome.key, PatternResult::from_batch(&outcome));
                self.render_output(state, &outcome.key, Some(notice))
            }
            Err(e) => {
                state.view = FlowState::Error;
                Err(e)
            }
        }
    }

    // ---- views ----

    /// Show the current page of result `key` with its result menu.
    fn render_output(
        &self,
        state: &mut SessionState,
        key: &str,
        notice: Option<String>,
    ) -> Result<FlowReply, EngineError> {
        let (page, index, total) = {
            let pages = self.navigation.output_pages(state, key)?;
            (pages.current().to_string(), pages.cursor(), pages.len())
        };

        let next_view = if total == 1 {
            FlowState::ShowingResult {
                pattern: key.to_string(),
            }
        } else {
            FlowState::ShowingOutputChunk {
                pattern: key.to_string(),
                index,
            }
        };
        if next_view != state.view {
            validate_transition(&state.view, &next_view)?;
            state.view = next_view;
        }

        let mut options = Vec::new();
        if total > 1 {
            options.push(MenuOption::new("Previous", ActionToken::Chunk(Direction::Prev)));
            options.push(MenuOption::new("Next", ActionToken::Chunk(Direction::Next)));
        }
        options.push(MenuOption::new(
            "Apply a pattern to this output",
            ActionToken::SelectOutput(Some(key.to_string())),
        ));
        if state.input_chunks.as_ref().is_some_and(|c| c.len() > 1) {
            options.push(MenuOption::new("Process all chunks", ActionToken::ProcessAll));
        }
        options.push(MenuOption::new("Download", ActionToken::Download));
        options.push(MenuOption::new("Back to menu", ActionToken::BackToMenu));
        options.push(MenuOption::new("Done", ActionToken::Skip));

        let mut pages: Vec<String> = notice.into_iter().collect();
        pages.push(page);
        Ok(FlowReply {
            pages,
            position: Some(Position { index, total }),
            menu: Some(Menu::single(format!("Result: {}", key), options)),
            state: Some(state.view.clone()),
            ..FlowReply::default()
        })
    }

    /// Show an input chunk, optionally moving the cursor first.
    fn input_view(
        &self,
        state: &mut SessionState,
        direction: Option<Direction>,
    ) -> Result<FlowReply, EngineError> {
        if let Some(direction) = direction {
            self.navigation.navigate_input(state, direction)?;
        }
        let (chunk, index, total) = {
            let chunks = self.navigation.input_chunks(state)?;
            (chunks.current().to_string(), chunks.cursor(), chunks.len())
        };

        let next_view = FlowState::ShowingInputChunk { index };
        validate_transition(&state.view, &next_view)?;
        state.view = next_view;

        let mut options = Vec::new();
        if total > 1 {
            options.push(MenuOption::new("Previous", ActionToken::InputChunk(Direction::Prev)));
            options.push(MenuOption::new("Next", ActionToken::InputChunk(Direction::Next)));
            options.push(MenuOption::new("Use this chunk", ActionToken::SelectChunk));
            options.push(MenuOption::new("Process all chunks", ActionToken::ProcessAll));
        }
        if current_pattern(state).is_ok() {
            options.push(MenuOption::new("Apply last pattern here", ActionToken::ApplyToChunk));
        }
        options.push(MenuOption::new("Use full input", ActionToken::UseFullInput));
        options.push(MenuOption::new("Back", ActionToken::Back));

        Ok(FlowReply {
            pages: self.chunker.split_for_display(&chunk),
            position: Some(Position { index, total }),
            menu: Some(Menu::single("Input", options)),
            state: Some(state.view.clone()),
            ..FlowReply::default()
        })
    }

    fn category_menu(&self, state: &mut SessionState) -> Result<FlowReply, EngineError> {
        validate_transition(&state.view, &FlowState::ShowingCategoryMenu)?;
        state.view = FlowState::ShowingCategoryMenu;
        state.menu_category = None;
        state.menu_page = 0;

        let catalog = self.executor.catalog();
        let mut options: Vec<MenuOption> = catalog
            .categories()
            .map(|c| {
                MenuOption::new(
                    format!("{} ({})", c.label(), catalog.patterns_in(c).len()),
                    ActionToken::Category(Some(c)),
                )
            })
            .collect();
        let browsable = state.input_chunks.as_ref().map_or_else(
            || char_len(&state.original_input) > self.chunker.input_size,
            |chunks| chunks.len() > 1,
        );
        if browsable {
            options.push(MenuOption::new("Browse input", ActionToken::InputChunk(Direction::First)));
        }
        if state.selection.use_processed_output.is_some() || state.selection.selected_input_chunk.is_some() {
            options.push(MenuOption::new("Use full input", ActionToken::UseFullInput));
        }
        options.push(MenuOption::new("Skip", ActionToken::Skip));

        let text = if catalog.is_empty() {
            "No patterns are available.".to_string()
        } else {
            format!("Choose a category. Applying to {}.", describe_selection(state))
        };
        Ok(FlowReply {
            menu: Some(Menu::single("Categories", options)),
            ..FlowReply::text(text, &state.view)
        })
    }

    fn pattern_menu(
        &self,
        state: &mut SessionState,
        category: PatternCategory,
        page: usize,
    ) -> Result<FlowReply, EngineError> {
        let patterns = self.executor.catalog().patterns_in(category);
        if patterns.is_empty() {
            return Err(EngineError::InvalidAction(format!("no patterns in {}", category)));
        }
        validate_transition(&state.view, &FlowState::ShowingPatternMenu)?;

        let total_pages = patterns.len().div_ceil(self.patterns_per_page);
        let page = page.min(total_pages - 1);
        state.view = FlowState::ShowingPatternMenu;
        state.menu_category = Some(category);
        state.menu_page = page;

        let mut options: Vec<MenuOption> = patterns
            .iter()
            .skip(page * self.patterns_per_page)
            .take(self.patterns_per_page)
            .map(|p| MenuOption::new(format!("{}: {}", p.name, p.description), ActionToken::Pattern(p.name.clone())))
            .collect();
        if page > 0 {
            options.push(MenuOption::new("Previous page", ActionToken::PrevPage));
        }
        if page + 1 < total_pages {
            options.push(MenuOption::new("Next page", ActionToken::NextPage));
        }
        options.push(MenuOption::new("Back", ActionToken::Back));

        Ok(FlowReply {
            menu: Some(Menu {
                title: category.label().to_string(),
                options,
                page,
                total_pages,
            }),
            ..FlowReply::text(format!("{} patterns", category.label()), &state.view)
        })
    }

    fn download(&self, state: &mut SessionState) -> Result<FlowReply, EngineError> {
        let (text, title) = match state.view.viewed_result() {
            Some(key) => {
                let result = state
                    .results
                    .get(key)
                    .ok_or_else(|| EngineError::InvalidAction(format!("no result named {}", key)))?;
                (result.output.clone(), key.to_string())
            }
            None => (state.original_input.clone(), "input".to_string()),
        };
        let artifact = self.exporter.export(&text, &title)?;
        info!(file = %artifact.file_name, bytes = artifact.bytes.len(), "Exported result");
        Ok(FlowReply {
            pages: vec![format!("Exported {}", artifact.file_name)],
            state: Some(state.view.clone()),
            terminal: true,
            artifact: Some(artifact),
            ..FlowReply::default()
        })
    }
}

/// Pattern the chunk-level actions reuse: the viewed result's, the last
/// processed one's, then the suggestion's.
fn current_pattern(state: &SessionState) -> Result<String, EngineError> {
    state
        .view
        .viewed_result()
        .or(state.selection.last_processed_pattern.as_deref())
        .and_then(|key| state.pattern_of(key))
        .or_else(|| state.suggestion.as_ref().map(Suggestion::pattern))
        .map(str::to_string)
        .ok_or_else(|| EngineError::InvalidAction("choose a pattern first".to_string()))
}

fn describe_selection(state: &SessionState) -> String {
    if let Some(key) = &state.selection.use_processed_output {
        format!("the output of {}", key)
    } else if let Some(index) = state.selection.selected_input_chunk {
        format!("input chunk {}", index + 1)
    } else {
        "the full input".to_string()
    }
}
