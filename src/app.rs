use tokio::task::JoinHandle;

use crate::backend::{BackendClient, RemoteCallError};
use crate::chat::Conversation;
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Tools,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Which buffer editing keystrokes go to on the chat screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFocus {
    Input,
    ContractEditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolsFocus {
    Greet,
    Counter,
    Prompt,
}

/// Canned prompts offered as chat shortcuts. Selecting one fills the
/// draft; it never submits on its own.
pub const QUICK_ACTIONS: &[(&str, &str)] = &[
    ("Explain", "Explain this smart contract and its main functions"),
    ("Security", "Check this contract for security vulnerabilities"),
    ("Gas", "How can I optimize this contract for gas efficiency?"),
    ("Practices", "What are the best practices for this type of contract?"),
];

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Shared status: one error slot; a new error replaces the old one
    pub last_error: Option<String>,

    // Chat state
    pub conversation: Conversation,
    pub chat_focus: ChatFocus,
    pub draft_cursor: usize,
    pub show_contract_editor: bool,
    pub contract_cursor: usize,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_task: Option<JoinHandle<Result<String, RemoteCallError>>>,
    pub history_length: Option<u64>,

    // Tools state
    pub tools_focus: ToolsFocus,
    pub name_input: String,
    pub name_cursor: usize,
    pub greeting: Option<String>,
    pub count: Option<u64>,
    pub prompt_input: String,
    pub prompt_cursor: usize,
    pub prompt_response: Option<String>,
    pub prompt_task: Option<JoinHandle<Result<String, RemoteCallError>>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Backend access
    pub backend: BackendClient,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let backend = BackendClient::new(&config.backend_url(), config.request_timeout());

        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,

            last_error: None,

            conversation: Conversation::new(),
            chat_focus: ChatFocus::Input,
            draft_cursor: 0,
            show_contract_editor: false,
            contract_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_task: None,
            history_length: None,

            tools_focus: ToolsFocus::Greet,
            name_input: String::new(),
            name_cursor: 0,
            greeting: None,
            count: None,
            prompt_input: String::new(),
            prompt_cursor: 0,
            prompt_response: None,
            prompt_task: None,

            animation_frame: 0,

            backend,
        }
    }

    /// Startup reads: counter value and server-side history length.
    /// Failures are surfaced, never fatal.
    pub async fn refresh_remote_state(&mut self) {
        match self.backend.get_count().await {
            Ok(count) => self.count = Some(count),
            Err(err) => self.report_error(format!("❌ Failed to fetch count: {err}")),
        }

        match self.backend.get_chat_history_length().await {
            Ok(length) => self.history_length = Some(length),
            Err(err) => tracing::warn!(error = %err, "could not fetch chat history length"),
        }
    }

    /// Route an error into the shared banner slot. New errors replace
    /// any prior unacknowledged one.
    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(%message, "surfaced to status banner");
        self.last_error = Some(message);
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// True while any gateway call is in flight; drives the spinner.
    pub fn busy(&self) -> bool {
        self.conversation.pending() || self.prompt_task.is_some()
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Pre-fill the draft with a canned prompt and focus the input.
    /// Does not submit.
    pub fn apply_quick_action(&mut self, index: usize) {
        if let Some((_, prompt)) = QUICK_ACTIONS.get(index) {
            let draft = self.conversation.draft_mut();
            draft.clear();
            draft.push_str(prompt);
            self.draft_cursor = prompt.chars().count();
            self.chat_focus = ChatFocus::Input;
            self.input_mode = InputMode::Editing;
        }
    }

    /// Apply results of any finished in-flight tasks. Responses are
    /// matched to their originating request by the task handle itself,
    /// so each result is handled exactly once.
    pub async fn poll_tasks(&mut self) {
        if self.chat_task.as_ref().is_some_and(|task| task.is_finished()) {
            if let Some(task) = self.chat_task.take() {
                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(RemoteCallError::Interrupted(err.to_string())),
                };
                match self.conversation.complete_submit(outcome) {
                    Ok(()) => self.scroll_chat_to_bottom(),
                    Err(err) => self.report_error(format!("❌ {err}")),
                }
            }
        }

        if self.prompt_task.as_ref().is_some_and(|task| task.is_finished()) {
            if let Some(task) = self.prompt_task.take() {
                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(RemoteCallError::Interrupted(err.to_string())),
                };
                match outcome {
                    Ok(response) => self.prompt_response = Some(response),
                    Err(err) => {
                        self.report_error(format!("❌ Failed to get response from LLM: {err}"))
                    }
                }
            }
        }
    }

    /// Scroll the transcript so the newest message (or the thinking
    /// indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for message in self.conversation.messages() {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in message.content.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.conversation.pending() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_action_fills_draft_without_submitting() {
        let mut app = App::new(&Config::new());

        app.apply_quick_action(1);

        assert_eq!(app.conversation.draft(), QUICK_ACTIONS[1].1);
        assert_eq!(app.conversation.messages().len(), 1);
        assert!(!app.conversation.pending());
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn out_of_range_quick_action_is_a_no_op() {
        let mut app = App::new(&Config::new());

        app.apply_quick_action(QUICK_ACTIONS.len());

        assert_eq!(app.conversation.draft(), "");
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn a_new_error_replaces_the_previous_one() {
        let mut app = App::new(&Config::new());

        app.report_error("first");
        app.report_error("second");

        assert_eq!(app.last_error.as_deref(), Some("second"));

        app.dismiss_error();
        assert!(app.last_error.is_none());
    }
}
