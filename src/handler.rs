use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, ChatFocus, InputMode, Screen, ToolsFocus};
use crate::chat::ChatError;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply one editing keystroke to a text buffer with a char-based
/// cursor. Returns false for keys this helper does not consume.
fn edit_buffer(buffer: &mut String, cursor: &mut usize, key: KeyEvent, allow_newline: bool) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < buffer.chars().count() {
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = buffer.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = buffer.chars().count();
        }
        KeyCode::Enter if allow_newline => {
            let byte_pos = char_to_byte_index(buffer, *cursor);
            buffer.insert(byte_pos, '\n');
            *cursor += 1;
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(buffer, *cursor);
            buffer.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await?,
        InputMode::Editing => handle_editing_mode(app, key).await?,
    }

    Ok(())
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        // Quit
        KeyCode::Char('q') => {
            app.should_quit = true;
            return Ok(());
        }

        // Switch between the chat and tools tabs; the original UI also
        // drops the error banner on a tab change.
        KeyCode::Tab => {
            app.screen = match app.screen {
                Screen::Chat => Screen::Tools,
                Screen::Tools => Screen::Chat,
            };
            app.dismiss_error();
            return Ok(());
        }

        // Dismiss the error banner
        KeyCode::Char('d') => {
            app.dismiss_error();
            return Ok(());
        }

        _ => {}
    }

    match app.screen {
        Screen::Chat => handle_chat_normal(app, key).await?,
        Screen::Tools => handle_tools_normal(app, key).await?,
    }
    Ok(())
}

async fn handle_chat_normal(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        // Edit the message draft
        KeyCode::Char('i') | KeyCode::Enter => {
            app.chat_focus = ChatFocus::Input;
            app.input_mode = InputMode::Editing;
            app.draft_cursor = app.conversation.draft().chars().count();
        }

        // Toggle the contract code editor
        KeyCode::Char('e') => {
            app.show_contract_editor = !app.show_contract_editor;
            if app.show_contract_editor {
                app.chat_focus = ChatFocus::ContractEditor;
                app.input_mode = InputMode::Editing;
                app.contract_cursor = app.conversation.contract_code().chars().count();
            } else {
                // Collapsing keeps the attached code, minus trailing
                // newline noise from editing.
                let code = app.conversation.contract_code().trim_end().to_string();
                app.conversation.set_contract_code(code);
                app.contract_cursor = 0;
                app.chat_focus = ChatFocus::Input;
            }
        }

        // Detach the contract code without opening the editor
        KeyCode::Char('u') => {
            app.conversation.clear_contract_code();
            app.contract_cursor = 0;
        }

        // Clear the conversation (server side first)
        KeyCode::Char('x') => clear_chat(app).await,

        // Quick actions pre-fill the draft, they never submit
        KeyCode::Char(c @ '1'..='4') => {
            app.apply_quick_action((c as usize) - ('1' as usize));
        }

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => {
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        KeyCode::Char('g') => {
            app.chat_scroll = 0;
        }
        KeyCode::Char('G') => {
            app.scroll_chat_to_bottom();
        }

        _ => {}
    }
    Ok(())
}

async fn handle_tools_normal(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            app.tools_focus = match app.tools_focus {
                ToolsFocus::Greet => ToolsFocus::Counter,
                ToolsFocus::Counter | ToolsFocus::Prompt => ToolsFocus::Prompt,
            };
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.tools_focus = match app.tools_focus {
                ToolsFocus::Prompt => ToolsFocus::Counter,
                ToolsFocus::Counter | ToolsFocus::Greet => ToolsFocus::Greet,
            };
        }

        KeyCode::Char('i') => start_tools_editing(app),

        KeyCode::Enter => match app.tools_focus {
            ToolsFocus::Counter => increment_counter(app).await,
            ToolsFocus::Greet | ToolsFocus::Prompt => start_tools_editing(app),
        },

        // Counter actions
        KeyCode::Char('+') => {
            if app.tools_focus == ToolsFocus::Counter {
                increment_counter(app).await;
            }
        }
        KeyCode::Char('r') => {
            if app.tools_focus == ToolsFocus::Counter {
                refresh_count(app).await;
            }
        }

        _ => {}
    }
    Ok(())
}

fn start_tools_editing(app: &mut App) {
    match app.tools_focus {
        ToolsFocus::Greet => {
            app.input_mode = InputMode::Editing;
            app.name_cursor = app.name_input.chars().count();
        }
        ToolsFocus::Prompt => {
            app.input_mode = InputMode::Editing;
            app.prompt_cursor = app.prompt_input.chars().count();
        }
        ToolsFocus::Counter => {}
    }
}

async fn handle_editing_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match app.screen {
        Screen::Chat => handle_chat_editing(app, key),
        Screen::Tools => handle_tools_editing(app, key).await?,
    }
    Ok(())
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match app.chat_focus {
        ChatFocus::Input => match key.code {
            KeyCode::Esc => {
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => submit_chat(app),
            _ => {
                edit_buffer(
                    app.conversation.draft_mut(),
                    &mut app.draft_cursor,
                    key,
                    false,
                );
            }
        },
        ChatFocus::ContractEditor => match key.code {
            KeyCode::Esc => {
                app.input_mode = InputMode::Normal;
                app.chat_focus = ChatFocus::Input;
            }
            // Ctrl+U discards the attached contract code
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.conversation.clear_contract_code();
                app.contract_cursor = 0;
            }
            _ => {
                edit_buffer(
                    app.conversation.contract_code_mut(),
                    &mut app.contract_cursor,
                    key,
                    true,
                );
            }
        },
    }
}

/// Move the conversation into pending and spawn the network leg, so the
/// event loop stays free to animate the thinking indicator. The result
/// is applied by `App::poll_tasks`.
fn submit_chat(app: &mut App) {
    match app.conversation.begin_submit() {
        Ok(call) => {
            app.draft_cursor = 0;
            app.input_mode = InputMode::Normal;
            app.scroll_chat_to_bottom();

            let backend = app.backend.clone();
            app.chat_task = Some(tokio::spawn(async move { call.dispatch(&backend).await }));
        }
        Err(ChatError::EmptyMessage) => app.report_error("⚠️ Please enter a message."),
        // A submission is already in flight; Enter is ignored until it resolves.
        Err(ChatError::RequestInFlight) => {}
        Err(err) => app.report_error(format!("❌ {err}")),
    }
}

async fn clear_chat(app: &mut App) {
    let backend = app.backend.clone();
    match app.conversation.clear(&backend).await {
        Ok(()) => {
            app.chat_scroll = 0;
            app.contract_cursor = 0;
            match backend.get_chat_history_length().await {
                Ok(length) => app.history_length = Some(length),
                Err(err) => tracing::warn!(error = %err, "could not refresh history length"),
            }
        }
        Err(ChatError::RequestInFlight) => {}
        Err(err) => app.report_error(format!("❌ Failed to clear chat: {err}")),
    }
}

async fn handle_tools_editing(app: &mut App, key: KeyEvent) -> Result<()> {
    if key.code == KeyCode::Esc {
        app.input_mode = InputMode::Normal;
        return Ok(());
    }

    match app.tools_focus {
        ToolsFocus::Greet => match key.code {
            KeyCode::Enter => fetch_greeting(app).await,
            _ => {
                edit_buffer(&mut app.name_input, &mut app.name_cursor, key, false);
            }
        },
        ToolsFocus::Prompt => match key.code {
            KeyCode::Enter => send_prompt(app),
            _ => {
                edit_buffer(&mut app.prompt_input, &mut app.prompt_cursor, key, false);
            }
        },
        ToolsFocus::Counter => {}
    }
    Ok(())
}

async fn fetch_greeting(app: &mut App) {
    if app.name_input.trim().is_empty() {
        app.report_error("⚠️ Please enter a name.");
        return;
    }

    match app.backend.greet(&app.name_input).await {
        Ok(greeting) => {
            app.greeting = Some(greeting);
            app.input_mode = InputMode::Normal;
        }
        Err(err) => app.report_error(format!("❌ Failed to fetch greeting: {err}")),
    }
}

async fn refresh_count(app: &mut App) {
    match app.backend.get_count().await {
        Ok(count) => app.count = Some(count),
        Err(err) => app.report_error(format!("❌ Failed to fetch count: {err}")),
    }
}

async fn increment_counter(app: &mut App) {
    match app.backend.increment().await {
        Ok(count) => app.count = Some(count),
        Err(err) => app.report_error(format!("❌ Failed to increment counter: {err}")),
    }
}

/// One LLM prompt at a time; the response lands in `App::poll_tasks`.
fn send_prompt(app: &mut App) {
    if app.prompt_task.is_some() {
        return;
    }

    let prompt = app.prompt_input.trim().to_string();
    if prompt.is_empty() {
        app.report_error("⚠️ Please enter a prompt.");
        return;
    }

    app.input_mode = InputMode::Normal;
    let backend = app.backend.clone();
    app.prompt_task = Some(tokio::spawn(async move { backend.prompt(&prompt).await }));
}
