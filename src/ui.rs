use std::time::{SystemTime, UNIX_EPOCH};

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::app::{App, ChatFocus, InputMode, Screen, ToolsFocus, QUICK_ACTIONS};
use crate::chat::Role;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, status banner (when needed), footer
    let banner_height = if app.last_error.is_some() || app.busy() {
        1
    } else {
        0
    };
    let [header_area, body_area, banner_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(banner_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Tools => render_tools_screen(app, frame, body_area),
    }

    if banner_height > 0 {
        render_banner(app, frame, banner_area);
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let tab_style = |active: bool| {
        if active {
            Style::default().fg(Color::White).bg(Color::Blue).bold()
        } else {
            Style::default().fg(Color::Gray)
        }
    };

    let title = Line::from(vec![
        Span::styled(
            " 🚀 Smart Contract Explainer ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(" Chat ", tab_style(app.screen == Screen::Chat)),
        Span::raw(" "),
        Span::styled(" Tools ", tab_style(app.screen == Screen::Tools)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let editor_height = if app.show_contract_editor { 10 } else { 0 };

    let [editor_area, transcript_area, quick_area, input_area] = Layout::vertical([
        Constraint::Length(editor_height),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(3),
    ])
    .areas(area);

    if app.show_contract_editor {
        render_contract_editor(app, frame, editor_area);
    }
    render_transcript(app, frame, transcript_area);
    render_quick_actions(app, frame, quick_area);
    render_chat_input(app, frame, input_area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let history = app
        .history_length
        .map(|n| format!(" · server history: {n}"))
        .unwrap_or_default();
    let contract_note = if app.conversation.has_contract_code() {
        " · ✅ contract attached"
    } else {
        ""
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" 🤖 Contract Expert Chat{history}{contract_note} "));

    // Store transcript dimensions for scroll calculations (inner size)
    let inner = block.inner(area);
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    let mut lines: Vec<Line> = Vec::new();
    for message in app.conversation.messages() {
        let (speaker, speaker_color) = match message.role {
            Role::User => ("You:", Color::Cyan),
            Role::Assistant => ("AI:", Color::Yellow),
        };
        lines.push(Line::from(vec![
            Span::styled(
                speaker,
                Style::default()
                    .fg(speaker_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", clock_time(message.created_at)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        for line in message.content.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
    }

    if app.conversation.pending() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{dots}"),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    // The conversation's own error, shown inline where the reply would
    // have appeared; the banner carries the app-level copy.
    if let Some(error) = app.conversation.last_error() {
        lines.push(Line::from(Span::styled(
            format!("⚠ {error}"),
            Style::default().fg(Color::Red),
        )));
    }

    let total_lines = lines.len() as u16;

    let transcript = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(transcript, area);

    if total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines as usize).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_contract_editor(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && app.chat_focus == ChatFocus::ContractEditor;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Smart Contract Code (optional) ");

    let code = app.conversation.contract_code();
    let body = if code.is_empty() {
        Text::from(Span::styled(
            "Paste your contract code here (Solidity, Rust, etc.)...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(
            code.lines()
                .map(|line| Line::from(line.to_string()))
                .collect::<Vec<_>>(),
        )
    };

    let editor = Paragraph::new(body).block(block);
    frame.render_widget(editor, area);

    if editing {
        // Cursor position from the char offset; the editor does not wrap
        let mut row = 0u16;
        let mut col = 0u16;
        for (i, ch) in code.chars().enumerate() {
            if i == app.contract_cursor {
                break;
            }
            if ch == '\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        frame.set_cursor_position((area.x + 1 + col, area.y + 1 + row));
    }
}

fn render_quick_actions(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().fg(Color::Black).bg(Color::Cyan).bold();
    let label_style = Style::default().fg(Color::Gray);

    let mut spans = Vec::new();
    for (index, (label, _)) in QUICK_ACTIONS.iter().enumerate() {
        spans.push(Span::styled(format!(" {} ", index + 1), key_style));
        spans.push(Span::styled(format!(" {label}  "), label_style));
    }
    if app.conversation.has_contract_code() {
        spans.push(Span::styled(" u ", key_style));
        spans.push(Span::styled(" detach contract ", label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && app.chat_focus == ChatFocus::Input;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message (Enter to send) ");

    let input = Paragraph::new(app.conversation.draft())
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    if editing {
        frame.set_cursor_position((area.x + 1 + app.draft_cursor as u16, area.y + 1));
    }
}

fn render_tools_screen(app: &App, frame: &mut Frame, area: Rect) {
    let [greet_area, counter_area, prompt_area] = Layout::vertical([
        Constraint::Length(6),
        Constraint::Length(4),
        Constraint::Min(0),
    ])
    .areas(area);

    render_greet_card(app, frame, greet_area);
    render_counter_card(app, frame, counter_area);
    render_prompt_card(app, frame, prompt_area);
}

fn card_border(app: &App, focus: ToolsFocus) -> Color {
    if app.tools_focus == focus {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

fn render_greet_card(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(card_border(app, ToolsFocus::Greet)))
        .title(" Greeting ");

    let mut lines = vec![Line::from(vec![
        Span::styled("Name: ", Style::default().fg(Color::Gray)),
        Span::styled(app.name_input.as_str(), Style::default().fg(Color::Cyan)),
    ])];
    if let Some(greeting) = &app.greeting {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            greeting.as_str(),
            Style::default().fg(Color::Green).bold(),
        )));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);

    if app.input_mode == InputMode::Editing && app.tools_focus == ToolsFocus::Greet {
        frame.set_cursor_position((area.x + 1 + 6 + app.name_cursor as u16, area.y + 1));
    }
}

fn render_counter_card(app: &App, frame: &mut Frame, area: Rect) {
    let count = app
        .count
        .map(|n| n.to_string())
        .unwrap_or_else(|| "—".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(card_border(app, ToolsFocus::Counter)))
        .title(format!(" Counter: {count} "));

    let hints = Line::from(vec![
        Span::styled("+", Style::default().fg(Color::Yellow).bold()),
        Span::styled(" increment  ", Style::default().fg(Color::Gray)),
        Span::styled("r", Style::default().fg(Color::Yellow).bold()),
        Span::styled(" refresh", Style::default().fg(Color::Gray)),
    ]);

    frame.render_widget(Paragraph::new(hints).block(block), area);
}

fn render_prompt_card(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(card_border(app, ToolsFocus::Prompt)))
        .title(" LLM Prompt ");

    let mut lines = vec![Line::from(vec![
        Span::styled("Ask: ", Style::default().fg(Color::Gray)),
        Span::styled(app.prompt_input.as_str(), Style::default().fg(Color::Cyan)),
    ])];

    if app.prompt_task.is_some() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Thinking{dots}"),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    } else if let Some(response) = &app.prompt_response {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Response:",
            Style::default().fg(Color::Yellow).bold(),
        )));
        for line in response.lines() {
            lines.push(Line::from(line.to_string()));
        }
    }

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );

    if app.input_mode == InputMode::Editing && app.tools_focus == ToolsFocus::Prompt {
        frame.set_cursor_position((area.x + 1 + 5 + app.prompt_cursor as u16, area.y + 1));
    }
}

/// Shared status line: one error slot, otherwise the loading indicator.
fn render_banner(app: &App, frame: &mut Frame, area: Rect) {
    let line = if let Some(error) = &app.last_error {
        Line::from(vec![
            Span::styled(
                format!(" {error} "),
                Style::default().fg(Color::White).bg(Color::Red).bold(),
            ),
            Span::styled(" d to dismiss", Style::default().fg(Color::DarkGray)),
        ])
    } else {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::from(Span::styled(
            format!(" ⏳ Working{dots}"),
            Style::default().fg(Color::Yellow),
        ))
    };

    frame.render_widget(Paragraph::new(line), area);
}

/// Wall-clock time of day (UTC) for transcript lines.
fn clock_time(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => " CHAT ",
        (Screen::Chat, InputMode::Editing) => " EDIT ",
        (Screen::Tools, InputMode::Normal) => " TOOLS ",
        (Screen::Tools, InputMode::Editing) => " EDIT ",
    };

    let hints = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => {
            " i message · e contract · 1-4 quick · x clear · j/k scroll · Tab tools · q quit"
        }
        (Screen::Chat, InputMode::Editing) => " Enter send · Esc done",
        (Screen::Tools, InputMode::Normal) => {
            " j/k focus · Enter use · +/r counter · Tab chat · q quit"
        }
        (Screen::Tools, InputMode::Editing) => " Enter submit · Esc done",
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::Gray)),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clock_time_formats_hours_minutes_seconds() {
        let midnight = UNIX_EPOCH;
        assert_eq!(clock_time(midnight), "00:00:00");

        let later = UNIX_EPOCH + Duration::from_secs(3661);
        assert_eq!(clock_time(later), "01:01:01");
    }
}
