use std::path::Path;

use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::analysis::{
    category_breakdown, monthly_overview, recent_transactions, Summary, UploadDashboard, ViewState,
};
use crate::error::{FinwiseError, Result};
use crate::extractor::{extractor_for, StatementExtractor};
use crate::fmt::{money, month_label, percent};
use crate::models::{TransactionType, UploadHistoryItem};
use crate::session::{SessionContext, SessionStatus};
use crate::settings::shellexpand_path;
use crate::tui::{
    money_span, run_screen, wrap_text, Screen, ScreenAction, AMOUNT_NEG_STYLE, AMOUNT_POS_STYLE,
    FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE,
};
use crate::upload::{list_uploads, upload_statement};

const RECENT_ROWS: usize = 8;

pub fn run(session: &mut SessionContext, extractor_url: Option<&str>) -> Result<()> {
    session.require_services()?;
    match session.status() {
        SessionStatus::Authenticated(_) => {}
        SessionStatus::Error(e) => return Err(FinwiseError::Auth(e)),
        SessionStatus::Loading | SessionStatus::Anonymous => return Err(FinwiseError::NotSignedIn),
    }
    let mut screen = UploadScreen::new(session, extractor_for(extractor_url));
    run_screen(&mut screen)
}

struct UploadScreen<'a> {
    session: &'a mut SessionContext,
    extractor: Box<dyn StatementExtractor>,
    dashboard: UploadDashboard,
    path: String,
    history: Vec<UploadHistoryItem>,
    selection: usize,
    /// File name of the set being analyzed.
    analyzing: Option<String>,
    status_message: Option<(String, bool)>, // (message, is_error)
}

impl<'a> UploadScreen<'a> {
    fn new(session: &'a mut SessionContext, extractor: Box<dyn StatementExtractor>) -> Self {
        Self {
            session,
            extractor,
            dashboard: UploadDashboard::new(),
            path: String::new(),
            history: Vec::new(),
            selection: 0,
            analyzing: None,
            status_message: None,
        }
    }

    fn greeting(&self) -> String {
        let name = self
            .session
            .user()
            .and_then(|u| u.display_name.as_deref().or(u.email.as_deref()))
            .unwrap_or("there");
        format!(" finwise: hello, {name}")
    }

    fn submit_upload(&mut self) {
        let trimmed = self.path.trim();
        if trimmed.is_empty() {
            self.status_message = Some(("Path is required".into(), true));
            return;
        }
        let resolved = shellexpand_path(trimmed);
        match upload_statement(self.session, self.extractor.as_ref(), Path::new(&resolved)) {
            Ok(item) => {
                self.status_message = None;
                self.path.clear();
                self.analyzing = Some(item.file_name);
                self.dashboard.on_upload_success(item.transactions);
            }
            Err(e) => self.status_message = Some((e.to_string(), true)),
        }
    }

    fn open_history(&mut self) {
        let Some(services) = self.session.services() else {
            return;
        };
        let Some(user) = self.session.user() else {
            return;
        };
        match list_uploads(services.store.as_ref(), &user.uid) {
            Ok(items) => {
                self.history = items;
                self.selection = 0;
                self.status_message = None;
                self.dashboard.view_history();
            }
            Err(e) => self.status_message = Some((format!("Could not load history: {e}"), true)),
        }
    }

    /// Apply queued auth events. A sign-out drops whatever was on screen.
    fn sync_session(&mut self) {
        if self.session.sync() && self.session.user().is_none() {
            self.dashboard.reset();
            self.history.clear();
            self.analyzing = None;
            self.status_message = Some(("Signed out: sign in again to upload".into(), true));
        }
    }

    fn open_selected(&mut self) {
        if let Some(item) = self.history.get(self.selection) {
            self.analyzing = Some(item.file_name.clone());
            self.dashboard.view_analysis(item.transactions.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw_form(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                " Upload a Bank Statement",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("   PDF or CSV. Transactions are extracted and categorized."),
            Line::from(""),
            Line::from(vec![
                Span::styled("   File  ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(format!("{}_", self.path), Style::default().fg(Color::Cyan)),
            ]),
        ];
        if let Some((msg, is_error)) = &self.status_message {
            let color = if *is_error { Color::Red } else { Color::Green };
            let (wrapped, _) = wrap_text(msg, area.width.saturating_sub(6) as usize);
            lines.push(Line::from(""));
            for line in wrapped.lines() {
                lines.push(Line::from(Span::styled(
                    format!("   {line}"),
                    Style::default().fg(color),
                )));
            }
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_history(&self, frame: &mut Frame, area: Rect) {
        if self.history.is_empty() {
            frame.render_widget(
                Paragraph::new("\n   No uploads yet. Press Esc and upload a statement."),
                area,
            );
            return;
        }
        let rows: Vec<Row> = self
            .history
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let row = Row::new(vec![
                    Cell::from(item.file_name.clone()),
                    Cell::from(item.file_type.key().to_uppercase()),
                    Cell::from(item.upload_date.get(..10).unwrap_or(item.upload_date.as_str()).to_string()),
                    Cell::from(item.transaction_count.to_string()),
                ]);
                if i == self.selection {
                    row.style(SELECTED_STYLE)
                } else {
                    row
                }
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Fill(1),
                Constraint::Length(6),
                Constraint::Length(12),
                Constraint::Length(14),
            ],
        )
        .header(
            Row::new(vec!["File", "Type", "Uploaded", "Transactions"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().title(" Upload History").borders(Borders::NONE));
        frame.render_widget(table, area);
    }

    fn draw_analysis(&self, frame: &mut Frame, area: Rect) {
        let summary = self.dashboard.summary(self.session.user());
        let [cards_area, chart_area, lists_area] = Layout::vertical([
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Fill(1),
        ])
        .areas(area);

        self.draw_cards(frame, cards_area, &summary);
        draw_monthly_chart(frame, chart_area, &summary);

        let [categories_area, recent_area] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
                .areas(lists_area);
        draw_categories(frame, categories_area, &summary);
        draw_recent(frame, recent_area, &summary);
    }

    fn draw_cards(&self, frame: &mut Frame, area: Rect, summary: &Summary) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let title = self.analyzing.as_deref().unwrap_or("Analysis");
        let lines = vec![
            Line::from(Span::styled(format!(" {title}"), bold)),
            Line::from(""),
            Line::from(vec![
                Span::styled("   Total Balance   ", bold),
                money_span(summary.total_balance),
            ]),
            Line::from(vec![
                Span::raw("   Total Income    "),
                Span::styled(money(summary.total_income), AMOUNT_POS_STYLE),
            ]),
            Line::from(vec![
                Span::raw("   Total Expenses  "),
                Span::styled(money(summary.total_expenses), AMOUNT_NEG_STYLE),
            ]),
            Line::from(vec![
                Span::raw("   Savings Rate    "),
                Span::raw(percent(summary.savings_rate)),
            ]),
        ];
        frame.render_widget(Paragraph::new(lines), area);
    }
}

fn draw_monthly_chart(frame: &mut Frame, area: Rect, summary: &Summary) {
    let months = monthly_overview(&summary.incomes, &summary.expenses);
    if months.is_empty() {
        return;
    }
    let income_style = Style::default().fg(Color::Rgb(80, 220, 100));
    let expense_style = Style::default().fg(Color::Red);
    let groups: Vec<BarGroup> = months
        .iter()
        .map(|m| {
            let bars = vec![
                Bar::default().value(m.income.round() as u64).style(income_style),
                Bar::default().value(m.expenses.round() as u64).style(expense_style),
            ];
            BarGroup::default()
                .label(Line::from(month_label(&m.month)))
                .bars(&bars)
        })
        .collect();

    let block = Block::default()
        .title(" Monthly Overview")
        .title_style(Style::default().add_modifier(Modifier::BOLD))
        .borders(Borders::NONE);
    let mut chart = BarChart::default()
        .block(block)
        .bar_width(3)
        .bar_gap(0)
        .group_gap(2);
    for group in &groups {
        chart = chart.data(group.clone());
    }
    frame.render_widget(chart, area);
}

fn draw_categories(frame: &mut Frame, area: Rect, summary: &Summary) {
    let rows: Vec<Row> = category_breakdown(&summary.expenses)
        .into_iter()
        .map(|(category, total)| {
            Row::new(vec![
                Cell::from(category.name()),
                Cell::from(Span::styled(money(total), AMOUNT_NEG_STYLE)),
            ])
        })
        .collect();
    let table = Table::new(rows, [Constraint::Fill(1), Constraint::Length(14)])
        .block(Block::default().title(" Expenses by Category").borders(Borders::NONE));
    frame.render_widget(table, area);
}

fn draw_recent(frame: &mut Frame, area: Rect, summary: &Summary) {
    let rows: Vec<Row> = recent_transactions(&summary.incomes, &summary.expenses, RECENT_ROWS)
        .into_iter()
        .map(|t| {
            let signed = match t.kind {
                TransactionType::Income => t.amount,
                TransactionType::Expense => -t.amount,
            };
            Row::new(vec![
                Cell::from(t.date),
                Cell::from(t.description.unwrap_or_default()),
                Cell::from(money_span(signed)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [Constraint::Length(11), Constraint::Fill(1), Constraint::Length(14)],
    )
    .block(Block::default().title(" Recent Transactions").borders(Borders::NONE));
    frame.render_widget(table, area);
}

impl Screen for UploadScreen<'_> {
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);
        let [header_area, sep, content_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(Paragraph::new(self.greeting()).style(HEADER_STYLE), header_area);
        let sep_line = "\u{2501}".repeat(area.width as usize);
        frame.render_widget(Paragraph::new(sep_line.as_str()).style(border_style), sep);

        let hints = match self.dashboard.view() {
            ViewState::Form => {
                self.draw_form(frame, content_area);
                " Enter=upload  Tab=history  Esc=quit"
            }
            ViewState::History => {
                self.draw_history(frame, content_area);
                " \u{2191}\u{2193}=select  Enter=analyze  Esc=back  q=quit"
            }
            ViewState::Analysis => {
                self.draw_analysis(frame, content_area);
                " r=new upload  q=quit"
            }
        };
        frame.render_widget(Paragraph::new(hints).style(FOOTER_STYLE), hints_area);
    }

    fn handle_key(&mut self, code: KeyCode) -> ScreenAction {
        self.sync_session();
        match self.dashboard.view() {
            ViewState::Form => match code {
                KeyCode::Esc => return ScreenAction::Close,
                KeyCode::Tab => self.open_history(),
                KeyCode::Enter => self.submit_upload(),
                KeyCode::Backspace => {
                    self.path.pop();
                    self.status_message = None;
                }
                KeyCode::Char(c) => {
                    self.path.push(c);
                    self.status_message = None;
                }
                _ => {}
            },
            ViewState::History => match code {
                KeyCode::Char('q') => return ScreenAction::Close,
                KeyCode::Esc | KeyCode::Char('b') => self.dashboard.back_to_form(),
                KeyCode::Up | KeyCode::Char('k') => self.selection = self.selection.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.selection + 1 < self.history.len() {
                        self.selection += 1;
                    }
                }
                KeyCode::Enter => self.open_selected(),
                _ => {}
            },
            ViewState::Analysis => match code {
                KeyCode::Char('q') => return ScreenAction::Close,
                KeyCode::Esc | KeyCode::Char('r') => {
                    self.analyzing = None;
                    self.dashboard.reset();
                }
                _ => {}
            },
        }
        ScreenAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::extractor::CsvExtractor;
    use crate::services::{ExecutionContext, ServiceInitializer};

    fn signed_in_session(dir: &Path) -> SessionContext {
        let config = BackendConfig {
            api_key: Some("key".into()),
            project_id: Some("dashboard-test".into()),
            ..Default::default()
        };
        let handles = ServiceInitializer::new(config, ExecutionContext::Client, dir.join("data"))
            .initialize()
            .unwrap();
        handles
            .auth
            .create_user_with_email_and_password("ada@example.com", "secret123")
            .unwrap();
        let mut session = SessionContext::mount(Some(handles));
        session.sync();
        session
    }

    fn type_text(screen: &mut UploadScreen, text: &str) {
        for c in text.chars() {
            screen.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_upload_history_and_reset_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = signed_in_session(dir.path());
        let file = dir.path().join("jan.csv");
        std::fs::write(&file, "Date,Description,Amount\n2025-01-31,PAYROLL,1000\n2025-01-05,RENT,-400\n").unwrap();

        let mut screen = UploadScreen::new(&mut session, Box::new(CsvExtractor));
        type_text(&mut screen, &file.to_string_lossy());
        screen.handle_key(KeyCode::Enter);
        assert_eq!(screen.dashboard.view(), ViewState::Analysis);
        assert_eq!(screen.dashboard.summary(screen.session.user()).total_balance, 600.0);

        screen.handle_key(KeyCode::Char('r'));
        assert_eq!(screen.dashboard.view(), ViewState::Form);
        assert!(screen.dashboard.analyzed().is_none());

        screen.handle_key(KeyCode::Tab);
        assert_eq!(screen.dashboard.view(), ViewState::History);
        assert_eq!(screen.history.len(), 1);
        screen.handle_key(KeyCode::Enter);
        assert_eq!(screen.dashboard.view(), ViewState::Analysis);
        assert_eq!(screen.analyzing.as_deref(), Some("jan.csv"));
    }

    #[test]
    fn test_failed_upload_stays_on_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = signed_in_session(dir.path());
        let mut screen = UploadScreen::new(&mut session, Box::new(CsvExtractor));

        screen.handle_key(KeyCode::Enter);
        assert_eq!(screen.status_message.as_ref().map(|m| m.1), Some(true));

        type_text(&mut screen, "/no/such/file.csv");
        screen.handle_key(KeyCode::Enter);
        assert_eq!(screen.dashboard.view(), ViewState::Form);
        assert!(screen.status_message.is_some());
    }

    #[test]
    fn test_history_back_and_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = signed_in_session(dir.path());
        let mut screen = UploadScreen::new(&mut session, Box::new(CsvExtractor));
        screen.handle_key(KeyCode::Tab);
        assert_eq!(screen.dashboard.view(), ViewState::History);
        screen.handle_key(KeyCode::Esc);
        assert_eq!(screen.dashboard.view(), ViewState::Form);
        assert!(matches!(screen.handle_key(KeyCode::Esc), ScreenAction::Close));
    }

    #[test]
    fn test_sign_out_clears_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = signed_in_session(dir.path());
        let auth = session.services().unwrap().auth.clone();
        let file = dir.path().join("jan.csv");
        std::fs::write(&file, "Date,Description,Amount\n2025-01-31,PAYROLL,1000\n").unwrap();

        let mut screen = UploadScreen::new(&mut session, Box::new(CsvExtractor));
        type_text(&mut screen, &file.to_string_lossy());
        screen.handle_key(KeyCode::Enter);
        assert_eq!(screen.dashboard.view(), ViewState::Analysis);

        auth.sign_out().unwrap();
        screen.handle_key(KeyCode::Char('x'));
        assert_eq!(screen.dashboard.view(), ViewState::Form);
        assert!(screen.dashboard.analyzed().is_none());
        assert!(screen.session.user().is_none());
        assert_eq!(screen.status_message.as_ref().map(|m| m.1), Some(true));
    }
}
