//! Board state built from coordinator [`Event`]s, and its text rendering.
//!
//! The view never talks to the backend: it only folds events into cards, so
//! it can be driven by the live coordinator or by a recorded event list.

use std::fmt::Write as _;

use crossterm::style::Stylize;
use indexmap::IndexMap;
use unicode_width::UnicodeWidthStr;

use crate::engine::{Event, RefreshReport};
use crate::render::{RunSummary, StatusCategory};
use crate::types::{RepositorySummary, TrackedRepository};
use crate::util::{format_date, format_duration};

pub const EMPTY_REPO_MESSAGE: &str = "No workflows found for this repository.";
pub const EMPTY_BOARD_MESSAGE: &str =
    "No repositories tracked. Add one with `actions-board add owner/name`.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardState {
    Loading,
    Ready,
    /// The repository has no workflows.
    Empty,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowState {
    Loading,
    Summary(Box<RunSummary>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRow {
    pub id: u64,
    pub name: String,
    pub state: RowState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCard {
    pub repo: TrackedRepository,
    pub state: CardState,
    pub workflows: IndexMap<u64, WorkflowRow>,
}

impl RepoCard {
    fn loading(repo: TrackedRepository) -> Self {
        Self {
            repo,
            state: CardState::Loading,
            workflows: IndexMap::new(),
        }
    }

    fn actions_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/actions",
            self.repo.owner, self.repo.name
        )
    }
}

/// One card per tracked repository, in registry order.
#[derive(Debug, Default)]
pub struct BoardView {
    cards: IndexMap<String, RepoCard>,
    notice: Option<String>,
    stopped: Option<String>,
    last_report: Option<RefreshReport>,
}

impl BoardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> impl Iterator<Item = &RepoCard> {
        self.cards.values()
    }

    /// Look up a card by `owner/name`, ignoring case.
    pub fn card(&self, full_name: &str) -> Option<&RepoCard> {
        self.cards.get(&full_name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Latest polling warning, cleared by the next completed cycle.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn stopped_reason(&self) -> Option<&str> {
        self.stopped.as_deref()
    }

    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report
    }

    fn card_mut(&mut self, repo: &TrackedRepository) -> &mut RepoCard {
        self.cards
            .entry(repo.key())
            .or_insert_with(|| RepoCard::loading(repo.clone()))
    }

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::RefreshStarted {
                repositories,
                background,
            } => {
                let mut previous = std::mem::take(&mut self.cards);
                for repo in repositories {
                    let card = match previous.shift_remove(&repo.key()) {
                        Some(card) if *background => card,
                        _ => RepoCard::loading(repo.clone()),
                    };
                    self.cards.insert(repo.key(), card);
                }
            }
            Event::RefreshCompleted { report } => {
                self.last_report = Some(*report);
                self.notice = None;
            }
            Event::RepoLoading { repo } => {
                let card = self.card_mut(repo);
                card.state = CardState::Loading;
                card.workflows.clear();
            }
            Event::WorkflowsFetched { repo, workflows } => {
                let card = self.card_mut(repo);
                if workflows.is_empty() {
                    card.state = CardState::Empty;
                    card.workflows.clear();
                    return;
                }
                let mut old = std::mem::take(&mut card.workflows);
                for wf in workflows {
                    let row = match old.shift_remove(&wf.id) {
                        Some(mut row) => {
                            row.name.clone_from(&wf.name);
                            row
                        }
                        None => WorkflowRow {
                            id: wf.id,
                            name: wf.name.clone(),
                            state: RowState::Loading,
                        },
                    };
                    card.workflows.insert(wf.id, row);
                }
                card.state = CardState::Ready;
            }
            Event::RunSummaryReady {
                repo,
                workflow_id,
                summary,
            } => {
                if let Some(row) = self.row_mut(repo, *workflow_id) {
                    row.state = RowState::Summary(Box::new(summary.clone()));
                }
            }
            Event::WorkflowError {
                repo,
                workflow_id,
                message,
                ..
            } => {
                if let Some(row) = self.row_mut(repo, *workflow_id) {
                    row.state = RowState::Error(message.clone());
                }
            }
            Event::RepoError { repo, message } => {
                let card = self.card_mut(repo);
                card.state = CardState::Error(message.clone());
                card.workflows.clear();
            }
            Event::RepoRemoved { repo } => {
                self.cards.shift_remove(&repo.key());
            }
            Event::PollingRestarted {
                attempt,
                delay,
                error,
            } => {
                self.notice = Some(format!(
                    "Auto-refresh failed ({error}); retrying in {}s (attempt {attempt})",
                    delay.as_secs()
                ));
            }
            Event::PollingStopped { reason } => {
                self.stopped = Some(reason.clone());
            }
        }
    }

    fn row_mut(&mut self, repo: &TrackedRepository, workflow_id: u64) -> Option<&mut WorkflowRow> {
        self.cards
            .get_mut(&repo.key())?
            .workflows
            .get_mut(&workflow_id)
    }

    /// Plain-text board, one block per repository.
    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        if let Some(reason) = &self.stopped {
            let text = format!("Auto-refresh stopped: {reason}");
            let _ = writeln!(out, "{}\n", paint(&text, StatusCategory::Failure, color));
        } else if let Some(notice) = &self.notice {
            let _ = writeln!(out, "{}\n", paint(notice, StatusCategory::Warning, color));
        }
        if self.cards.is_empty() {
            out.push_str(EMPTY_BOARD_MESSAGE);
            out.push('\n');
            return out;
        }

        for (idx, card) in self.cards.values().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            let title = if color {
                card.repo.full_name.as_str().bold().to_string()
            } else {
                card.repo.full_name.clone()
            };
            let _ = writeln!(out, "{title}");
            match &card.state {
                CardState::Loading => {
                    let _ = writeln!(out, "  Loading workflows…");
                }
                CardState::Empty => {
                    let _ = writeln!(out, "  {EMPTY_REPO_MESSAGE}");
                }
                CardState::Error(message) => {
                    let _ = writeln!(out, "  {}", paint(message, StatusCategory::Failure, color));
                }
                CardState::Ready => render_rows(&mut out, card, color),
            }
        }
        out
    }
}

fn render_rows(out: &mut String, card: &RepoCard, color: bool) {
    let name_width = card
        .workflows
        .values()
        .map(|r| r.name.width())
        .max()
        .unwrap_or(0);

    for row in card.workflows.values() {
        let name = pad(&row.name, name_width);
        match &row.state {
            RowState::Loading => {
                let icon = paint("…", StatusCategory::Neutral, color);
                let _ = writeln!(out, "  {icon} {name}  loading…");
            }
            RowState::Error(message) => {
                let _ = writeln!(
                    out,
                    "  {} {name}  {}",
                    paint("\u{2716}", StatusCategory::Failure, color),
                    paint(message, StatusCategory::Failure, color)
                );
            }
            RowState::Summary(summary) if summary.is_no_runs() => {
                let _ = writeln!(
                    out,
                    "  {} {name}  {}",
                    paint("-", StatusCategory::Neutral, color),
                    paint(&summary.display_status, StatusCategory::Neutral, color)
                );
            }
            RowState::Summary(summary) => {
                let category = summary.status_category;
                let mut line = format!(
                    "  {} {name}  {}  {}",
                    paint(status_icon(&summary.display_status, category), category, color),
                    paint(&pad(&summary.display_status, 11), category, color),
                    summary.branch,
                );
                if let Some(n) = summary.run_number {
                    let _ = write!(line, "  #{n}");
                }
                let _ = write!(line, "  {}", summary.actor);
                if let Some(date) = &summary.formatted_date {
                    let _ = write!(line, "  {date}");
                }
                if let Some(secs) = summary.duration_seconds {
                    let _ = write!(line, "  ({})", format_duration(secs));
                }
                let _ = writeln!(out, "{line}");

                let indent = " ".repeat(name_width + 5);
                let _ = writeln!(out, "{indent}{}", summary.short_commit_message);
                let url = summary
                    .html_url
                    .clone()
                    .unwrap_or_else(|| card.actions_url());
                let _ = writeln!(out, "{indent}{}", paint(&url, StatusCategory::Neutral, color));
            }
        }
    }
}

fn status_icon(display_status: &str, category: StatusCategory) -> &'static str {
    match (display_status, category) {
        ("cancelled", _) => "\u{2715}",
        ("queued" | "pending" | "waiting" | "requested", _) => "\u{25cb}",
        (_, StatusCategory::Success) => "\u{2714}",
        (_, StatusCategory::Failure) => "\u{2716}",
        (_, StatusCategory::Warning) => "\u{21ba}",
        (_, StatusCategory::Neutral) => "-",
        (_, StatusCategory::Info) => "?",
    }
}

fn paint(text: &str, category: StatusCategory, color: bool) -> String {
    if !color {
        return text.to_owned();
    }
    match category {
        StatusCategory::Success => text.green().to_string(),
        StatusCategory::Failure => text.red().to_string(),
        StatusCategory::Warning => text.yellow().to_string(),
        StatusCategory::Neutral => text.dark_grey().to_string(),
        StatusCategory::Info => text.blue().to_string(),
    }
}

/// Right-pad to `width` display columns.
fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

/// Tracked repositories, one per line.
pub fn render_repo_list(repos: &[TrackedRepository]) -> String {
    if repos.is_empty() {
        return format!("{EMPTY_BOARD_MESSAGE}\n");
    }
    repos.iter().fold(String::new(), |mut out, r| {
        let _ = writeln!(out, "{}", r.full_name);
        out
    })
}

/// Search results, marking the ones already on the board.
pub fn render_search_results(
    repos: &[RepositorySummary],
    tracked: &[TrackedRepository],
    color: bool,
) -> String {
    if repos.is_empty() {
        return "No repositories found.\n".to_owned();
    }
    let name_width = repos.iter().map(|r| r.full_name.width()).max().unwrap_or(0);

    let mut out = String::new();
    for repo in repos {
        let mut line = pad(&repo.full_name, name_width);
        if repo.private {
            line.push_str("  private");
        }
        let _ = write!(line, "  \u{2605} {}", repo.stargazers_count);
        if let Some(lang) = &repo.language {
            let _ = write!(line, "  {lang}");
        }
        if let Some(updated) = &repo.updated_at {
            let _ = write!(line, "  updated {}", format_date(updated, "relative"));
        }
        if tracked
            .iter()
            .any(|t| t.matches(&repo.owner.login, &repo.name))
        {
            let _ = write!(line, "  {}", paint("Added", StatusCategory::Success, color));
        }
        let _ = writeln!(out, "{line}");
        if let Some(desc) = repo.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "  {desc}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::render::RunSummary;
    use crate::types::WorkflowDefinition;

    fn repo(full: &str) -> TrackedRepository {
        TrackedRepository::from_full_name(full).unwrap()
    }

    fn wf(id: u64, name: &str) -> WorkflowDefinition {
        WorkflowDefinition {
            id,
            name: name.to_owned(),
            path: None,
        }
    }

    fn started(repos: &[&str], background: bool) -> Event {
        Event::RefreshStarted {
            repositories: repos.iter().map(|r| repo(r)).collect(),
            background,
        }
    }

    #[test]
    fn foreground_refresh_resets_cards_in_registry_order() {
        let mut view = BoardView::new();
        view.apply(&started(&["a/x", "b/y"], false));
        view.apply(&Event::WorkflowsFetched {
            repo: repo("a/x"),
            workflows: vec![wf(1, "CI")],
        });
        assert_eq!(view.card("a/x").unwrap().state, CardState::Ready);

        view.apply(&started(&["b/y", "a/x"], false));
        let order: Vec<_> = view.cards().map(|c| c.repo.full_name.as_str()).collect();
        assert_eq!(order, ["b/y", "a/x"]);
        assert_eq!(view.card("a/x").unwrap().state, CardState::Loading);
    }

    #[test]
    fn background_refresh_keeps_existing_rows() {
        let mut view = BoardView::new();
        view.apply(&started(&["a/x"], false));
        view.apply(&Event::WorkflowsFetched {
            repo: repo("a/x"),
            workflows: vec![wf(1, "CI"), wf(2, "Release")],
        });
        view.apply(&Event::RunSummaryReady {
            repo: repo("a/x"),
            workflow_id: 1,
            summary: RunSummary::no_runs("CI"),
        });

        view.apply(&started(&["a/x", "c/z"], true));
        view.apply(&Event::WorkflowsFetched {
            repo: repo("a/x"),
            workflows: vec![wf(1, "CI")],
        });
        let card = view.card("A/X").unwrap();
        assert_eq!(card.workflows.len(), 1);
        assert!(matches!(card.workflows[&1].state, RowState::Summary(_)));
        assert_eq!(view.card("c/z").unwrap().state, CardState::Loading);
    }

    #[test]
    fn empty_repository_renders_message() {
        let mut view = BoardView::new();
        view.apply(&started(&["a/x"], false));
        view.apply(&Event::WorkflowsFetched {
            repo: repo("a/x"),
            workflows: Vec::new(),
        });
        assert_eq!(view.card("a/x").unwrap().state, CardState::Empty);
        assert!(view.render(false).contains(EMPTY_REPO_MESSAGE));
    }

    #[test]
    fn errors_are_scoped_to_their_card_and_row() {
        let mut view = BoardView::new();
        view.apply(&started(&["a/x", "b/y"], false));
        view.apply(&Event::RepoError {
            repo: repo("a/x"),
            message: "Failed to load workflows: HTTP error! status: 500".into(),
        });
        view.apply(&Event::WorkflowsFetched {
            repo: repo("b/y"),
            workflows: vec![wf(7, "CI")],
        });
        view.apply(&Event::WorkflowError {
            repo: repo("b/y"),
            workflow_id: 7,
            workflow_name: "CI".into(),
            message: "Failed to load workflow runs: boom".into(),
        });

        assert!(matches!(view.card("a/x").unwrap().state, CardState::Error(_)));
        let card = view.card("b/y").unwrap();
        assert_eq!(card.state, CardState::Ready);
        assert!(matches!(card.workflows[&7].state, RowState::Error(_)));
        let text = view.render(false);
        assert!(text.contains("status: 500"));
        assert!(text.contains("Failed to load workflow runs: boom"));
    }

    #[test]
    fn removal_drops_the_card() {
        let mut view = BoardView::new();
        view.apply(&started(&["a/x", "b/y"], false));
        view.apply(&Event::RepoRemoved { repo: repo("A/X") });
        assert_eq!(view.len(), 1);
        assert!(view.card("a/x").is_none());
    }

    #[test]
    fn summary_without_url_links_to_actions_page() {
        let mut view = BoardView::new();
        view.apply(&started(&["octocat/Hello-World"], false));
        view.apply(&Event::WorkflowsFetched {
            repo: repo("octocat/Hello-World"),
            workflows: vec![wf(1, "CI")],
        });
        let summary = RunSummary {
            run_id: Some(5),
            display_status: "success".into(),
            status_category: StatusCategory::Success,
            ..RunSummary::no_runs("CI")
        };
        view.apply(&Event::RunSummaryReady {
            repo: repo("octocat/Hello-World"),
            workflow_id: 1,
            summary,
        });
        let text = view.render(false);
        assert!(text.contains("https://github.com/octocat/Hello-World/actions"));
        assert!(text.contains("\u{2714} CI  success"));
    }

    #[test]
    fn polling_notices() {
        let mut view = BoardView::new();
        view.apply(&Event::PollingRestarted {
            attempt: 1,
            delay: Duration::from_secs(2),
            error: "disk".into(),
        });
        assert!(view.notice().unwrap().contains("retrying in 2s"));
        view.apply(&Event::RefreshCompleted {
            report: RefreshReport::default(),
        });
        assert!(view.notice().is_none());
        view.apply(&Event::PollingStopped {
            reason: "gave up".into(),
        });
        assert!(view.render(false).starts_with("Auto-refresh stopped: gave up"));
    }

    #[test]
    fn empty_board_and_repo_list() {
        assert!(BoardView::new().render(false).contains(EMPTY_BOARD_MESSAGE));
        assert_eq!(
            render_repo_list(&[repo("a/x"), repo("b/y")]),
            "a/x\nb/y\n"
        );
    }
}
