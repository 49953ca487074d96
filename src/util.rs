use std::borrow::Cow;
use std::fmt::Write;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthChar;

/// Fallback `strftime` pattern, e.g. `May 26, 2025 6:30 PM`.
pub(crate) const DEFAULT_DATE_FORMAT: &str = "%b %-d, %Y %-I:%M %p";

static EMOJI_REPLACER: LazyLock<gh_emoji::Replacer> = LazyLock::new(gh_emoji::Replacer::new);

/// Expand GitHub emoji shortcodes (e.g. `:tada:` → 🎉) in the given text.
///
/// Returns `Cow::Borrowed` when no shortcodes are found, avoiding allocation.
pub(crate) fn expand_emoji(text: &str) -> Cow<'_, str> {
    EMOJI_REPLACER.replace_all(text)
}

/// Format a datetime according to the configured date format.
///
/// If `date_format` is `"relative"`, displays relative times like `"2h"`,
/// `"3d"`, `"1w"`. Otherwise, uses `strftime`-style formatting in UTC; a
/// pattern chrono rejects falls back to [`DEFAULT_DATE_FORMAT`].
pub(crate) fn format_date(dt: &DateTime<Utc>, date_format: &str) -> String {
    if date_format == "relative" {
        return format_relative_time(dt, Utc::now());
    }
    let mut out = String::new();
    if write!(out, "{}", dt.format(date_format)).is_err() {
        tracing::warn!("invalid date format {date_format:?}, using default");
        out = dt.format(DEFAULT_DATE_FORMAT).to_string();
    }
    out
}

/// Whether `date_format` is `"relative"` or a pattern chrono can render.
pub(crate) fn is_valid_date_format(date_format: &str) -> bool {
    date_format == "relative"
        || !StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error))
}

/// Format a number of seconds as e.g. `"12s"`, `"2m 05s"`, `"1h 03m"`.
pub(crate) fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Cut `text` so its display width fits in `max_width` columns, ending with
/// `…` when anything was removed.
pub(crate) fn truncate_to_width(text: &str, max_width: usize) -> Cow<'_, str> {
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max_width {
        return Cow::Borrowed(text);
    }
    if max_width == 0 {
        return Cow::Owned(String::new());
    }

    let budget = max_width - 1;
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    Cow::Owned(out)
}

/// Format a datetime as relative time (e.g., `"2h"`, `"3d"`, `"1w"`).
fn format_relative_time(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(dt);

    let minutes = duration.num_minutes();
    if minutes < 1 {
        return "now".to_owned();
    }
    if minutes < 60 {
        return format!("{minutes}m");
    }

    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{hours}h");
    }

    let days = duration.num_days();
    if days < 7 {
        return format!("{days}d");
    }
    if days < 30 {
        return format!("{}w", days / 7);
    }
    if days < 365 {
        return format!("{}mo", days / 30);
    }

    format!("{}y", days / 365)
}
