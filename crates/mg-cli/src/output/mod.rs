//! Output formatting utilities for the CLI
//!
//! Tables for subscriptions plus colored status lines.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use mg_core::time::format_relative;
use mg_core::{ActiveSubscriptionRef, Subscription};

/// Format subscriptions as an ASCII table
///
/// The selected subscription is marked with `*`. The long form adds the
/// full id and the source URL.
pub fn format_subscriptions(
    subscriptions: &[Subscription],
    selected: &ActiveSubscriptionRef,
    long: bool,
) -> String {
    if subscriptions.is_empty() {
        return "No subscriptions".to_string();
    }

    #[derive(Tabled)]
    struct SubscriptionRow {
        #[tabled(rename = "")]
        selected: &'static str,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "ALIAS")]
        alias: String,
        #[tabled(rename = "FORMAT")]
        format: &'static str,
        #[tabled(rename = "UPDATED")]
        updated: String,
    }

    #[derive(Tabled)]
    struct SubscriptionRowDetailed {
        #[tabled(rename = "")]
        selected: &'static str,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "ALIAS")]
        alias: String,
        #[tabled(rename = "FORMAT")]
        format: &'static str,
        #[tabled(rename = "UPDATED")]
        updated: String,
        #[tabled(rename = "SOURCE")]
        source: String,
    }

    let marker = |s: &Subscription| if selected.is(&s.id) { "*" } else { "" };

    if long {
        let rows: Vec<SubscriptionRowDetailed> = subscriptions
            .iter()
            .map(|s| SubscriptionRowDetailed {
                selected: marker(s),
                id: s.id.to_string(),
                alias: s.alias.clone(),
                format: s.format.extension(),
                updated: format_relative(s.updated_at),
                source: s.source.to_string(),
            })
            .collect();

        Table::new(rows)
            .with(Style::rounded())
            .with(Width::wrap(120))
            .to_string()
    } else {
        let rows: Vec<SubscriptionRow> = subscriptions
            .iter()
            .map(|s| SubscriptionRow {
                selected: marker(s),
                id: truncate(s.id.as_str(), 8),
                alias: s.alias.clone(),
                format: s.format.extension(),
                updated: format_relative(s.updated_at),
            })
            .collect();

        Table::new(rows).with(Style::rounded()).to_string()
    }
}

/// Shorten an id for display
fn truncate(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn subscription(alias: &str) -> Subscription {
        let mut sub = Subscription::new(Url::parse("https://example.test/sub1").unwrap(), 0);
        sub.alias = alias.to_string();
        sub
    }

    #[test]
    fn test_empty_list() {
        let out = format_subscriptions(&[], &ActiveSubscriptionRef::none(), false);
        assert_eq!(out, "No subscriptions");
    }

    #[test]
    fn test_selected_subscription_is_marked() {
        let home = subscription("home");
        let work = subscription("work");
        let selected = ActiveSubscriptionRef::from(&work.id);

        let out = format_subscriptions(&[home.clone(), work.clone()], &selected, false);
        let work_line = out.lines().find(|l| l.contains("work")).unwrap();
        let home_line = out.lines().find(|l| l.contains("home")).unwrap();
        assert!(work_line.contains('*'));
        assert!(!home_line.contains('*'));
        assert!(out.contains(&work.id.as_str()[..8]));
        assert!(!out.contains("https://example.test/sub1"));
    }

    #[test]
    fn test_long_form_includes_source() {
        let sub = subscription("home");
        let out = format_subscriptions(&[sub.clone()], &ActiveSubscriptionRef::none(), true);
        assert!(out.contains("https://example.test/sub1"));
        assert!(out.contains(sub.id.as_str()));
    }
}
