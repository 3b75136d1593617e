//! Light cleanup of model output before display.

use regex::Regex;
use std::sync::OnceLock;

static BULLET: OnceLock<Regex> = OnceLock::new();
static BLANK_RUN: OnceLock<Regex> = OnceLock::new();

/// Normalizes simple list bullets to `• ` and collapses runs of three or
/// more newlines into a single blank line. Emphasis markers are left alone.
pub fn tidy_response(text: &str) -> String {
    let bullet = BULLET.get_or_init(|| Regex::new(r"(?m)^[ \t]*[-•][ \t]+").expect("valid regex"));
    let blank_run = BLANK_RUN.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let text = bullet.replace_all(text, "• ");
    let text = blank_run.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullets_are_normalized() {
        let tidy = tidy_response("Itens:\n- um\n  • dois\n-sem espaço");
        assert_eq!(tidy, "Itens:\n• um\n• dois\n-sem espaço");
    }

    #[test]
    fn test_blank_runs_collapse_and_emphasis_survives() {
        let tidy = tidy_response("\n**título**\n\n\n\ncorpo\n");
        assert_eq!(tidy, "**título**\n\ncorpo");
    }
}
