//! Cleanup applied to free-text model output before it reaches clients.

use std::sync::LazyLock;

use regex::Regex;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*$\n?").expect("valid regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]*)\*\*|__([^_]*)__").expect("valid regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]*").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid regex"));
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•·]\s*|\d+[.)]\s+)").expect("valid regex"));

pub const BULLET: &str = "• ";

/// Strip markdown decoration and collapse blank-line runs.
pub fn sanitize_ai_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let text = CODE_FENCE.replace_all(&text, "");
    let text = BOLD.replace_all(&text, "$1$2");
    let text = HEADING.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Normalise every non-empty line to start with `• `.
///
/// Existing list markers (`-`, `*`, `1.`) are replaced; blank lines dropped.
pub fn normalize_bullets(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let body = LIST_MARKER.replace(line, "");
            format!("{BULLET}{}", body.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
