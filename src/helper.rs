use std::{
    io::Write,
    process::{Command, Stdio},
    sync::OnceLock,
};

use html_escape::decode_html_entities;
use log::{debug, trace, warn};
use regex::Regex;
use shell_words::split;
use which::which;

// Candidates tried in order when no clipboard command is configured
const CLIPBOARD_COMMANDS: &[&str] = &[
    "pbcopy",
    "wl-copy",
    "xclip -selection clipboard",
    "xsel --clipboard --input",
    "clip",
];

fn markup_tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex is valid"))
}

/// Removes markup tags from rich-text content, keeping the text between them
/// with character entities decoded
pub fn strip_markup(content: &str) -> String {
    let text = markup_tag_regex().replace_all(content, "");
    decode_html_entities(&text).into_owned()
}

/// Trims and lowercases a tag; None for tags that end up empty
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

// Helper method for parsing comma-separated tags
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    let mut parsed: Vec<String> = Vec::new();
    for tag in tags.iter().flat_map(|t| t.split(',')) {
        if let Some(tag) = normalize_tag(tag) {
            if !parsed.contains(&tag) {
                parsed.push(tag);
            }
        }
    }
    parsed
}

/// Best-effort copy of `text` to the system clipboard.
///
/// Uses `configured` when given, otherwise the first clipboard utility found
/// on the PATH. Failures are logged and reported as `false`, never raised.
pub fn copy_to_clipboard(text: &str, configured: Option<&str>) -> bool {
    let command_line = match configured {
        Some(cmd) => Some(cmd.to_string()),
        None => CLIPBOARD_COMMANDS
            .iter()
            .find(|cmd| {
                cmd.split_whitespace()
                    .next()
                    .is_some_and(|program| which(program).is_ok())
            })
            .map(|cmd| cmd.to_string()),
    };

    let Some(command_line) = command_line else {
        warn!("No clipboard command available, copy skipped");
        return false;
    };

    match pipe_into(&command_line, text) {
        Ok(()) => {
            debug!("Copied {} bytes to clipboard via {}", text.len(), command_line);
            true
        }
        Err(message) => {
            warn!("Failed to copy to clipboard: {}", message);
            false
        }
    }
}

fn pipe_into(command_line: &str, text: &str) -> std::result::Result<(), String> {
    let args = split(command_line).map_err(|e| format!("bad clipboard command: {}", e))?;
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| "empty clipboard command".to_string())?;

    trace!("Spawning clipboard command {}", program);
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| e.to_string())?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).map_err(|e| e.to_string())?;
    }

    let status = child.wait().map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("{} exited with {}", program, status))
    }
}
