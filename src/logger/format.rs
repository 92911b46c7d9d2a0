//! Line layout for console and file output
//!
//! Console: `HH:MM:SS [TAG       ] [LEVEL   ] message`, colored, wrapped so
//! continuation lines stay under the message column. File: the same columns
//! with a full date and no color.

use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use std::io::{self, Write};

const TAG_COLUMN: usize = 10;
const LEVEL_COLUMN: usize = 8;
const LINE_WIDTH: usize = 145;
const MIN_MESSAGE_WIDTH: usize = 40;

pub(super) fn emit(tag: &LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let clock = now.format("%H:%M:%S").to_string();
    // "HH:MM:SS " + "[tag] " + "[level] "
    let indent = clock.len() + 1 + (TAG_COLUMN + 3) + (LEVEL_COLUMN + 3);
    let width = LINE_WIDTH.saturating_sub(indent).max(MIN_MESSAGE_WIDTH);

    let head = format!("{} [{}] [{}] ", clock.dimmed(), paint_tag(tag), paint_level(level));
    let pad = " ".repeat(indent);

    for (n, piece) in wrap_text(message, width).iter().enumerate() {
        let lead = if n == 0 { head.as_str() } else { pad.as_str() };
        to_console(level, &format!("{}{}", lead, piece));
        write_to_file(&file_line(&now, tag, level, piece));
    }
}

fn file_line(now: &DateTime<Local>, tag: &LogTag, level: LogLevel, text: &str) -> String {
    format!(
        "{} [{}] [{}] {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        tag.to_plain_string(),
        level.as_str(),
        text
    )
}

fn paint_tag(tag: &LogTag) -> ColoredString {
    let cell = format!("{:<w$}", tag.to_plain_string(), w = TAG_COLUMN);
    let colored = match tag {
        LogTag::System | LogTag::Config => cell.bright_yellow(),
        LogTag::Scheduler => cell.bright_magenta(),
        LogTag::Rpc | LogTag::Scanner => cell.bright_cyan(),
        LogTag::Decoder | LogTag::Import => cell.bright_blue(),
        LogTag::Discovery => cell.bright_white(),
        LogTag::Ohlcv | LogTag::Holders => cell.bright_green(),
        LogTag::Storage => cell.cyan(),
        LogTag::Sync => cell.green(),
        LogTag::Test => cell.blue(),
        LogTag::Other(_) => cell.white(),
    };
    colored.bold()
}

fn paint_level(level: LogLevel) -> ColoredString {
    let cell = format!("{:<w$}", level.as_str(), w = LEVEL_COLUMN);
    match level {
        LogLevel::Error => cell.bright_red().bold(),
        LogLevel::Warning => cell.bright_yellow().bold(),
        LogLevel::Info => cell.white().bold(),
        LogLevel::Debug | LogLevel::Verbose => cell.dimmed(),
    }
}

/// A closed stdout (e.g. piped into `head`) ends the process without a panic
fn to_console(level: LogLevel, line: &str) {
    let written = if level.is_stderr() {
        writeln!(io::stderr(), "{}", line)
    } else {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line).and_then(|_| out.flush())
    };

    if matches!(written, Err(ref e) if e.kind() == io::ErrorKind::BrokenPipe) {
        std::process::exit(0);
    }
}

/// Split `text` into pieces of at most `width` chars, breaking at spaces and
/// honoring embedded newlines. Words longer than `width` are cut.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for raw in text.split('\n') {
        let mut line = String::new();
        let mut line_len = 0usize;

        for word in raw.split_whitespace() {
            let mut chars: Vec<char> = word.chars().collect();

            while chars.len() > width {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = chars.split_off(width);
                lines.push(chars.into_iter().collect());
                chars = rest;
            }

            let needed = if line_len == 0 { chars.len() } else { line_len + 1 + chars.len() };
            if needed > width {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line_len += chars.len();
            line.extend(chars);
        }

        if line_len > 0 || raw.trim().is_empty() {
            lines.push(line);
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_one_line() {
        assert_eq!(wrap_text("hello world", 40), vec!["hello world"]);
    }

    #[test]
    fn test_wraps_at_spaces() {
        assert_eq!(wrap_text("aaaa bbbb cccc", 9), vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn test_cuts_overlong_signature() {
        let sig = "x".repeat(25);
        let pieces = wrap_text(&format!("sig {}", sig), 10);
        assert_eq!(pieces, vec!["sig", "xxxxxxxxxx", "xxxxxxxxxx", "xxxxx"]);
    }

    #[test]
    fn test_keeps_newlines() {
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn test_file_line_is_plain() {
        let now = Local::now();
        let line = file_line(&now, &LogTag::Scanner, LogLevel::Warning, "slow page");
        assert!(line.ends_with("[SCANNER] [WARNING] slow page"));
    }
}
