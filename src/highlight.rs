//! Code-block language guessing and syntax highlighting.
//!
//! The extraction pipeline treats both as best-effort collaborators behind
//! the [`Highlighter`] trait: a `None` guess falls back to `text`, and a
//! highlight failure leaves the block as plain preformatted text. Neither
//! may ever abort the surrounding extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    #[error("highlighting failed: {0}")]
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
pub trait Highlighter: Send + Sync {
    /// Best-effort language guess from raw code text. `None` means no
    /// confident guess could be made.
    fn guess_language(&self, code: &str) -> Option<String>;

    /// Render code as HTML markup for the given language. The markup's text
    /// content must equal `code` exactly; only inline tags may be added.
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError>;
}

/// Keyword-scoring guesser plus escaping token highlighter.
///
/// Good enough for the common languages seen in channel posts; anything it
/// cannot place renders as plain `text`.
pub struct HeuristicHighlighter;

struct LanguageProfile {
    name: &'static str,
    keywords: &'static [&'static str],
    // Signature tokens that identify the language on their own.
    markers: &'static [&'static str],
}

const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        name: "rust",
        keywords: &["fn", "let", "mut", "impl", "pub", "struct", "enum", "match", "use"],
        markers: &["fn main()", "println!", "::<", "&str", "->"],
    },
    LanguageProfile {
        name: "python",
        keywords: &["def", "import", "class", "elif", "lambda", "self", "None", "return"],
        markers: &["def ", "print(", "__init__", "import "],
    },
    LanguageProfile {
        name: "javascript",
        keywords: &["function", "const", "let", "var", "return", "async", "await", "class"],
        markers: &["=>", "console.log", "function ", "const "],
    },
    LanguageProfile {
        name: "go",
        keywords: &["func", "package", "import", "defer", "chan", "interface", "struct", "go"],
        markers: &["func ", "package main", ":=", "fmt."],
    },
    LanguageProfile {
        name: "sql",
        keywords: &["SELECT", "FROM", "WHERE", "INSERT", "UPDATE", "DELETE", "JOIN"],
        markers: &["SELECT ", "INSERT INTO", "CREATE TABLE"],
    },
    LanguageProfile {
        name: "bash",
        keywords: &["echo", "export", "then", "done", "esac", "sudo"],
        markers: &["#!/bin/", "$(", "fi\n", " && "],
    },
    LanguageProfile {
        name: "json",
        keywords: &[],
        markers: &["{\n", "\": \"", "\":\""],
    },
    LanguageProfile {
        name: "html",
        keywords: &[],
        markers: &["<!DOCTYPE", "<div", "</", "<html"],
    },
    LanguageProfile {
        name: "css",
        keywords: &[],
        markers: &["{\n  ", "px;", "color:", "@media"],
    },
];

const MIN_SCORE: u32 = 3;

static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

impl Highlighter for HeuristicHighlighter {
    fn guess_language(&self, code: &str) -> Option<String> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return None;
        }

        let words: Vec<&str> = WORD_REGEX.find_iter(code).map(|m| m.as_str()).collect();

        let mut best: Option<(&str, u32)> = None;
        for profile in PROFILES {
            let mut score = 0u32;
            for marker in profile.markers {
                if code.contains(marker) {
                    score += 2;
                }
            }
            for keyword in profile.keywords {
                if words.iter().any(|w| w == keyword) {
                    score += 1;
                }
            }
            if score >= MIN_SCORE && best.map_or(true, |(_, s)| score > s) {
                best = Some((profile.name, score));
            }
        }
        best.map(|(name, _)| name.to_string())
    }

    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
        let escaped = html_escape::encode_text(code).into_owned();
        let profile = PROFILES.iter().find(|p| p.name == language);
        let Some(profile) = profile else {
            // Plain text and unprofiled languages render unhighlighted.
            return Ok(escaped);
        };
        if profile.keywords.is_empty() {
            return Ok(escaped);
        }

        let highlighted = WORD_REGEX.replace_all(&escaped, |caps: &regex::Captures| {
            let word = &caps[0];
            if profile.keywords.contains(&word) {
                format!(r#"<span class="token keyword">{word}</span>"#)
            } else {
                word.to_string()
            }
        });
        Ok(highlighted.into_owned())
    }
}
