//! In-place sanitization of a message's primary text region.
//!
//! The preview markup is externally controlled, so this is both cleanup and
//! defense: emoji glyphs lose their inline sizing, anchors lose embedded
//! click handlers, over-long expandable quotes collapse behind a disclosure
//! element, spoiler spans get a script-free reveal control, and code blocks
//! are language-tagged and highlighted. A highlighting failure is logged and
//! leaves the block as plain preformatted text; it never aborts extraction.

use kuchiki::NodeRef;
use tracing::warn;

use crate::dom;
use crate::highlight::Highlighter;

/// A flagged quote only collapses when its text exceeds either bound.
const EXPANDABLE_MAX_LINES: usize = 3;
const EXPANDABLE_MAX_CHARS: usize = 200;

/// `id_scope` namespaces the spoiler ids generated for this region: the
/// message index for post text, a reserved label for channel metadata.
pub fn sanitize_content(content: &NodeRef, id_scope: &str, highlighter: &dyn Highlighter) {
    strip_emoji_styles(content);
    harden_anchors(content);
    collapse_expandable_quotes(content);
    wrap_spoilers(content, id_scope);
    render_code_blocks(content, highlighter);
}

/// Emoji glyphs inherit surrounding text flow instead of carrying their own
/// sizing/positioning.
fn strip_emoji_styles(content: &NodeRef) {
    for emoji in dom::select_all(content, ".emoji") {
        dom::remove_attr(&emoji, "style");
    }
}

/// Give every link a hover title equal to its own text and drop any inline
/// click-handler remnant.
fn harden_anchors(content: &NodeRef) {
    for anchor in dom::select_all(content, "a") {
        let text = dom::text_content(anchor.as_node());
        dom::set_attr(&anchor, "title", &text);
        dom::remove_attr(&anchor, "onclick");
    }
}

/// Quotes flagged `expandable` become a disclosure element when long enough.
/// The always-visible summary carries the full quote content; expansion only
/// toggles a truncation style, the payload never changes. Short quotes drop
/// the flag and render as ordinary blockquotes.
fn collapse_expandable_quotes(content: &NodeRef) {
    for quote in dom::select_all(content, "blockquote[expandable]") {
        let text = dom::text_content(quote.as_node());
        let line_count = text.lines().filter(|line| !line.trim().is_empty()).count();
        let has_more = line_count > EXPANDABLE_MAX_LINES || text.chars().count() > EXPANDABLE_MAX_CHARS;

        if has_more {
            let inner = dom::inner_html(quote.as_node());
            dom::replace_with_html(
                quote.as_node(),
                &format!(
                    r#"<details class="expandable-blockquote"><summary class="blockquote-preview">{inner}</summary></details>"#
                ),
            );
        } else {
            dom::remove_attr(&quote, "expandable");
        }
    }
}

/// Each spoiler span gets a stable id and a checkbox-driven reveal control.
/// Pure markup/CSS; no script required to toggle.
fn wrap_spoilers(content: &NodeRef, id_scope: &str) {
    for (spoiler_index, spoiler) in dom::select_all(content, "tg-spoiler").iter().enumerate() {
        let id = format!("spoiler-{id_scope}-{spoiler_index}");
        dom::set_attr(spoiler, "id", &id);
        let spoiler_html = dom::outer_html(spoiler.as_node());
        dom::replace_with_html(
            spoiler.as_node(),
            &format!(
                r#"<label class="spoiler-button"><input type="checkbox" />{spoiler_html}</label>"#
            ),
        );
    }
}

/// Normalize `<br>` to literal newlines (so `textContent` keeps structure),
/// infer the language, and write back a language-tagged, highlighted code
/// element. On failure the block stays as plain preformatted text.
fn render_code_blocks(content: &NodeRef, highlighter: &dyn Highlighter) {
    for pre in dom::select_all(content, "pre") {
        for br in dom::select_all(pre.as_node(), "br") {
            br.as_node().insert_before(NodeRef::new_text("\n"));
            br.as_node().detach();
        }

        let code = dom::text_content(pre.as_node());
        let language = highlighter
            .guess_language(&code)
            .unwrap_or_else(|| "text".to_string());

        match highlighter.highlight(&code, &language) {
            Ok(highlighted) => {
                dom::set_inner_html(
                    pre.as_node(),
                    &format!(r#"<code class="language-{language}">{highlighted}</code>"#),
                );
            }
            Err(err) => {
                warn!(language = %language, error = %err, "code highlighting failed, leaving block as plain text");
            }
        }
    }
}
