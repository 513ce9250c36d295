//! Thin wrappers around the underlying HTML parser.
//!
//! All tree traversal in the extraction pipeline goes through this module so
//! the extractors stay pure functions over a small, typed surface:
//! select-by-css, attribute get/set, inline-style URL extraction, text
//! content, and serialization. The preview markup is externally controlled,
//! so every helper degrades to `None`/empty rather than panicking on a shape
//! it does not recognize.

use kuchiki::traits::TendrilSink;
use kuchiki::{ElementData, NodeDataRef, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches the first `url("...")` reference in an inline style attribute.
static STYLE_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(["']?([^"')]+?)["']?\)"#).unwrap());

/// Parse a complete HTML document. An implicit `<html>`/`<head>`/`<body>`
/// is synthesized when missing, per the HTML5 parsing rules.
pub fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

/// All elements under `node` matching a CSS selector, in document order.
/// An invalid selector yields no matches.
pub fn select_all(node: &NodeRef, selector: &str) -> Vec<NodeDataRef<ElementData>> {
    node.select(selector)
        .map(|matches| matches.collect())
        .unwrap_or_default()
}

/// First element under `node` matching a CSS selector.
pub fn select_first(node: &NodeRef, selector: &str) -> Option<NodeDataRef<ElementData>> {
    node.select_first(selector).ok()
}

/// Attribute value of an element, owned.
pub fn attr(element: &NodeDataRef<ElementData>, name: &str) -> Option<String> {
    element.attributes.borrow().get(name).map(str::to_string)
}

pub fn set_attr(element: &NodeDataRef<ElementData>, name: &str, value: &str) {
    element.attributes.borrow_mut().insert(name, value.to_string());
}

pub fn remove_attr(element: &NodeDataRef<ElementData>, name: &str) {
    element.attributes.borrow_mut().remove(name);
}

/// The URL inside a `url("...")` reference in the element's inline style,
/// if the element carries one.
pub fn style_url(element: &NodeDataRef<ElementData>) -> Option<String> {
    let style = attr(element, "style")?;
    STYLE_URL_REGEX
        .captures(&style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Concatenated text of the node's subtree, like DOM `textContent`.
pub fn text_content(node: &NodeRef) -> String {
    node.text_contents()
}

/// Serialize the node itself plus its subtree.
pub fn outer_html(node: &NodeRef) -> String {
    let mut buf = Vec::new();
    if node.serialize(&mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

/// Serialize only the node's children.
pub fn inner_html(node: &NodeRef) -> String {
    node.children().map(|child| outer_html(&child)).collect()
}

/// Parse an HTML fragment and return its top-level nodes.
pub fn parse_fragment_nodes(html: &str) -> Vec<NodeRef> {
    let document = parse_document(html);
    let Some(body) = select_first(&document, "body") else {
        return Vec::new();
    };
    let children: Vec<NodeRef> = body.as_node().children().collect();
    for child in &children {
        child.detach();
    }
    children
}

/// Replace `node` with the nodes parsed from an HTML fragment.
pub fn replace_with_html(node: &NodeRef, html: &str) {
    for fragment_node in parse_fragment_nodes(html) {
        node.insert_before(fragment_node);
    }
    node.detach();
}

/// Drop the node's children and replace them with a parsed HTML fragment.
pub fn set_inner_html(node: &NodeRef, html: &str) {
    for child in node.children().collect::<Vec<_>>() {
        child.detach();
    }
    for fragment_node in parse_fragment_nodes(html) {
        node.append(fragment_node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_and_attr_roundtrip() {
        let doc = parse_document(r#"<div class="wrap"><img src="/a.jpg"></div>"#);
        let img = select_first(&doc, ".wrap img").unwrap();
        assert_eq!(attr(&img, "src"), Some("/a.jpg".to_string()));
        set_attr(&img, "src", "/b.jpg");
        set_attr(&img, "loading", "lazy");
        remove_attr(&img, "class");
        assert_eq!(attr(&img, "src"), Some("/b.jpg".to_string()));
        assert_eq!(attr(&img, "loading"), Some("lazy".to_string()));
    }

    #[test]
    fn style_url_handles_quote_styles() {
        for style in [
            r#"background-image:url('https://cdn.example.com/a.jpg')"#,
            r#"background-image:url("https://cdn.example.com/a.jpg")"#,
            r#"background-image:url(https://cdn.example.com/a.jpg)"#,
        ] {
            let doc = parse_document(&format!(r#"<i class="photo" style="{style}"></i>"#));
            let el = select_first(&doc, ".photo").unwrap();
            assert_eq!(
                style_url(&el).as_deref(),
                Some("https://cdn.example.com/a.jpg"),
                "style: {style}"
            );
        }
    }

    #[test]
    fn style_url_absent_is_none() {
        let doc = parse_document(r#"<i class="photo"></i>"#);
        let el = select_first(&doc, ".photo").unwrap();
        assert_eq!(style_url(&el), None);
    }

    #[test]
    fn invalid_selector_matches_nothing() {
        let doc = parse_document("<p>hi</p>");
        assert!(select_all(&doc, ":::nope").is_empty());
        assert!(select_first(&doc, ":::nope").is_none());
    }

    #[test]
    fn replace_with_html_swaps_node_in_place() {
        let doc = parse_document(r#"<div><i class="old">x</i><span>tail</span></div>"#);
        let old = select_first(&doc, ".old").unwrap();
        replace_with_html(old.as_node(), r#"<img class="new" src="/a.jpg">"#);
        let div = select_first(&doc, "div").unwrap();
        let html = inner_html(div.as_node());
        assert!(html.contains(r#"<img class="new" src="/a.jpg">"#));
        assert!(!html.contains("old"));
        assert!(html.ends_with("<span>tail</span>"));
    }

    #[test]
    fn set_inner_html_replaces_children() {
        let doc = parse_document("<pre>old text</pre>");
        let pre = select_first(&doc, "pre").unwrap();
        set_inner_html(pre.as_node(), r#"<code class="language-rust">fn main() {}</code>"#);
        assert_eq!(text_content(pre.as_node()), "fn main() {}");
        assert!(outer_html(pre.as_node()).contains("language-rust"));
    }

    #[test]
    fn inner_and_outer_html() {
        let doc = parse_document("<blockquote><b>bold</b> text</blockquote>");
        let quote = select_first(&doc, "blockquote").unwrap();
        assert_eq!(inner_html(quote.as_node()), "<b>bold</b> text");
        assert_eq!(
            outer_html(quote.as_node()),
            "<blockquote><b>bold</b> text</blockquote>"
        );
    }
}
