//! Assembly of one normalized post from a message node.
//!
//! The assembler picks the message's own text region (not a quoted reply's),
//! sanitizes it, derives the scalar fields, invokes every fragment extractor
//! in a fixed order, and finishes with one global pass that rewrites any
//! remaining bare `url(...)` CSS references through the static proxy.

use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::{Captures, Regex};

use crate::channel::fragments::{self, FragmentContext};
use crate::channel::model::{Post, PostType};
use crate::channel::sanitize::sanitize_content;
use crate::dom;
use crate::highlight::Highlighter;

/// Inputs shared by every post assembled from one fetched page.
pub struct PostContext<'a> {
    pub channel: &'a str,
    /// Host whose URLs are exempt from proxying (self-referential links).
    pub host: &'a str,
    pub static_proxy: &'a str,
    pub highlighter: &'a dyn Highlighter,
}

/// `encodeURIComponent`-style escaping for the internal search link.
const SEARCH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Bare CSS url() references with an absolute or protocol-relative target.
static CSS_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\((["'])((?:https?:)?//)([^"')]+)"#).unwrap());

/// Normalize one message node (a `.tgme_widget_message_wrap`, or the whole
/// document in single-post mode) into a [`Post`]. `index` is the message's
/// zero-based position in the listing page.
pub fn extract_post(node: &NodeRef, index: usize, ctx: &PostContext) -> Option<Post> {
    let message = dom::select_first(node, ".tgme_widget_message")?;
    let item = message.as_node();

    // A reply quote nests its own text region; prefer the message's own.
    let content_node = if dom::select_first(item, ".js-message_reply_text").is_some() {
        dom::select_first(item, ".tgme_widget_message_text.js-message_text")
    } else {
        dom::select_first(item, ".tgme_widget_message_text")
    };

    let mut tags = Vec::new();
    let (text, content_html) = match &content_node {
        Some(content) => {
            sanitize_content(content.as_node(), &index.to_string(), ctx.highlighter);
            tags = rewrite_tag_links(content.as_node());
            (
                dom::text_content(content.as_node()),
                dom::inner_html(content.as_node()),
            )
        }
        None => (String::new(), String::new()),
    };

    let title = derive_title(&text);
    let id = dom::attr(&message, "data-post")
        .map(|post_ref| strip_channel_prefix(&post_ref, ctx.channel))
        .unwrap_or_default();
    let kind = if dom::attr(&message, "class")
        .is_some_and(|class| class.contains("service_message"))
    {
        PostType::Service
    } else {
        PostType::Text
    };
    let datetime = dom::select_first(item, ".tgme_widget_message_date time")
        .and_then(|time| dom::attr(&time, "datetime"))
        .unwrap_or_default();

    let fragment_ctx = FragmentContext {
        channel: ctx.channel,
        static_proxy: ctx.static_proxy,
        index,
        post_id: &id,
        title: &title,
    };

    // Fixed assembly order; empty fragments are dropped.
    let content = [
        fragments::reply(item, &fragment_ctx),
        fragments::images(item, &fragment_ctx),
        fragments::videos(item, &fragment_ctx),
        fragments::audio(item, &fragment_ctx),
        content_html,
        fragments::image_stickers(item, &fragment_ctx),
        fragments::video_stickers(item, &fragment_ctx),
        fragments::poll(item),
        fragments::document(item),
        fragments::unsupported_video(item),
        fragments::location(item),
        fragments::link_preview(item, &fragment_ctx),
    ]
    .into_iter()
    .filter(|fragment| !fragment.is_empty())
    .collect::<Vec<_>>()
    .join("");

    let content = rewrite_css_urls(&content, ctx.static_proxy, ctx.host);

    Some(Post {
        id,
        title,
        kind,
        datetime,
        tags,
        text,
        content,
    })
}

/// The title is the text up to the first sentence terminator, newline, or
/// URL-looking token; a text starting with one of those yields an empty
/// title, and a text containing none is its own title.
fn derive_title(text: &str) -> String {
    let mut cut = text.len();
    for terminator in ['。', '\n'] {
        if let Some(pos) = text.find(terminator) {
            cut = cut.min(pos);
        }
    }
    static URL_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S").unwrap());
    if let Some(m) = URL_TOKEN.find(text) {
        cut = cut.min(m.start());
    }
    text[..cut].to_string()
}

/// Strip the `channel/` prefix from the composite `data-post` identifier,
/// case-insensitively.
fn strip_channel_prefix(post_ref: &str, channel: &str) -> String {
    let prefix = format!("{channel}/");
    if post_ref.is_char_boundary(prefix.len())
        && post_ref[..prefix.len()].eq_ignore_ascii_case(&prefix)
    {
        post_ref[prefix.len()..].to_string()
    } else {
        post_ref.to_string()
    }
}

/// Hashtag-style links (`href="?q=..."`) are rewritten to the internal
/// search URL; their texts, minus the leading `#`, become the post's tags.
fn rewrite_tag_links(content: &NodeRef) -> Vec<String> {
    let mut tags = Vec::new();
    for anchor in dom::select_all(content, r#"a[href^="?q="]"#) {
        let text = dom::text_content(anchor.as_node());
        let encoded = utf8_percent_encode(&text, SEARCH_ENCODE_SET).to_string();
        dom::set_attr(&anchor, "href", &format!("/search/{encoded}"));
        tags.push(text.replacen('#', "", 1));
    }
    tags
}

/// Final global pass: absolute and protocol-relative URLs inside bare
/// `url(...)` references are routed through the proxy, except references to
/// the source channel's own domain, which must stay direct. Protocol-relative
/// targets are pinned to https; an explicit scheme is kept as-is.
fn rewrite_css_urls(content: &str, static_proxy: &str, host: &str) -> String {
    CSS_URL_REGEX
        .replace_all(content, |caps: &Captures| {
            let quote = &caps[1];
            let scheme = if &caps[2] == "//" { "https://" } else { &caps[2] };
            let rest = &caps[3];
            if is_own_domain(rest, host) {
                return caps[0].to_string();
            }
            format!("url({quote}{static_proxy}{scheme}{rest}")
        })
        .into_owned()
}

/// Own-domain check with host-label boundaries: the configured host itself
/// and its subdomains are exempt from proxying.
fn is_own_domain(url_rest: &str, host: &str) -> bool {
    let authority = url_rest.split(['/', '?', '#']).next().unwrap_or("");
    let hostname = authority.split(['@']).next_back().unwrap_or("");
    let hostname = hostname.split(':').next().unwrap_or("");
    hostname.eq_ignore_ascii_case(host)
        || hostname
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", host.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HeuristicHighlighter;

    fn ctx<'a>() -> PostContext<'a> {
        PostContext {
            channel: "durov",
            host: "t.me",
            static_proxy: "/static/",
            highlighter: &HeuristicHighlighter,
        }
    }

    fn message_doc(inner: &str) -> NodeRef {
        dom::parse_document(&format!(
            r#"<div class="tgme_widget_message_wrap">
                 <div class="tgme_widget_message" data-post="durov/42">{inner}</div>
               </div>"#
        ))
    }

    #[test]
    fn derives_scalar_fields() {
        let doc = message_doc(
            r#"<div class="tgme_widget_message_text">First sentence。The rest follows.</div>
               <span class="tgme_widget_message_date"><time datetime="2024-05-01T10:00:00+00:00"></time></span>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert_eq!(post.id, "42");
        assert_eq!(post.title, "First sentence");
        assert_eq!(post.kind, PostType::Text);
        assert_eq!(post.datetime, "2024-05-01T10:00:00+00:00");
        assert!(post.text.contains("The rest follows."));
    }

    #[test]
    fn id_prefix_strip_is_case_insensitive() {
        let doc = dom::parse_document(
            r#"<div class="tgme_widget_message" data-post="Durov/7">
                 <div class="tgme_widget_message_text">hi</div>
               </div>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert_eq!(post.id, "7");
    }

    #[test]
    fn title_stops_at_url_token() {
        let doc = message_doc(
            r#"<div class="tgme_widget_message_text">Check this https://example.com now</div>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert_eq!(post.title, "Check this ");
    }

    #[test]
    fn title_falls_back_to_full_text() {
        let doc = message_doc(r#"<div class="tgme_widget_message_text">No terminator here</div>"#);
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert_eq!(post.title, "No terminator here");
    }

    #[test]
    fn service_message_is_tagged() {
        let doc = dom::parse_document(
            r#"<div class="tgme_widget_message service_message" data-post="durov/9"></div>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert_eq!(post.kind, PostType::Service);
    }

    #[test]
    fn own_text_preferred_over_reply_text() {
        let doc = message_doc(
            r#"<div class="tgme_widget_message_reply">
                 <div class="tgme_widget_message_text js-message_reply_text">quoted words</div>
               </div>
               <div class="tgme_widget_message_text js-message_text">my own words</div>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert_eq!(post.text, "my own words");
    }

    #[test]
    fn hashtag_links_become_tags_and_search_urls() {
        let doc = message_doc(
            r#"<div class="tgme_widget_message_text">news <a href="?q=%23rust">#rust</a> <a href="?q=%23web">#web</a></div>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert_eq!(post.tags, vec!["rust".to_string(), "web".to_string()]);
        assert!(post.content.contains(r#"href="/search/%23rust""#));
    }

    #[test]
    fn fragments_assemble_in_fixed_order() {
        let doc = message_doc(
            r#"<div class="tgme_widget_message_reply"><span>quoted</span></div>
               <div class="tgme_widget_message_photo_wrap" style="background-image:url('https://cdn.telegram.org/a.jpg')"></div>
               <div class="tgme_widget_message_text js-message_text">body text</div>
               <a class="tgme_widget_message_link_preview" href="https://example.com"><div class="link_preview_title">Preview</div></a>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        let reply_pos = post.content.find("reply-blockquote").unwrap();
        let image_pos = post.content.find("image-list-container").unwrap();
        let text_pos = post.content.find("body text").unwrap();
        let preview_pos = post.content.find("link_preview").unwrap();
        assert!(reply_pos < image_pos);
        assert!(image_pos < text_pos);
        assert!(text_pos < preview_pos);
    }

    #[test]
    fn bare_css_urls_are_proxied_in_final_pass() {
        let doc = message_doc(
            r#"<div class="tgme_widget_message_poll">
                 <div style="background-image:url('https://cdn.telegram.org/poll.jpg')"></div>
               </div>"#,
        );
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert!(post
            .content
            .contains("url('/static/https://cdn.telegram.org/poll.jpg')"));
    }

    #[test]
    fn plain_http_urls_keep_their_scheme() {
        let rewritten = rewrite_css_urls(
            r#"<i style="background-image:url('http://cdn.example.com/a.jpg')"></i>"#,
            "/static/",
            "t.me",
        );
        assert!(rewritten.contains("url('/static/http://cdn.example.com/a.jpg')"));
    }

    #[test]
    fn protocol_relative_urls_are_normalized_to_https() {
        let rewritten = rewrite_css_urls(
            r#"<i style="background-image:url('//cdn.telegram.org/b.jpg')"></i>"#,
            "/static/",
            "t.me",
        );
        assert!(rewritten.contains("url('/static/https://cdn.telegram.org/b.jpg')"));
    }

    #[test]
    fn own_domain_urls_are_left_untouched() {
        let content = r#"<i style="background-image:url('https://t.me/durov/5')"></i>"#;
        assert_eq!(rewrite_css_urls(content, "/static/", "t.me"), content);

        let sub = r#"<i style="background-image:url('https://sub.t.me/x')"></i>"#;
        assert_eq!(rewrite_css_urls(sub, "/static/", "t.me"), sub);

        // Lookalike domains do not qualify.
        let lookalike = r#"<i style="background-image:url('https://not-t.me/x')"></i>"#;
        assert!(rewrite_css_urls(lookalike, "/static/", "t.me").contains("/static/"));
    }

    #[test]
    fn message_without_node_is_none() {
        let doc = dom::parse_document("<div>nothing here</div>");
        assert!(extract_post(&doc, 0, &ctx()).is_none());
    }

    #[test]
    fn empty_message_yields_empty_content() {
        let doc = dom::parse_document(r#"<div class="tgme_widget_message" data-post="durov/3"></div>"#);
        let post = extract_post(&doc, 0, &ctx()).unwrap();
        assert!(post.content.is_empty());
        assert!(!post.is_renderable());
    }
}
