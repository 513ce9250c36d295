use std::fs;

use crate::channel::post::{PostContext, extract_post};
use crate::channel::{PostType, assemble_channel};
use crate::dom;
use crate::highlight::HeuristicHighlighter;

fn test_ctx<'a>() -> PostContext<'a> {
    PostContext {
        channel: "durov",
        host: "t.me",
        static_proxy: "/static/",
        highlighter: &HeuristicHighlighter,
    }
}

fn load_fixture(name: &str) -> kuchiki::NodeRef {
    let html = fs::read_to_string(format!("src/channel/tests/fixtures/{name}"))
        .expect("Failed to read test fixture");
    dom::parse_document(&html)
}

#[test]
fn listing_is_oldest_first_and_filtered() {
    let document = load_fixture("channel.html");
    let info = assemble_channel(&document, &test_ctx());

    let ids: Vec<&str> = info.posts.iter().map(|p| p.id.as_str()).collect();
    // Source order is 103, 102, 101 (service), 100 (empty), 99; output must
    // be oldest first with the service and empty messages dropped.
    assert_eq!(ids, vec!["99", "102", "103"]);
    for post in &info.posts {
        assert_eq!(post.kind, PostType::Text);
        assert!(!post.id.is_empty());
        assert!(!post.content.is_empty());
    }
}

#[test]
fn channel_metadata_is_extracted() {
    let document = load_fixture("channel.html");
    let info = assemble_channel(&document, &test_ctx());

    assert_eq!(info.title, "Durov's Channel");
    assert!(info.description.starts_with("Thoughts from the team."));
    assert_eq!(info.avatar, "https://cdn4.telesco.pe/file/avatar.jpg");
    // The description HTML went through the sanitizer: hover title added,
    // inline click handler dropped.
    assert!(info.description_html.contains(r#"title="Our site""#));
    assert!(!info.description_html.contains("onclick"));
}

#[test]
fn description_spoiler_ids_do_not_collide_with_message_ids() {
    let document = dom::parse_document(
        r#"<div class="tgme_channel_info_description">intro <tg-spoiler>hidden</tg-spoiler></div>
           <div class="tgme_channel_history">
             <div class="tgme_widget_message_wrap">
               <div class="tgme_widget_message" data-post="durov/1">
                 <div class="tgme_widget_message_text"><tg-spoiler>secret</tg-spoiler></div>
               </div>
             </div>
           </div>"#,
    );
    let info = assemble_channel(&document, &test_ctx());

    assert!(info.description_html.contains(r#"id="spoiler-channel-0""#));
    assert!(info.posts[0].content.contains(r#"id="spoiler-0-0""#));
    assert!(!info.description_html.contains(r#"id="spoiler-0-0""#));
}

#[test]
fn asset_urls_are_proxied_throughout() {
    let document = load_fixture("channel.html");
    let info = assemble_channel(&document, &test_ctx());

    let all_content: String = info.posts.iter().map(|p| p.content.as_str()).collect();
    assert!(all_content.contains("/static/https://cdn4.telesco.pe/file/photo-one.jpg"));
    assert!(all_content.contains("/static/https://cdn4.telesco.pe/file/photo-two.jpg"));
    assert!(all_content.contains("/static/https://cdn4.telesco.pe/file/clip.mp4"));
    // No unproxied CDN asset reference may survive in src attributes.
    assert!(!all_content.contains(r#"src="https://cdn4.telesco.pe"#));
}

#[test]
fn photo_post_keeps_gallery_and_title() {
    let document = load_fixture("channel.html");
    let info = assemble_channel(&document, &test_ctx());

    let photo_post = info.posts.iter().find(|p| p.id == "102").unwrap();
    assert_eq!(photo_post.title, "Two pictures from today");
    assert!(photo_post.content.contains("image-list-even"));
    assert_eq!(photo_post.datetime, "2024-05-02T15:30:00+00:00");
}

#[test]
fn code_post_carries_tags_and_highlighted_block() {
    let document = load_fixture("channel.html");
    let info = assemble_channel(&document, &test_ctx());

    let code_post = info.posts.iter().find(|p| p.id == "103").unwrap();
    assert_eq!(code_post.tags, vec!["release".to_string()]);
    assert!(code_post.content.contains(r#"href="/search/%23release""#));
    assert!(code_post.content.contains(r#"<code class="language-rust">"#));
    // Line structure survives the br normalization.
    assert!(code_post.text.contains("fn main() {\n    println!(\"shipped\");\n}"));
}

#[test]
fn reply_post_uses_own_text_and_collapsed_quote() {
    let document = load_fixture("channel.html");
    let info = assemble_channel(&document, &test_ctx());

    let reply_post = info.posts.iter().find(|p| p.id == "99").unwrap();
    assert!(reply_post.text.starts_with("Answer:"));
    assert!(!reply_post.text.contains("the earlier question"));
    assert!(reply_post.content.contains(r#"<details class="reply-blockquote">"#));
    assert!(reply_post.content.contains(r#"<a href="/posts/98">View reply</a>"#));
    assert!(reply_post.content.contains("spoiler-4-0"));
}

#[test]
fn single_post_page_resolves_one_post() {
    let document = load_fixture("message.html");
    let post = extract_post(&document, 0, &test_ctx()).unwrap();

    assert_eq!(post.id, "42");
    assert_eq!(post.title, "A longer write-up");
    assert_eq!(post.datetime, "2024-04-30T08:00:00+00:00");
    // The five-line expandable quote collapses into a disclosure element.
    assert!(post.content.contains(r#"<details class="expandable-blockquote">"#));
    assert!(post.content.contains("line five"));
    // Link preview image was replaced and proxied.
    assert!(post
        .content
        .contains("/static/https://cdn4.telesco.pe/file/preview.jpg"));
    assert!(post.content.contains(r#"title="Why it matters""#));
}

#[cfg(feature = "fuzz")]
mod fuzz {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn extraction_never_panics(html in ".*") {
            let document = dom::parse_document(&html);
            // Arbitrary markup must degrade, never panic.
            let _ = extract_post(&document, 0, &test_ctx());
            let _ = assemble_channel(&document, &test_ctx());
        }
    }
}
