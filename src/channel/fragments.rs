//! Per-content-kind fragment extractors.
//!
//! Each extractor is a pure function over one message subtree: it reads a
//! bounded region of the parsed markup and emits a self-contained fragment
//! string with asset URLs rewritten through the static proxy, or an empty
//! string when the message carries no such content. The extractors are
//! independent of each other; the assembler decides their order.
//!
//! Markup irregularities (missing style attribute, absent sticker image,
//! reply without a target) degrade to empty output, never errors.

use kuchiki::NodeRef;

use crate::dom;

/// Shared inputs for one message's extractors.
pub struct FragmentContext<'a> {
    pub channel: &'a str,
    pub static_proxy: &'a str,
    /// Zero-based position of the message in the listing page.
    pub index: usize,
    pub post_id: &'a str,
    pub title: &'a str,
}

impl FragmentContext<'_> {
    /// Above-the-fold heuristic: the first sixteen messages load media
    /// eagerly, everything further down defers.
    fn loading(&self) -> &'static str {
        if self.index <= 15 { "eager" } else { "lazy" }
    }

    /// Bandwidth heuristic for video preload, same cutoff.
    fn preload(&self) -> &'static str {
        if self.index <= 15 { "auto" } else { "metadata" }
    }

    fn proxied(&self, url: &str) -> String {
        format!("{}{}", self.static_proxy, url)
    }
}

fn escape_attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

/// Photo wrappers become clickable previews paired with a popover modal for
/// the full-size view. The container class encodes even/odd item count,
/// which the stylesheet uses for the grid layout.
pub fn images(item: &NodeRef, ctx: &FragmentContext) -> String {
    let photos = dom::select_all(item, ".tgme_widget_message_photo_wrap");
    let rendered: Vec<String> = photos
        .iter()
        .enumerate()
        .filter_map(|(photo_index, photo)| {
            let url = dom::style_url(photo)?;
            let src = escape_attr(&ctx.proxied(&url));
            let alt = escape_attr(ctx.title);
            let popover_id = format!("modal-{}-{}", ctx.post_id, photo_index);
            let loading = ctx.loading();
            Some(format!(
                r#"<button class="image-preview-button image-preview-wrap" popovertarget="{popover_id}" popovertargetaction="show"><img src="{src}" alt="{alt}" loading="{loading}" /></button><button class="image-preview-button modal" id="{popover_id}" popovertarget="{popover_id}" popovertargetaction="hide" popover><img class="modal-img" src="{src}" alt="{alt}" loading="lazy" /></button>"#
            ))
        })
        .collect();

    if rendered.is_empty() {
        return String::new();
    }
    let parity = if rendered.len() % 2 == 0 {
        "image-list-even"
    } else {
        "image-list-odd"
    };
    format!(
        r#"<div class="image-list-container {parity}">{}</div>"#,
        rendered.join("")
    )
}

/// Regular and round (circular selfie clip) videos share one rule: proxy the
/// source, force visible controls and inline playback, and pick preload by
/// position. Round video is visually distinct but structurally identical.
pub fn videos(item: &NodeRef, ctx: &FragmentContext) -> String {
    let mut out = String::new();
    for selector in [
        ".tgme_widget_message_video_wrap video",
        ".tgme_widget_message_roundvideo_wrap video",
    ] {
        for video in dom::select_all(item, selector) {
            if let Some(src) = dom::attr(&video, "src") {
                dom::set_attr(&video, "src", &ctx.proxied(&src));
            }
            dom::set_attr(&video, "controls", "");
            dom::set_attr(&video, "preload", ctx.preload());
            dom::set_attr(&video, "playsinline", "");
            dom::set_attr(&video, "webkit-playsinline", "");
            out.push_str(&dom::outer_html(video.as_node()));
        }
    }
    out
}

/// Voice messages: proxy the source and enable controls.
pub fn audio(item: &NodeRef, ctx: &FragmentContext) -> String {
    let mut out = String::new();
    for voice in dom::select_all(item, ".tgme_widget_message_voice") {
        if let Some(src) = dom::attr(&voice, "src") {
            dom::set_attr(&voice, "src", &ctx.proxied(&src));
        }
        dom::set_attr(&voice, "controls", "");
        out.push_str(&dom::outer_html(voice.as_node()));
    }
    out
}

/// Static stickers carry their bitmap in a `data-webp` attribute; emit it as
/// an ordinary image.
pub fn image_stickers(item: &NodeRef, ctx: &FragmentContext) -> String {
    dom::select_all(item, ".tgme_widget_message_sticker")
        .iter()
        .filter_map(|sticker| {
            let url = dom::attr(sticker, "data-webp")?;
            let src = escape_attr(&ctx.proxied(&url));
            let loading = ctx.loading();
            Some(format!(
                r#"<img class="sticker" src="{src}" style="width: 256px;" alt="Sticker" loading="{loading}" />"#
            ))
        })
        .collect()
}

/// Animated stickers are reconstructed as muted, autoplaying, looping inline
/// videos with the poster image nested inside as fallback.
pub fn video_stickers(item: &NodeRef, ctx: &FragmentContext) -> String {
    dom::select_all(item, ".js-videosticker_video")
        .iter()
        .filter_map(|video| {
            let url = dom::attr(video, "src")?;
            let poster = dom::select_first(video.as_node(), "img")
                .and_then(|img| dom::attr(&img, "src"))
                .unwrap_or_default();
            let src = escape_attr(&ctx.proxied(&url));
            let poster_src = escape_attr(&ctx.proxied(&poster));
            let loading = ctx.loading();
            Some(format!(
                r#"<div style="background-image: none; width: 256px;"><video src="{src}" width="100%" height="100%" alt="Video Sticker" preload muted autoplay loop playsinline disablepictureinpicture><img class="sticker" src="{poster_src}" alt="Video Sticker" loading="{loading}" /></video></div>"#
            ))
        })
        .collect()
}

/// Link previews keep the source anchor but get an explicit image element:
/// the background-image style is extracted and replaced with a proxied
/// `<img>` carrying the preview title as alt text.
pub fn link_preview(item: &NodeRef, ctx: &FragmentContext) -> String {
    let Some(link) = dom::select_first(item, ".tgme_widget_message_link_preview") else {
        return String::new();
    };

    let title = dom::select_first(item, ".link_preview_title")
        .map(|el| dom::text_content(el.as_node()))
        .filter(|t| !t.is_empty())
        .or_else(|| {
            dom::select_first(item, ".link_preview_site_name")
                .map(|el| dom::text_content(el.as_node()))
        })
        .unwrap_or_default();
    let description = dom::select_first(item, ".link_preview_description")
        .map(|el| dom::text_content(el.as_node()))
        .unwrap_or_default();

    dom::set_attr(&link, "target", "_blank");
    dom::set_attr(&link, "rel", "noopener");
    dom::set_attr(&link, "title", &description);

    if let Some(image) = dom::select_first(item, ".link_preview_image") {
        let src = dom::style_url(&image)
            .map(|url| ctx.proxied(&url))
            .unwrap_or_default();
        dom::replace_with_html(
            image.as_node(),
            &format!(
                r#"<img class="link_preview_image" alt="{}" src="{}" loading="{}" />"#,
                escape_attr(&title),
                escape_attr(&src),
                ctx.loading()
            ),
        );
    }

    dom::outer_html(link.as_node())
}

/// A quoted earlier message renders as a collapsed disclosure. The visible
/// label links to the quoted post when the reply target resolves; the
/// channel's message path is rewritten to the site's internal post path.
pub fn reply(item: &NodeRef, ctx: &FragmentContext) -> String {
    let Some(reply) = dom::select_first(item, ".tgme_widget_message_reply") else {
        return String::new();
    };
    let reply_html = dom::inner_html(reply.as_node());
    if reply_html.is_empty() {
        return String::new();
    }

    let summary = match dom::attr(&reply, "href")
        .and_then(|href| reply_target_path(&href, ctx.channel))
    {
        Some(path) => format!(r#"<a href="{}">View reply</a>"#, escape_attr(&path)),
        None => "View reply".to_string(),
    };

    format!(
        r#"<details class="reply-blockquote"><summary class="reply-summary">{summary}</summary><small><blockquote>{reply_html}</blockquote></small></details>"#
    )
}

/// Rewrite `/{channel}/<id>` in the reply target to the internal
/// `/posts/<id>` convention, case-insensitively. An unparseable href yields
/// no link; a path without the channel segment is kept verbatim.
fn reply_target_path(href: &str, channel: &str) -> Option<String> {
    let url = url::Url::parse(href).ok()?;
    let path = url.path();
    let needle = format!("/{}/", channel.to_ascii_lowercase());
    match path.to_ascii_lowercase().find(&needle) {
        Some(pos) => Some(format!(
            "{}/posts/{}",
            &path[..pos],
            &path[pos + needle.len()..]
        )),
        None => Some(path.to_string()),
    }
}

/// Polls are passed through as raw sub-markup; any remaining URL rewriting
/// happens in the assembler's final pass.
pub fn poll(item: &NodeRef) -> String {
    dom::select_first(item, ".tgme_widget_message_poll")
        .map(|el| dom::inner_html(el.as_node()))
        .unwrap_or_default()
}

/// Document attachments are reproduced by serializing the matched subtree.
pub fn document(item: &NodeRef) -> String {
    dom::select_first(item, ".tgme_widget_message_document_wrap")
        .map(|el| dom::outer_html(el.as_node()))
        .unwrap_or_default()
}

/// Videos the preview page could not embed keep their fallback player markup.
pub fn unsupported_video(item: &NodeRef) -> String {
    dom::select_first(item, ".tgme_widget_message_video_player.not_supported")
        .map(|el| dom::outer_html(el.as_node()))
        .unwrap_or_default()
}

/// Location pins are reproduced as-is.
pub fn location(item: &NodeRef) -> String {
    dom::select_first(item, ".tgme_widget_message_location_wrap")
        .map(|el| dom::outer_html(el.as_node()))
        .unwrap_or_default()
}
