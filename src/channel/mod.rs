//! The extraction pipeline: preview markup in, normalized records out.
//!
//! `get_channel_record` is the single entry point. It consults the response
//! cache, fetches the preview page on a miss, and hands the parsed document
//! to the assemblers: listing pages produce a [`ChannelInfo`] (oldest-first,
//! text posts only), single-message pages produce one [`Post`].

pub mod fragments;
pub mod model;
pub mod post;
pub mod sanitize;

#[cfg(test)]
mod tests;

pub use model::{ChannelInfo, ChannelRecord, Post, PostType};

use kuchiki::NodeRef;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tracing::{info, instrument};

use crate::app_state::AppState;
use crate::dom;
use crate::fetcher::{FetchError, fetch_page, forwardable_headers};
use crate::highlight::Highlighter;
use crate::query::ChannelQuery;
use post::{PostContext, extract_post};
use sanitize::sanitize_content;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("post {0} not found in the preview page")]
    PostNotFound(String),
}

/// Resolve a normalized query to a finished record, through the cache.
///
/// A hit returns a clone of the stored record. On a miss the full
/// fetch+extract pipeline runs and the result is stored unconditionally;
/// two concurrent misses on the same key both compute, last writer wins.
#[instrument(skip(state, inbound_headers), fields(channel = %state.config.channel()))]
pub async fn get_channel_record(
    state: &AppState,
    inbound_headers: &HeaderMap,
    query: &ChannelQuery,
) -> Result<ChannelRecord, ChannelError> {
    let cache_key = query.cache_key();
    if let Some(cached) = state.cache.get(&cache_key) {
        info!(key = %cache_key, "cache hit");
        return Ok(cached);
    }

    let url = query.upstream_url(&state.config);
    info!(%url, "fetching preview page");
    let html = fetch_page(&url, forwardable_headers(inbound_headers)).await?;
    let document = dom::parse_document(&html);

    let ctx = PostContext {
        channel: state.config.channel(),
        host: state.config.telegram_host(),
        static_proxy: state.config.static_proxy(),
        highlighter: state.highlighter.as_ref(),
    };

    let record = if query.is_single_post() {
        let post = extract_post(&document, 0, &ctx)
            .ok_or_else(|| ChannelError::PostNotFound(query.id.clone()))?;
        ChannelRecord::Post(post)
    } else {
        ChannelRecord::Channel(assemble_channel(&document, &ctx))
    };

    state.cache.insert(&cache_key, record.clone());
    Ok(record)
}

/// Assemble the listing: every message wrapper under the channel history,
/// reversed to oldest-first, filtered to renderable text posts, plus the
/// channel-level metadata.
pub fn assemble_channel(document: &NodeRef, ctx: &PostContext) -> ChannelInfo {
    let mut posts: Vec<Post> =
        dom::select_all(document, ".tgme_channel_history .tgme_widget_message_wrap")
            .iter()
            .enumerate()
            .filter_map(|(index, wrap)| extract_post(wrap.as_node(), index, ctx))
            .collect();
    // The source lists newest first; the output contract is oldest first.
    posts.reverse();
    posts.retain(Post::is_renderable);

    let title = dom::select_first(document, ".tgme_channel_info_header_title")
        .map(|el| dom::text_content(el.as_node()))
        .unwrap_or_default();
    let (description, description_html) =
        match dom::select_first(document, ".tgme_channel_info_description") {
            Some(desc) => {
                let text = dom::text_content(desc.as_node());
                sanitize_description(desc.as_node(), ctx.highlighter);
                (text, dom::inner_html(desc.as_node()))
            }
            None => (String::new(), String::new()),
        };
    let avatar = dom::select_first(document, ".tgme_page_photo_image img")
        .and_then(|img| dom::attr(&img, "src"))
        .unwrap_or_default();

    ChannelInfo {
        posts,
        title,
        description,
        description_html,
        avatar,
    }
}

/// The channel description runs through the same sanitizer as message text,
/// under a reserved id scope so its spoiler ids cannot collide with any
/// message's.
fn sanitize_description(description: &NodeRef, highlighter: &dyn Highlighter) {
    sanitize_content(description, "channel", highlighter);
}
