//! Normalization of the inbound query parameters and construction of the
//! upstream preview-page URL.
//!
//! The parameters come straight off the request layer and are treated as
//! untrusted text. The only tricky one is `q`: clients send hashtag searches
//! either literally (`#tag`) or pre-encoded (`%23tag`), and the value must be
//! decoded at most once so re-serialization does not double-encode it.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::config::Config;

/// Normalized request parameters. Also the cache-key source: the canonical
/// JSON encoding of this struct keys the response cache, so field order here
/// is part of the key format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelQuery {
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub q: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

fn default_type() -> String {
    "list".to_string()
}

impl ChannelQuery {
    pub fn list() -> Self {
        Self {
            kind: default_type(),
            ..Self::default()
        }
    }

    pub fn single_post(id: impl Into<String>) -> Self {
        Self {
            kind: "post".to_string(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Whether this query addresses one message rather than the listing.
    pub fn is_single_post(&self) -> bool {
        !self.id.is_empty()
    }

    /// Canonical cache key: the JSON encoding of the normalized parameters.
    pub fn cache_key(&self) -> String {
        // Serialization of a plain string struct cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// The search text with at most one round of percent-decoding applied.
    ///
    /// A value containing `%` but no literal `#` is assumed to be
    /// pre-encoded and is decoded once; anything else is passed through
    /// untouched. A malformed escape sequence falls back to the raw value
    /// rather than failing the request.
    pub fn decoded_q(&self) -> String {
        if self.q.contains('%') && !self.q.contains('#') {
            match percent_decode_str(&self.q).decode_utf8() {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => self.q.clone(),
            }
        } else {
            self.q.clone()
        }
    }

    /// Build the upstream preview URL for this query.
    ///
    /// Single post: `https://{host}/{channel}/{id}?embed=1&mode=tme`.
    /// Listing: `https://{host}/s/{channel}` plus whichever of
    /// `before`/`after`/`q` are set. `type` is never forwarded upstream.
    pub fn upstream_url(&self, config: &Config) -> String {
        let host = config.telegram_host();
        let channel = config.channel();

        if self.is_single_post() {
            return format!("https://{host}/{channel}/{}?embed=1&mode=tme", self.id);
        }

        let base = format!("https://{host}/s/{channel}");
        let mut params = form_urlencoded::Serializer::new(String::new());
        if !self.before.is_empty() {
            params.append_pair("before", &self.before);
        }
        if !self.after.is_empty() {
            params.append_pair("after", &self.after);
        }
        let q = self.decoded_q();
        if !q.is_empty() {
            params.append_pair("q", &q);
        }
        let query_string = params.finish();
        if query_string.is_empty() {
            base
        } else {
            format!("{base}?{query_string}")
        }
    }
}
