use serde::{Deserialize, Serialize};

/// Whether a message is authored content or a channel-generated notification
/// (member joined, photo changed, ...). Service messages are tagged but
/// excluded from listing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Text,
    Service,
}

/// One renderable message, normalized from the preview markup. `content` is
/// the final assembled markup with every asset URL already rewritten through
/// the static proxy; `text` is the plain-text rendering of the primary text
/// region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: PostType,
    /// ISO-8601 timestamp, carried verbatim from the source markup.
    pub datetime: String,
    pub tags: Vec<String>,
    pub text: String,
    pub content: String,
}

impl Post {
    /// Whether the post survives listing-mode filtering: authored content
    /// with a usable identifier and something to render.
    pub fn is_renderable(&self) -> bool {
        self.kind == PostType::Text && !self.id.is_empty() && !self.content.is_empty()
    }
}

/// One fetched channel snapshot. `posts` is ordered oldest-first and holds
/// only renderable text posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub posts: Vec<Post>,
    pub title: String,
    pub description: String,
    #[serde(rename = "descriptionHTML")]
    pub description_html: String,
    pub avatar: String,
}

/// What a single request resolves to: the whole listing or one post.
/// Also the cached value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelRecord {
    Channel(ChannelInfo),
    Post(Post),
}
