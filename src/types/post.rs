//! Forum post types as fetched from the post source.

use serde::{Deserialize, Serialize};

/// Author handle used when the source reports no author (deleted accounts).
pub const DELETED_AUTHOR: &str = "[deleted]";

/// A post matched by a search, together with its comment thread.
///
/// This is the input unit of the enrichment pipeline. It is never mutated
/// after it leaves the post source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    /// Source-assigned post identifier
    pub id: String,

    /// Post title
    pub title: String,

    /// Net vote score
    pub score: i64,

    /// Comment count as reported by the source
    pub num_comments: i64,

    /// Author handle
    pub author: String,

    /// Forum the post was found in
    pub forum: String,

    /// Source identifier of that forum
    pub forum_id: String,

    /// Creation time in seconds since the Unix epoch
    pub created_utc: f64,

    /// Self-text body (empty for link posts)
    #[serde(default)]
    pub selftext: String,

    /// Bodies of every comment in the thread, depth-first
    #[serde(default)]
    pub comments: Vec<String>,
}

impl RawPost {
    /// All comment bodies joined with a single space.
    pub fn comments_blob(&self) -> String {
        self.comments.join(" ")
    }

    /// Self-text followed by the comment blob, separated by one space.
    ///
    /// Empty parts are not padded, so a post with neither self-text nor
    /// comments yields an empty string.
    pub fn combined_text(&self) -> String {
        let blob = self.comments_blob();
        match (self.selftext.is_empty(), self.comments.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.selftext.clone(),
            (true, false) => blob,
            (false, false) => format!("{} {}", self.selftext, blob),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(selftext: &str, comments: &[&str]) -> RawPost {
        RawPost {
            id: "abc".to_string(),
            title: "title".to_string(),
            score: 1,
            num_comments: comments.len() as i64,
            author: "someone".to_string(),
            forum: "gaming".to_string(),
            forum_id: "t5_2qh03".to_string(),
            created_utc: 1_700_000_000.0,
            selftext: selftext.to_string(),
            comments: comments.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_combined_text_joins_with_single_spaces() {
        let p = post("great game", &["loved it", "too expensive"]);
        assert_eq!(p.combined_text(), "great game loved it too expensive");
    }

    #[test]
    fn test_combined_text_without_comments() {
        assert_eq!(post("just text", &[]).combined_text(), "just text");
    }

    #[test]
    fn test_combined_text_without_selftext() {
        assert_eq!(post("", &["a", "b"]).combined_text(), "a b");
    }

    #[test]
    fn test_combined_text_empty() {
        assert!(post("", &[]).combined_text().is_empty());
    }
}
