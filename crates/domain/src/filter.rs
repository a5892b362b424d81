//! Composable filters for handler selection
//!
//! A [`Filter`] is a pure predicate over a parsed [`Update`]. Filters never
//! observe raw request bytes. They are deterministic, side-effect-free and
//! safe to evaluate concurrently from multiple dispatches; composition is a
//! small combinator algebra (AND/OR/NOT) so filters stay inspectable and
//! testable in isolation from the dispatcher.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::update::{MessageContent, Update, UpdatePayload};

/// Message content categories a filter can test for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Media,
    Location,
    Reaction,
}

enum Expr {
    /// Matches every update (the empty/default filter)
    Any,
    SenderIn(HashSet<String>),
    Content(ContentKind),
    HasMedia,
    TextExact(String),
    TextRegex(Regex),
    Custom {
        name: String,
        predicate: Arc<dyn Fn(&Update) -> bool + Send + Sync>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Filter),
}

/// A composable predicate over an [`Update`].
///
/// Cheap to clone (internally `Arc`-shared) and `Send + Sync`.
#[derive(Clone)]
pub struct Filter {
    expr: Arc<Expr>,
}

impl Filter {
    fn from_expr(expr: Expr) -> Self {
        Self {
            expr: Arc::new(expr),
        }
    }

    /// The default filter: matches every update.
    pub fn any() -> Self {
        Self::from_expr(Expr::Any)
    }

    /// Matches when the update's sender wa_id is in `senders`.
    pub fn sender_in<I, S>(senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_expr(Expr::SenderIn(
            senders.into_iter().map(Into::into).collect(),
        ))
    }

    /// Matches messages whose content is of the given category.
    pub fn content(kind: ContentKind) -> Self {
        Self::from_expr(Expr::Content(kind))
    }

    /// Matches messages carrying a media attachment.
    pub fn has_media() -> Self {
        Self::from_expr(Expr::HasMedia)
    }

    /// Matches when the update's extracted text equals `text` exactly.
    pub fn text_exact(text: impl Into<String>) -> Self {
        Self::from_expr(Expr::TextExact(text.into()))
    }

    /// Matches when the update's extracted text matches `pattern`.
    pub fn text_matches(pattern: Regex) -> Self {
        Self::from_expr(Expr::TextRegex(pattern))
    }

    /// A named custom predicate. The name only shows up in `Debug` output.
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Update) -> bool + Send + Sync + 'static,
    {
        Self::from_expr(Expr::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        })
    }

    /// Logical AND; short-circuits on the first non-match.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::from_expr(Expr::And(vec![self, other]))
    }

    /// Logical OR; short-circuits on the first match.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::from_expr(Expr::Or(vec![self, other]))
    }

    /// Logical NOT.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::from_expr(Expr::Not(self))
    }

    /// N-ary AND over `filters`. An empty list matches everything.
    pub fn all_of(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::from_expr(Expr::And(filters.into_iter().collect()))
    }

    /// N-ary OR over `filters`. An empty list matches nothing.
    pub fn any_of(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::from_expr(Expr::Or(filters.into_iter().collect()))
    }

    /// Evaluate this filter against a parsed update.
    pub fn matches(&self, update: &Update) -> bool {
        match &*self.expr {
            Expr::Any => true,
            Expr::SenderIn(senders) => senders.contains(&update.sender),
            Expr::Content(kind) => content_kind(update) == Some(*kind),
            Expr::HasMedia => update.has_media(),
            Expr::TextExact(text) => update.text() == Some(text.as_str()),
            Expr::TextRegex(pattern) => {
                update.text().is_some_and(|text| pattern.is_match(text))
            },
            Expr::Custom { predicate, .. } => predicate(update),
            Expr::And(filters) => filters.iter().all(|f| f.matches(update)),
            Expr::Or(filters) => filters.iter().any(|f| f.matches(update)),
            Expr::Not(filter) => !filter.matches(update),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::any()
    }
}

fn content_kind(update: &Update) -> Option<ContentKind> {
    let UpdatePayload::Message(msg) = &update.payload else {
        return None;
    };
    match msg.content {
        MessageContent::Text { .. } => Some(ContentKind::Text),
        MessageContent::Media { .. } => Some(ContentKind::Media),
        MessageContent::Location { .. } => Some(ContentKind::Location),
        MessageContent::Reaction { .. } => Some(ContentKind::Reaction),
        MessageContent::Unknown { .. } => None,
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.expr {
            Expr::Any => write!(f, "any"),
            Expr::SenderIn(senders) => {
                let mut ids: Vec<_> = senders.iter().collect();
                ids.sort();
                write!(f, "sender_in({ids:?})")
            },
            Expr::Content(kind) => write!(f, "content({kind:?})"),
            Expr::HasMedia => write!(f, "has_media"),
            Expr::TextExact(text) => write!(f, "text_exact({text:?})"),
            Expr::TextRegex(pattern) => write!(f, "text_matches({:?})", pattern.as_str()),
            Expr::Custom { name, .. } => write!(f, "custom({name})"),
            Expr::And(filters) => f.debug_tuple("and").field(filters).finish(),
            Expr::Or(filters) => f.debug_tuple("or").field(filters).finish(),
            Expr::Not(filter) => f.debug_tuple("not").field(filter).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{IncomingMessage, MediaKind, MessageContent, UpdatePayload};

    fn text_update(sender: &str, body: &str) -> Update {
        Update {
            sender: sender.to_string(),
            timestamp: 1_700_000_000,
            entry_id: "entry-1".to_string(),
            payload: UpdatePayload::Message(IncomingMessage {
                message_id: "wamid.T".to_string(),
                sender_name: None,
                content: MessageContent::Text {
                    body: body.to_string(),
                },
            }),
        }
    }

    fn media_update(sender: &str) -> Update {
        Update {
            sender: sender.to_string(),
            timestamp: 1_700_000_000,
            entry_id: "entry-1".to_string(),
            payload: UpdatePayload::Message(IncomingMessage {
                message_id: "wamid.M".to_string(),
                sender_name: None,
                content: MessageContent::Media {
                    media_id: "media-1".to_string(),
                    mime_type: "image/png".to_string(),
                    caption: None,
                    kind: MediaKind::Image,
                },
            }),
        }
    }

    #[test]
    fn any_matches_everything() {
        assert!(Filter::any().matches(&text_update("1", "hi")));
        assert!(Filter::any().matches(&media_update("2")));
    }

    #[test]
    fn default_filter_is_any() {
        assert!(Filter::default().matches(&text_update("1", "hi")));
    }

    #[test]
    fn sender_in_matches_membership() {
        let filter = Filter::sender_in(["491111", "492222"]);
        assert!(filter.matches(&text_update("491111", "hi")));
        assert!(!filter.matches(&text_update("493333", "hi")));
    }

    #[test]
    fn content_kind_matching() {
        assert!(Filter::content(ContentKind::Text).matches(&text_update("1", "hi")));
        assert!(!Filter::content(ContentKind::Media).matches(&text_update("1", "hi")));
        assert!(Filter::content(ContentKind::Media).matches(&media_update("1")));
    }

    #[test]
    fn has_media_only_matches_media_messages() {
        assert!(Filter::has_media().matches(&media_update("1")));
        assert!(!Filter::has_media().matches(&text_update("1", "hi")));
    }

    #[test]
    fn text_exact_matching() {
        let filter = Filter::text_exact("ping");
        assert!(filter.matches(&text_update("1", "ping")));
        assert!(!filter.matches(&text_update("1", "pong")));
        assert!(!filter.matches(&media_update("1")));
    }

    #[test]
    fn text_regex_matching() {
        let filter = Filter::text_matches(Regex::new(r"^/(help|start)\b").unwrap());
        assert!(filter.matches(&text_update("1", "/help")));
        assert!(filter.matches(&text_update("1", "/start now")));
        assert!(!filter.matches(&text_update("1", "help me")));
    }

    #[test]
    fn custom_predicate() {
        let filter = Filter::custom("long_text", |u| u.text().is_some_and(|t| t.len() > 5));
        assert!(filter.matches(&text_update("1", "long enough")));
        assert!(!filter.matches(&text_update("1", "no")));
    }

    #[test]
    fn and_requires_both() {
        let filter = Filter::sender_in(["491111"]).and(Filter::text_exact("hi"));
        assert!(filter.matches(&text_update("491111", "hi")));
        assert!(!filter.matches(&text_update("491111", "yo")));
        assert!(!filter.matches(&text_update("492222", "hi")));
    }

    #[test]
    fn or_requires_either() {
        let filter = Filter::text_exact("hi").or(Filter::text_exact("hello"));
        assert!(filter.matches(&text_update("1", "hi")));
        assert!(filter.matches(&text_update("1", "hello")));
        assert!(!filter.matches(&text_update("1", "hey")));
    }

    #[test]
    fn negate_inverts() {
        let filter = Filter::has_media().negate();
        assert!(filter.matches(&text_update("1", "hi")));
        assert!(!filter.matches(&media_update("1")));
    }

    #[test]
    fn all_of_empty_matches_everything() {
        assert!(Filter::all_of([]).matches(&text_update("1", "hi")));
    }

    #[test]
    fn any_of_empty_matches_nothing() {
        assert!(!Filter::any_of([]).matches(&text_update("1", "hi")));
    }

    #[test]
    fn filters_are_cheaply_cloneable_and_shareable() {
        let filter = Filter::text_exact("hi");
        let clone = filter.clone();
        let update = text_update("1", "hi");
        let handle = std::thread::spawn(move || clone.matches(&update));
        assert!(filter.matches(&text_update("2", "hi")));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn debug_renders_combinator_tree() {
        let filter = Filter::sender_in(["49"]).and(Filter::text_exact("hi").negate());
        let rendered = format!("{filter:?}");
        assert!(rendered.contains("and"));
        assert!(rendered.contains("sender_in"));
        assert!(rendered.contains("not"));
        assert!(rendered.contains("text_exact"));
    }
}
