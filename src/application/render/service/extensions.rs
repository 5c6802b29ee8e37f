//! Pluggable recognisers applied to the leading text of list items.
//!
//! An extension inspects the text at the start of an item and, when it
//! recognises a marker, consumes it and yields an [`ItemToken`] that the
//! list-item renderer turns into markup. Unrecognised text stays literal.

use std::sync::Arc;

use comrak::nodes::{AstNode, NodeValue};

use crate::application::render::types::RenderOptions;

/// Token produced by an [`ItemExtension`] for the item it recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemToken {
    Task { checked: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recognition {
    /// Bytes of leading text consumed by the marker.
    pub consumed: usize,
    pub token: ItemToken,
}

pub trait ItemExtension: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the leading text of a list item.
    fn recognize(&self, leading: &str) -> Option<Recognition>;
}

/// `[x]`, `[X]` or `[ ]` followed by whitespace or the end of the text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskListExtension;

impl ItemExtension for TaskListExtension {
    fn name(&self) -> &'static str {
        "task-list"
    }

    fn recognize(&self, leading: &str) -> Option<Recognition> {
        let rest = leading.strip_prefix('[')?;
        let mut chars = rest.chars();
        let checked = match chars.next()? {
            'x' | 'X' => true,
            ' ' => false,
            _ => return None,
        };
        let after = chars.as_str().strip_prefix(']')?;
        if !(after.is_empty() || after.starts_with(char::is_whitespace)) {
            return None;
        }

        Some(Recognition {
            consumed: leading.len() - after.len(),
            token: ItemToken::Task { checked },
        })
    }
}

/// Extensions active for a single render call.
#[derive(Clone, Default)]
pub struct ExtensionSet {
    extensions: Vec<Arc<dyn ItemExtension>>,
}

impl ExtensionSet {
    pub fn from_options(options: &RenderOptions, extra: &[Arc<dyn ItemExtension>]) -> Self {
        let mut extensions: Vec<Arc<dyn ItemExtension>> = Vec::with_capacity(extra.len() + 1);
        if options.enable_task_lists {
            extensions.push(Arc::new(TaskListExtension));
        }
        extensions.extend(extra.iter().cloned());
        Self { extensions }
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|ext| ext.name()).collect()
    }

    /// First extension to recognise `leading` wins.
    pub fn recognize(&self, leading: &str) -> Option<Recognition> {
        self.extensions
            .iter()
            .find_map(|extension| extension.recognize(leading))
    }

    /// Run the extensions against the leading text of a list item, stripping
    /// the consumed marker (and one following whitespace character) from the tree.
    pub(crate) fn apply_to_item<'a>(&self, item: &'a AstNode<'a>) -> Option<ItemToken> {
        if self.is_empty() {
            return None;
        }

        let paragraph = item.first_child()?;
        if !matches!(paragraph.data.borrow().value, NodeValue::Paragraph) {
            return None;
        }

        let leading = paragraph.first_child()?;
        let merged = merge_leading_text(leading)?;
        let recognition = self.recognize(&merged)?;

        let remainder = merged.get(recognition.consumed..)?;
        let remainder = remainder
            .strip_prefix(|ch: char| ch.is_whitespace())
            .unwrap_or(remainder);
        leading.data.borrow_mut().value = NodeValue::Text(remainder.to_string().into());

        Some(recognition.token)
    }
}

/// Fold adjacent text nodes into `first` so a marker can be recognised as one
/// string. Backslash escapes are separate nodes and stop the fold.
fn merge_leading_text<'a>(first: &'a AstNode<'a>) -> Option<String> {
    let mut merged = match &first.data.borrow().value {
        NodeValue::Text(text) => text.to_string(),
        _ => return None,
    };

    while let Some(next) = first.next_sibling() {
        let piece = match &next.data.borrow().value {
            NodeValue::Text(text) => text.to_string(),
            _ => break,
        };
        merged.push_str(&piece);
        next.detach();
    }

    first.data.borrow_mut().value = NodeValue::Text(merged.clone().into());
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_task_markers() {
        let ext = TaskListExtension;
        assert_eq!(
            ext.recognize("[x] done"),
            Some(Recognition {
                consumed: 3,
                token: ItemToken::Task { checked: true },
            })
        );
        assert_eq!(
            ext.recognize("[X]").map(|r| r.token),
            Some(ItemToken::Task { checked: true })
        );
        assert_eq!(
            ext.recognize("[ ]\ttodo").map(|r| r.token),
            Some(ItemToken::Task { checked: false })
        );
    }

    #[test]
    fn rejects_non_markers() {
        let ext = TaskListExtension;
        assert_eq!(ext.recognize("[x]done"), None);
        assert_eq!(ext.recognize("[y] nope"), None);
        assert_eq!(ext.recognize("[] empty"), None);
        assert_eq!(ext.recognize(" [x] indented"), None);
        assert_eq!(ext.recognize("plain"), None);
    }

    #[test]
    fn set_follows_options() {
        let enabled = ExtensionSet::from_options(&RenderOptions::default(), &[]);
        assert_eq!(enabled.names(), vec!["task-list"]);

        let disabled =
            ExtensionSet::from_options(&RenderOptions::default().with_task_lists(false), &[]);
        assert!(disabled.is_empty());
        assert_eq!(disabled.recognize("[x] done"), None);
    }

    struct StarExtension;

    impl ItemExtension for StarExtension {
        fn name(&self) -> &'static str {
            "star"
        }

        fn recognize(&self, leading: &str) -> Option<Recognition> {
            leading.starts_with("(*)").then_some(Recognition {
                consumed: 3,
                token: ItemToken::Task { checked: true },
            })
        }
    }

    #[test]
    fn extra_extensions_are_consulted_after_builtins() {
        let extra: Vec<Arc<dyn ItemExtension>> = vec![Arc::new(StarExtension)];
        let set = ExtensionSet::from_options(&RenderOptions::default(), &extra);
        assert_eq!(set.names(), vec!["task-list", "star"]);
        assert_eq!(
            set.recognize("(*) starred").map(|r| r.token),
            Some(ItemToken::Task { checked: true })
        );
    }
}
