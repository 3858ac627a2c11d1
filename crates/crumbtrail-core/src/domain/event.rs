//! Inbound DOM activity
//!
//! Host glue translates whatever its UI layer emits into these events and
//! hands them to the engine, which decides what becomes a breadcrumb.

use serde::{Deserialize, Serialize};

/// A user-interface event observed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DomEvent {
    /// Pointer activation on an element
    Click { target: String },
    /// Value change on a text field
    Input { target: String, value: String },
    /// IME composition began on a field
    CompositionStart { target: String },
    /// IME composition finished with the composed text
    CompositionEnd { target: String, data: String },
    /// Key press, with the host's monotonic time in milliseconds
    KeyDown {
        target: String,
        key: String,
        at_ms: u64,
    },
    /// A `script`, `link` or `img` element failed to load
    ResourceError {
        tag: String,
        src: String,
        page_url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_event_tagging() {
        let event: DomEvent = serde_json::from_str(
            r#"{"kind":"compositionend","target":"input#name","data":"名前"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            DomEvent::CompositionEnd {
                target: "input#name".into(),
                data: "名前".into()
            }
        );
    }
}
