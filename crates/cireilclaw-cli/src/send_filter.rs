//! Transient per-session send interception (heartbeat step 5, cron
//! isolated-mode capture). Lives entirely in the harness — `Session` itself
//! carries no `sendFilter` field, since this state never survives a turn and
//! has no business being serialized to the session store.

use cireilclaw_core::config::{HeartbeatVisibility, HEARTBEAT_OK_TOKEN};

/// What should happen to content a turn sends during this invocation.
pub enum SendFilter {
    /// Heartbeat delivery: the first send is classified OK/alert and that
    /// one decision governs every send made by the rest of the turn.
    Heartbeat {
        visibility: HeartbeatVisibility,
        decision: Option<bool>,
    },
    /// Isolated cron, or a live chat turn answering synchronously: every
    /// send is buffered instead of reaching the channel.
    CaptureAll { buffer: String },
}

impl SendFilter {
    pub fn heartbeat(visibility: HeartbeatVisibility) -> Self {
        SendFilter::Heartbeat {
            visibility,
            decision: None,
        }
    }

    pub fn capture_all() -> Self {
        SendFilter::CaptureAll {
            buffer: String::new(),
        }
    }

    /// Returns `true` if `content` should still reach the channel adapter.
    /// For `CaptureAll`, content is always buffered and never forwarded.
    pub fn intercept(&mut self, content: &str) -> bool {
        match self {
            SendFilter::Heartbeat { visibility, decision } => {
                let forward = *decision.get_or_insert_with(|| {
                    let is_ok = content.trim() == HEARTBEAT_OK_TOKEN;
                    if is_ok {
                        visibility.show_ok
                    } else {
                        visibility.show_alerts
                    }
                });
                forward
            }
            SendFilter::CaptureAll { buffer } => {
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(content);
                false
            }
        }
    }

    pub fn into_captured(self) -> Option<String> {
        match self {
            SendFilter::CaptureAll { buffer } => Some(buffer),
            SendFilter::Heartbeat { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visibility(show_ok: bool, show_alerts: bool) -> HeartbeatVisibility {
        HeartbeatVisibility {
            show_ok,
            show_alerts,
            use_indicator: false,
        }
    }

    #[test]
    fn heartbeat_ok_suppressed_when_show_ok_false() {
        let mut filter = SendFilter::heartbeat(visibility(false, true));
        assert!(!filter.intercept(HEARTBEAT_OK_TOKEN));
        // Same decision reused for a second send in the same turn.
        assert!(!filter.intercept("anything else"));
    }

    #[test]
    fn heartbeat_alert_passes_when_show_alerts_true() {
        let mut filter = SendFilter::heartbeat(visibility(false, true));
        assert!(filter.intercept("something went wrong"));
    }

    #[test]
    fn capture_all_never_forwards_and_joins_buffer() {
        let mut filter = SendFilter::capture_all();
        assert!(!filter.intercept("line one"));
        assert!(!filter.intercept("line two"));
        assert_eq!(filter.into_captured(), Some("line one\nline two".to_string()));
    }
}
