//! fastscale-notify — scale-out notifications.
//!
//! After a successful scale-out the autoscaler posts a short message to the
//! service's incoming webhook (Slack-compatible `{"text": ...}` payload).
//! Delivery is advisory: errors are reported to the caller, which logs them
//! and moves on.

pub mod webhook;

pub use webhook::{
    scaleout_message, NotifyError, NotifyFuture, NotifyResult, Notifier, ScaleOutEvent,
    WebhookNotifier,
};
