pub mod pushplus;
pub mod wxpusher;

use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::change_detector::{PriceEvent, PriceEventKind};
use crate::config::NotifierConfig;
use crate::fare::Route;
use crate::Result;

pub use pushplus::PushPlusNotifier;
pub use wxpusher::WxPusherNotifier;

/// What gets pushed: a one-line summary and a longer body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub summary: String,
    pub content: String,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Best-effort delivery. Errors are `NotifierFailure`; callers log them.
    async fn send(&self, msg: &Message) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Used when no push credential is configured.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, msg: &Message) -> Result<()> {
        tracing::info!(
            summary = %msg.summary,
            content = %msg.content.replace('\n', " | "),
            "push disabled, notification logged only"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

pub fn build_notifier(cfg: &NotifierConfig) -> DynNotifier {
    match cfg {
        NotifierConfig::Wxpusher {
            token,
            uid,
            endpoint,
        } => {
            let mut n = WxPusherNotifier::new(token.clone(), uid.clone());
            if let Some(url) = endpoint {
                n = n.with_endpoint(url.clone());
            }
            Arc::new(n)
        }
        NotifierConfig::Pushplus { token, endpoint } => {
            let mut n = PushPlusNotifier::new(token.clone());
            if let Some(url) = endpoint {
                n = n.with_endpoint(url.clone());
            }
            Arc::new(n)
        }
        NotifierConfig::Log => Arc::new(LogNotifier),
    }
}

fn signed(delta: i64) -> String {
    if delta > 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    }
}

/// Render a price event for a route as a push message.
pub fn compose(route: &Route, ev: &PriceEvent, at: DateTime<Local>) -> Message {
    let date = ev.date.pretty();
    let checked = at.format("%Y-%m-%d %H:%M:%S");
    match ev.kind {
        PriceEventKind::FirstSeen => Message {
            summary: format!("First seen {date} {} ¥{}", ev.shape, ev.price),
            content: format!(
                "[First seen]\nDate: {date}\nFrom: {}\nTo: {}\nType: {}\nPrice: ¥{}\nChecked at: {checked}",
                route.origin, route.destination, ev.shape, ev.price
            ),
        },
        PriceEventKind::Changed { last, delta } => {
            let change = signed(delta);
            Message {
                summary: format!("{date} {} {change} (¥{})", ev.shape, ev.price),
                content: format!(
                    "[Price change]\nDate: {date}\nFrom: {}\nTo: {}\nType: {}\nCurrent price: ¥{}\nPrevious price: ¥{last}\nChange: {change}\nChecked at: {checked}",
                    route.origin, route.destination, ev.shape, ev.price
                ),
            }
        }
    }
}
