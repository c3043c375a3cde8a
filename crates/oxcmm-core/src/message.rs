//! Process-wide diagnostic sink
//!
//! Every warning and error raised by the engine is routed through one
//! message function. Without an installed hook the messages are forwarded
//! to `tracing` at the matching level, so a `tracing-subscriber` set up by
//! the application sees them like any other event.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::object::{Object, ObjectKind};

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    Debug,
    Warning,
    Error,
}

/// Identity of the object a message refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub kind: ObjectKind,
    pub id: u32,
    pub nick: Option<String>,
}

impl Origin {
    pub fn of(object: &Object) -> Self {
        Self {
            kind: object.kind(),
            id: object.id(),
            nick: object.name(crate::object::NameKind::Nick),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.nick {
            Some(nick) => write!(f, "{:?}[{}] {}", self.kind, self.id, nick),
            None => write!(f, "{:?}[{}]", self.kind, self.id),
        }
    }
}

/// Signature of an installed message hook
pub type MessageFunc = Arc<dyn Fn(MessageLevel, Option<&Origin>, &str) + Send + Sync>;

static MESSAGE_FUNC: Lazy<RwLock<Option<MessageFunc>>> = Lazy::new(|| RwLock::new(None));

/// Install the message hook, replacing any previous one.
///
/// Passing `None` restores forwarding to `tracing`.
pub fn set_message_func(func: Option<MessageFunc>) {
    *MESSAGE_FUNC.write() = func;
}

/// Deliver one diagnostic.
pub fn emit(level: MessageLevel, origin: Option<&Object>, args: fmt::Arguments<'_>) {
    let origin = origin.map(Origin::of);
    let hook = MESSAGE_FUNC.read().clone();
    match hook {
        Some(func) => {
            let text = args.to_string();
            func(level, origin.as_ref(), &text);
        }
        None => forward_to_tracing(level, origin.as_ref(), args),
    }
}

fn forward_to_tracing(level: MessageLevel, origin: Option<&Origin>, args: fmt::Arguments<'_>) {
    let origin = origin.map(|o| o.to_string()).unwrap_or_default();
    match level {
        MessageLevel::Debug => tracing::debug!(origin = %origin, "{}", args),
        MessageLevel::Warning => tracing::warn!(origin = %origin, "{}", args),
        MessageLevel::Error => tracing::error!(origin = %origin, "{}", args),
    }
}

/// Emit a diagnostic through the process-wide message hook.
///
/// `report!(Warning, Some(obj.object()), "text {}", arg)`
macro_rules! report {
    ($level:ident, $origin:expr, $($arg:tt)+) => {
        $crate::message::emit(
            $crate::message::MessageLevel::$level,
            $origin,
            format_args!($($arg)+),
        )
    };
}

pub(crate) use report;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Serializes tests that install a process-wide hook.
    pub(crate) static HOOK_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    #[test]
    fn test_hook_receives_messages() {
        let _guard = HOOK_GUARD.lock();
        let seen: Arc<Mutex<Vec<(MessageLevel, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        set_message_func(Some(Arc::new(move |level, _origin, text| {
            sink.lock().push((level, text.to_string()));
        })));

        let obj = Object::new(ObjectKind::Profile);
        report!(Warning, Some(&obj), "tag {} corrupted", "desc");
        set_message_func(None);

        let seen = seen.lock();
        assert!(
            seen.iter()
                .any(|(level, text)| *level == MessageLevel::Warning && text == "tag desc corrupted")
        );
    }
}
