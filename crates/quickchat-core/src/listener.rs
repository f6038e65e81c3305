//! Notification sink for the view layer.

use crate::Message;

/// Callbacks a session consumer implements to react to message arrival.
///
/// Both methods are invoked on the coordinator's single delivery context,
/// strictly after the message store reflects the change, so implementations
/// never need their own locking to read the store consistently.
pub trait SessionListener: Send + Sync {
    /// The message list was extended; re-read counts/contents.
    fn on_messages_changed(&self);

    /// A specific new message arrived (scroll-to-bottom style hook).
    fn on_new_message(&self, message: &Message);
}

/// Listener that ignores all notifications.
pub struct NullListener;

impl SessionListener for NullListener {
    fn on_messages_changed(&self) {}
    fn on_new_message(&self, _message: &Message) {}
}
