//! User-facing notifications for export outcomes.

use std::cell::RefCell;

use crate::types::Notification;

/// Shows a toast or an equivalent message to the user.
pub trait Notifier {
    fn notify(&self, notification: &Notification);
}

/// `window.alert` in the browser, stderr elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlertNotifier;

impl Notifier for AlertNotifier {
    #[cfg(target_arch = "wasm32")]
    fn notify(&self, notification: &Notification) {
        if notification.is_failure() {
            tracing::warn!(title = %notification.title, "{}", notification.description);
        }
        if let Some(window) = web_sys::window() {
            let text = format!("{}\n\n{}", notification.title, notification.description);
            let _ = window.alert_with_message(&text);
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn notify(&self, notification: &Notification) {
        if notification.is_failure() {
            tracing::warn!(title = %notification.title, "{}", notification.description);
            eprintln!("error: {}: {}", notification.title, notification.description);
        } else {
            eprintln!("{}: {}", notification.title, notification.description);
        }
    }
}

/// Collects notifications instead of showing them.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    seen: RefCell<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.borrow().clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: &Notification) {
        self.seen.borrow_mut().push(notification.clone());
    }
}

impl<N: Notifier + ?Sized> Notifier for std::rc::Rc<N> {
    fn notify(&self, notification: &Notification) {
        (**self).notify(notification);
    }
}
