//! Notification Module
//! Mission: Best-effort welcome notifications off the registration path

pub mod dispatcher;
pub mod mailer;

pub use dispatcher::{NotificationDispatcher, WelcomeJob};
pub use mailer::{HttpMailer, LogMailer, WelcomeMailer};
