pub mod notify;
pub mod validation;

pub use notify::{notify_error, notify_success, ConsoleNotifier, Notifier, Severity};
pub use validation::is_valid_string;
