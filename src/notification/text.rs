//! Notification wording.

/// Title of reminder notifications.
pub const REMINDER_TITLE: &str = "Todo reminder";

/// Title of completion notifications.
pub const COMPLETION_TITLE: &str = "Task completed";

/// Relative phrase for a reminder lead time in minutes.
///
/// `0 → "now"`, `60 → "in 1 hour"`, `1440 → "in 1 day"`, longer spans as
/// hours with an optional minute remainder, shorter ones in minutes.
pub fn reminder_text(minutes: u32) -> String {
    match minutes {
        0 => "now".to_owned(),
        60 => "in 1 hour".to_owned(),
        1440 => "in 1 day".to_owned(),
        m if m > 60 => {
            let hours = m / 60;
            let rest = m % 60;
            let unit = if hours == 1 { "hour" } else { "hours" };
            if rest == 0 {
                format!("in {hours} {unit}")
            } else {
                format!("in {hours} {unit} {rest} minutes")
            }
        }
        1 => "in 1 minute".to_owned(),
        m => format!("in {m} minutes"),
    }
}

/// Body of a reminder notification.
pub fn reminder_message(title: &str, time_text: &str) -> String {
    format!("\"{title}\" is due {time_text}")
}

/// Body of a completion notification.
pub fn completion_message(title: &str) -> String {
    format!("Congratulations! You completed: {title}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_text_covers_named_spans() {
        assert_eq!(reminder_text(0), "now");
        assert_eq!(reminder_text(1), "in 1 minute");
        assert_eq!(reminder_text(15), "in 15 minutes");
        assert_eq!(reminder_text(60), "in 1 hour");
        assert_eq!(reminder_text(90), "in 1 hour 30 minutes");
        assert_eq!(reminder_text(120), "in 2 hours");
        assert_eq!(reminder_text(1440), "in 1 day");
        assert_eq!(reminder_text(1500), "in 25 hours");
    }

    #[test]
    fn messages_embed_title() {
        assert_eq!(
            reminder_message("Pay rent", "in 1 hour"),
            "\"Pay rent\" is due in 1 hour"
        );
        assert!(completion_message("Pay rent").ends_with("Pay rent"));
    }
}
