use std::time::Duration;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn duration_from_hours(hours: f64) -> Duration {
    Duration::try_from_secs_f64((hours * 3600.0).max(0.0)).unwrap_or(Duration::MAX)
}

pub trait EscapeHtml {
    fn escape_html(&self) -> String;
}

impl EscapeHtml for str {
    fn escape_html(&self) -> String {
        let mut out = String::with_capacity(self.len());
        for c in self.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}

/// Implement the trait for `String` by forwarding the method to `str`
impl EscapeHtml for String {
    fn escape_html(&self) -> String {
        self.as_str().escape_html()
    }
}
