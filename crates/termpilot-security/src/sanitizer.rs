/// Input sanitizer applied to REPL lines before classification, and to
/// session ids before they are used as file names.
pub struct Sanitizer {
    max_line_length: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_line_length: 4_096,
        }
    }
}

impl Sanitizer {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    /// Sanitize one input line: strip control characters (keeping tabs),
    /// enforce the length limit, trim surrounding whitespace.
    pub fn sanitize(&self, input: &str) -> SanitizeResult {
        if input.len() > self.max_line_length {
            return SanitizeResult::Rejected(format!(
                "Input exceeds maximum length of {} bytes",
                self.max_line_length
            ));
        }

        let cleaned: String = input
            .chars()
            .filter(|c| !c.is_control() || *c == '\t')
            .collect();
        let trimmed = cleaned.trim();

        if trimmed.is_empty() && !input.trim().is_empty() {
            return SanitizeResult::Rejected("Input contains only control characters".to_string());
        }

        if trimmed != input {
            SanitizeResult::Cleaned(trimmed.to_string())
        } else {
            SanitizeResult::Clean(trimmed.to_string())
        }
    }

    /// Whether `id` is safe to embed in a file name (`[A-Za-z0-9_-]+`).
    pub fn is_valid_session_id(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= 128
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

#[derive(Debug, PartialEq)]
pub enum SanitizeResult {
    /// Input was already clean.
    Clean(String),
    /// Input was cleaned (control characters or padding removed).
    Cleaned(String),
    /// Input was rejected entirely.
    Rejected(String),
}

impl SanitizeResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SanitizeResult::Rejected(_))
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            SanitizeResult::Clean(s) | SanitizeResult::Cleaned(s) => Some(s),
            SanitizeResult::Rejected(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input() {
        let s = Sanitizer::default();
        assert_eq!(
            s.sanitize("ls -la"),
            SanitizeResult::Clean("ls -la".to_string())
        );
    }

    #[test]
    fn test_control_chars_stripped() {
        let s = Sanitizer::default();
        let result = s.sanitize("cat\x00 \x1b[31mnotes.txt\r\n");
        assert_eq!(
            result,
            SanitizeResult::Cleaned("cat [31mnotes.txt".to_string())
        );
    }

    #[test]
    fn test_length_rejection() {
        let s = Sanitizer::new(10);
        assert!(s.sanitize("echo this is far too long").is_rejected());
    }

    #[test]
    fn test_only_control_chars_rejected() {
        let s = Sanitizer::default();
        assert!(s.sanitize("\x01\x02\x03").is_rejected());
        assert_eq!(s.sanitize("   ").into_string(), Some(String::new()));
    }

    #[test]
    fn test_session_id_validation() {
        assert!(Sanitizer::is_valid_session_id("session_1"));
        assert!(Sanitizer::is_valid_session_id("session_4242_1700000000"));
        assert!(!Sanitizer::is_valid_session_id(""));
        assert!(!Sanitizer::is_valid_session_id("../etc/passwd"));
        assert!(!Sanitizer::is_valid_session_id("a b"));
    }
}
