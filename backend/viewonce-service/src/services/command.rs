/// Recognises the access-request command, e.g. `.vo` or `!VO please`.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    prefixes: Vec<String>,
    command: String,
}

impl CommandMatcher {
    pub fn new(prefixes: Vec<String>, command: String) -> Self {
        Self { prefixes, command }
    }

    /// Prefix, then the command word (case-insensitive), then end of text or
    /// whitespace.
    pub fn is_request(&self, text: &str) -> bool {
        let text = text.trim_start();

        self.prefixes.iter().any(|prefix| {
            let Some(rest) = text.strip_prefix(prefix.as_str()) else {
                return false;
            };
            let Some(word) = rest.get(..self.command.len()) else {
                return false;
            };
            if !word.eq_ignore_ascii_case(&self.command) {
                return false;
            }

            rest[self.command.len()..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace)
        })
    }
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::new(
            vec![".".to_string(), "!".to_string(), "/".to_string()],
            "vo".to_string(),
        )
    }
}
