//! Prompt builder
//!
//! Renders the outbound prompt. Agent mode adds the reply-format preamble the
//! response parser understands. The user's code is redacted before it is
//! embedded.

use anvil_foundation::redact;

/// Reply format description sent in agent mode
pub const AGENT_MODE_PREAMBLE: &str = "\
You are editing files in the user's workspace. Reply with one block per file:

--- FILE: <path relative to the workspace root> ---
action: replace | append | prepend | insert   (optional, default replace)
lines: <start>-<end>                          (optional, 1-based, inclusive)
```<language>
<code>
```

Rules:
- Use paths relative to the workspace root; never absolute paths or '..'.
- Without `lines:`, `replace` rewrites the whole file.
- `insert` places the code before `lines:` start; without it the code is appended.
- Text outside these blocks is ignored.";

/// Builds the prompt for one request
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
    action: String,
    code: String,
    agent_mode: bool,
    file_hint: Option<String>,
}

impl PromptBuilder {
    pub fn new(
        code: impl Into<String>,
        language: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            action: action.into(),
            agent_mode: false,
            file_hint: None,
        }
    }

    pub fn agent_mode(mut self, enabled: bool) -> Self {
        self.agent_mode = enabled;
        self
    }

    /// Path the code came from, mentioned so edits can target it
    pub fn file_hint(mut self, path: impl Into<String>) -> Self {
        self.file_hint = Some(path.into());
        self
    }

    pub fn build(&self) -> String {
        let language = match self.language.trim() {
            "" => "text",
            lang => lang,
        };

        let mut prompt = String::new();
        if self.agent_mode {
            prompt.push_str(AGENT_MODE_PREAMBLE);
            prompt.push_str("\n\n");
        }

        prompt.push_str(&format!("Task: {}\n", self.action.trim()));
        prompt.push_str(&format!("Language: {}\n", language));
        if let Some(path) = &self.file_hint {
            prompt.push_str(&format!("File: {}\n", path));
        }

        let code = redact(&self.code);
        prompt.push_str(&format!("\n```{}\n{}", language, code));
        if !code.ends_with('\n') {
            prompt.push('\n');
        }
        prompt.push_str("```\n");
        prompt
    }
}
