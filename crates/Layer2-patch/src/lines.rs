//! Line-level editing helpers
//!
//! Every existing line keeps its own terminator (`\n`, `\r\n` or none for a
//! final unterminated line). Inserted lines use the file's dominant ending.

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
    eol: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineBuffer {
    lines: Vec<Line>,
    eol: &'static str,
}

impl LineBuffer {
    pub(crate) fn parse(content: &str) -> Self {
        let lines = content
            .split_inclusive('\n')
            .map(|raw| match raw.strip_suffix("\r\n") {
                Some(text) => Line {
                    text: text.to_string(),
                    eol: "\r\n",
                },
                None => match raw.strip_suffix('\n') {
                    Some(text) => Line {
                        text: text.to_string(),
                        eol: "\n",
                    },
                    None => Line {
                        text: raw.to_string(),
                        eol: "",
                    },
                },
            })
            .collect();
        Self {
            lines,
            eol: eol_of(content),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    fn unterminated_tail(&self) -> bool {
        self.lines.last().map_or(false, |line| line.eol.is_empty())
    }

    /// Replace `start..end` (0-based, exclusive) with `code`'s lines
    pub(crate) fn splice(&mut self, start: usize, end: usize, code: &str) {
        let at_tail = end == self.lines.len();
        let unterminated = self.unterminated_tail();
        let fresh = self.code_lines(code);
        self.lines.splice(start..end, fresh);
        // an edit reaching the end keeps the file's missing final newline
        if at_tail && unterminated {
            if let Some(last) = self.lines.last_mut() {
                last.eol = "";
            }
        }
    }

    /// Insert `code`'s lines before index `at`
    pub(crate) fn insert(&mut self, at: usize, code: &str) {
        if self.lines.is_empty() {
            self.lines = self.code_lines(code);
            if !code.ends_with('\n') {
                if let Some(last) = self.lines.last_mut() {
                    last.eol = "";
                }
            }
            return;
        }
        if at >= self.lines.len() {
            let unterminated = self.unterminated_tail();
            let eol = self.eol;
            if let Some(last) = self.lines.last_mut() {
                if last.eol.is_empty() {
                    last.eol = eol;
                }
            }
            let fresh = self.code_lines(code);
            self.lines.extend(fresh);
            if unterminated {
                if let Some(last) = self.lines.last_mut() {
                    last.eol = "";
                }
            }
            return;
        }
        let fresh = self.code_lines(code);
        self.lines.splice(at..at, fresh);
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(line.eol);
        }
        out
    }

    fn code_lines(&self, code: &str) -> Vec<Line> {
        code.lines()
            .map(|text| Line {
                text: text.to_string(),
                eol: self.eol,
            })
            .collect()
    }
}

/// Dominant line ending of `content`; ties go to `\n`
pub(crate) fn eol_of(content: &str) -> &'static str {
    let crlf = content.matches("\r\n").count();
    let lf = content.matches('\n').count() - crlf;
    if crlf > lf {
        "\r\n"
    } else {
        "\n"
    }
}

/// Concatenate text, putting a line break between the parts when the first
/// does not already end with one
pub(crate) fn join_text(first: &str, second: &str) -> String {
    if first.is_empty() {
        return second.to_string();
    }
    if second.is_empty() {
        return first.to_string();
    }
    let separator = if first.ends_with('\n') { "" } else { eol_of(first) };
    format!("{first}{separator}{second}")
}
