use owo_colors::OwoColorize;
use std::fmt;

/// A byte range in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.notes.push(format!("help: {}", help.into()));
        self
    }
}

/// 1-based line and column (in characters) of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn line_text(source: &str, line_num: usize) -> Option<&str> {
    source.split('\n').nth(line_num - 1)
}

/// Renders diagnostics against the template text they point into.
pub struct DiagnosticRenderer<'a> {
    source: &'a str,
    file_name: &'a str,
    use_color: bool,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a str, file_name: &'a str, use_color: bool) -> Self {
        Self {
            source,
            file_name,
            use_color,
        }
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut output = String::new();
        self.render_header(&mut output, diagnostic);

        // Labels without a real position are rendered as header-only.
        let label = diagnostic.labels.iter().find(|label| !label.span.is_dummy());
        if let Some(label) = label {
            let (line, col) = line_col(self.source, label.span.start);
            let gutter = " ".repeat(line.to_string().len() + 1);
            output.push_str(&format!(
                "  {} {}:{}:{}\n",
                self.blue("-->"),
                self.file_name,
                line,
                col
            ));
            output.push_str(&format!("{}{}\n", gutter, self.blue("|")));
            if let Some(text) = line_text(self.source, line) {
                output.push_str(&format!(
                    "{} {} {}\n",
                    self.blue(&line.to_string()),
                    self.blue("|"),
                    text
                ));
                let (end_line, end_col) =
                    line_col(self.source, label.span.end.max(label.span.start + 1));
                let width = if end_line == line && end_col > col {
                    end_col - col
                } else {
                    1
                };
                let mut underline = format!("{}{}", " ".repeat(col - 1), "^".repeat(width));
                if !label.message.is_empty() {
                    underline.push(' ');
                    underline.push_str(&label.message);
                }
                output.push_str(&format!("{}{} {}\n", gutter, self.blue("|"), self.red(&underline)));
            }
        }

        for note in &diagnostic.notes {
            output.push_str(&format!("  {} {}\n", self.blue("="), note));
        }
        output
    }

    fn render_header(&self, output: &mut String, diagnostic: &Diagnostic) {
        let severity = diagnostic.severity.to_string();
        let severity = match diagnostic.severity {
            Severity::Error => self.red_bold(&severity),
            Severity::Warning => self.yellow_bold(&severity),
        };
        match &diagnostic.code {
            Some(code) => output.push_str(&format!(
                "{}[{}]: {}\n",
                severity,
                code,
                self.bold(&diagnostic.message)
            )),
            None => output.push_str(&format!("{}: {}\n", severity, self.bold(&diagnostic.message))),
        }
    }

    fn red(&self, s: &str) -> String {
        if self.use_color {
            s.red().to_string()
        } else {
            s.to_string()
        }
    }

    fn red_bold(&self, s: &str) -> String {
        if self.use_color {
            s.red().bold().to_string()
        } else {
            s.to_string()
        }
    }

    fn yellow_bold(&self, s: &str) -> String {
        if self.use_color {
            s.yellow().bold().to_string()
        } else {
            s.to_string()
        }
    }

    fn blue(&self, s: &str) -> String {
        if self.use_color {
            s.blue().to_string()
        } else {
            s.to_string()
        }
    }

    fn bold(&self, s: &str) -> String {
        if self.use_color {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }
}

pub fn render_diagnostics(
    source: &str,
    file_name: &str,
    diagnostics: &[Diagnostic],
    use_color: bool,
) -> String {
    let renderer = DiagnosticRenderer::new(source, file_name, use_color);
    let mut output = String::new();
    for diagnostic in diagnostics {
        output.push_str(&renderer.render(diagnostic));
    }
    output
}
