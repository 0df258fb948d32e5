use super::model::ReferenceDirective;
use crate::evaluation::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;

static DIRECTIVE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*#r\s+"([^"]*)"\s*;?\s*(?://.*)?$"#).expect("directive pattern is valid")
});

static USING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:global\s+)?using\s+(?:static\s+)?[A-Za-z_][\w.]*(?:\s*=\s*[\w.<>, ]+)?\s*;\s*(?://.*)?$")
        .expect("using pattern is valid")
});

/// A directive together with the one-based line it was written on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedDirective {
    pub directive: ReferenceDirective,
    pub line: usize,
}

/// A submission split into its leading reference directives and the code
/// that follows them.
///
/// Directives may be interleaved with `using` lines, blank lines and `//`
/// comments, but must come before the first line of other code. Directive
/// lines are blanked out of `code` so diagnostics from the compiler keep their
/// original line numbers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionPlan {
    pub directives: Vec<LocatedDirective>,
    pub code: String,
}

impl SubmissionPlan {
    pub fn parse(text: &str) -> Result<Self, Vec<Diagnostic>> {
        let mut plan = SubmissionPlan::default();
        let mut diagnostics = Vec::new();
        let mut code_lines = Vec::new();
        let mut in_code = false;

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = line.trim_start();

            if !trimmed.starts_with("#r") || !is_directive_marker(trimmed) {
                if !in_code && !is_preamble(line) {
                    in_code = true;
                }
                code_lines.push(line);
                continue;
            }

            // Column of the marker, one-based.
            let column = line.len() - trimmed.len() + 1;
            code_lines.push("");

            if in_code {
                diagnostics.push(
                    Diagnostic::error("Reference directives must appear before any code in a submission")
                        .with_code("KILN0003")
                        .at(line_no, column),
                );
                continue;
            }

            let Some(captures) = DIRECTIVE_LINE.captures(line) else {
                diagnostics.push(
                    Diagnostic::error(
                        "Malformed reference directive; expected #r \"<path>\" or #r \"nuget: <Package>[, <Version>]\"",
                    )
                    .with_code("KILN0001")
                    .at(line_no, column),
                );
                continue;
            };

            match ReferenceDirective::parse(&captures[1]) {
                Ok(directive) => plan.directives.push(LocatedDirective {
                    directive,
                    line: line_no,
                }),
                Err(err) => diagnostics.push(
                    Diagnostic::error(err.to_string())
                        .with_code(err.code())
                        .at(line_no, column),
                ),
            }
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        plan.code = if code_lines.iter().all(|l| l.trim().is_empty()) {
            String::new()
        } else {
            code_lines.join("\n")
        };
        Ok(plan)
    }

    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

/// `#r` followed by whitespace, a quote, or end of line; `#region` is code.
fn is_directive_marker(trimmed: &str) -> bool {
    matches!(trimmed[2..].chars().next(), None | Some('"') | Some(' ') | Some('\t'))
}

fn is_preamble(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("//") || USING_LINE.is_match(line)
}
