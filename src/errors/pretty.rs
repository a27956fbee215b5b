use crate::source::Span;

/// Renders the source line(s) covered by `span` with a caret row under
/// the offending columns. At most two lines are shown.
pub fn excerpt(span: &Span) -> String {
    let source = &span.start.source;
    let first = span.start.line;
    let last = span.end.line.max(first).min(first + 1);

    let mut out = String::new();
    for line_no in first..=last {
        let Some(line) = source.line(line_no) else {
            continue;
        };
        let line: String = line.chars().map(|c| if c == '\t' { ' ' } else { c }).collect();
        let start_col = if line_no == first { span.start.column } else { 1 };
        let end_col = if line_no == span.end.line {
            span.end.column
        } else {
            line.chars().count() + 1
        };

        out.push_str(&line);
        out.push('\n');
        for _ in 1..start_col {
            out.push(' ');
        }
        let width = end_col.saturating_sub(start_col).max(1);
        for _ in 0..width {
            out.push('^');
        }
        out.push('\n');
    }
    out
}
