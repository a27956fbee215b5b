pub mod pretty;

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use thiserror::Error as ThisError;

use crate::runtime::scope::CallContext;
use crate::source::{Position, Span};

/// The closed error taxonomy. The first three abort lexing or parsing;
/// the rest are raised during evaluation and carry a call context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("Illegal character")]
    IllegalCharacter,
    #[error("Expected character")]
    ExpectedCharacter,
    #[error("Invalid syntax")]
    InvalidSyntax,
    #[error("Unsupported operation")]
    UnsupportedOperation,
    #[error("Index out of bounds")]
    IndexOutOfBounds,
    #[error("File access error")]
    FileAccess,
    #[error("Import error")]
    Import,
    #[error("Argument error")]
    Argument,
    #[error("Illegal access")]
    IllegalAccess,
}

#[derive(Debug, Clone)]
pub struct LangError {
    pub kind: ErrorKind,
    pub details: String,
    pub span: Span,
    pub context: Option<Rc<CallContext>>,
}

impl LangError {
    pub fn new(kind: ErrorKind, details: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            details: details.into(),
            span,
            context: None,
        }
    }

    pub fn with_context(
        kind: ErrorKind,
        details: impl Into<String>,
        span: Span,
        context: Rc<CallContext>,
    ) -> Self {
        Self {
            kind,
            details: details.into(),
            span,
            context: Some(context),
        }
    }

    /// Attaches a call context to an error raised without one (builtins
    /// report positions only; the evaluator owns the call chain).
    pub fn contextualize(mut self, context: &Rc<CallContext>) -> Self {
        if self.context.is_none() {
            self.context = Some(Rc::clone(context));
        }
        self
    }
}

impl fmt::Display for LangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => {
                writeln!(f, "Traceback (most recent call last):")?;
                write_trace(f, &self.span.start, context)?;
            }
            None => {
                writeln!(
                    f,
                    "File \"{}\", line {}",
                    self.span.start.source.filename, self.span.start.line
                )?;
            }
        }
        f.write_str(&pretty::excerpt(&self.span))?;
        write!(f, "{}: {}", self.kind, self.details)
    }
}

impl Error for LangError {}

/// One `File "...", line N, in name` frame per call context, outermost
/// call first.
fn write_trace(
    f: &mut fmt::Formatter<'_>,
    error_pos: &Position,
    context: &Rc<CallContext>,
) -> fmt::Result {
    let mut frames = Vec::new();
    let mut pos = Some(error_pos.clone());
    let mut current = Some(Rc::clone(context));
    while let Some(ctx) = current {
        if let Some(p) = &pos {
            frames.push(format!(
                "  File \"{}\", line {}, in {}",
                p.source.filename, p.line, ctx.display_name
            ));
        }
        pos = ctx.entry_pos.clone();
        current = ctx.parent.clone();
    }
    for frame in frames.iter().rev() {
        writeln!(f, "{}", frame)?;
    }
    Ok(())
}
