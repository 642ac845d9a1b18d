//! Error types and reporting

use crate::ast::Span;
use crate::interp::RuntimeError;
use thiserror::Error;

/// Result type alias for the front end
pub type Result<T> = std::result::Result<T, CompileError>;

/// Lexing/parsing error
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("{file}:{span}: syntax error: {message}")]
    Lexer {
        message: String,
        span: Span,
        file: String,
    },

    #[error("{file}:{span}: syntax error: {message}")]
    Parser {
        message: String,
        span: Span,
        file: String,
    },

    /// A top-level function defined twice in one module
    #[error("{file}:{span}: syntax error: {message}")]
    Redefinition {
        message: String,
        span: Span,
        file: String,
    },
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span, file: &str) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
            file: file.to_string(),
        }
    }

    pub fn parser(message: impl Into<String>, span: Span, file: &str) -> Self {
        Self::Parser {
            message: message.into(),
            span,
            file: file.to_string(),
        }
    }

    pub fn redefinition(name: &str, span: Span, file: &str) -> Self {
        Self::Redefinition {
            message: format!("redefinition of function '{name}'"),
            span,
            file: file.to_string(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Lexer { span, .. } | Self::Parser { span, .. } | Self::Redefinition { span, .. } => {
                *span
            }
        }
    }

    pub fn file(&self) -> &str {
        match self {
            Self::Lexer { file, .. } | Self::Parser { file, .. } | Self::Redefinition { file, .. } => {
                file
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexer { message, .. }
            | Self::Parser { message, .. }
            | Self::Redefinition { message, .. } => message,
        }
    }
}

/// Any error that ends a run
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// File and span the error points at, when known
    pub fn location(&self) -> Option<(&str, Span)> {
        match self {
            Error::Compile(e) => Some((e.file(), e.span())),
            Error::Runtime(e) => e.file.as_deref().zip(e.span),
            Error::Io { .. } => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Error::Compile(e) => e.message().to_string(),
            Error::Runtime(e) => e.message.clone(),
            Error::Io { source, .. } => source.to_string(),
        }
    }
}

/// Report an error on stderr.
///
/// The first line is always `<file>:<line>:<column>: <kind> error: <message>`.
/// When `source` is the text of the file the error points at, an ariadne
/// snippet follows.
pub fn report_error(error: &Error, source: Option<&str>) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    eprintln!("{error}");

    let (Some(source), Some((file, span))) = (source, error.location()) else {
        return;
    };
    let range = span.start..span.end.max(span.start + 1).min(source.len().max(1));
    let _ = Report::build(ReportKind::Error, (file, range.clone()))
        .with_label(
            Label::new((file, range))
                .with_message(error.label())
                .with_color(Color::Red),
        )
        .finish()
        .eprint((file, Source::from(source)));
}
