use crate::{
    language::{
        errors::{SyntaxError, SyntaxErrors},
        source::SourceFile,
        span::Span,
    },
    runtime::error::Uncaught,
};
use miette::{
    Diagnostic, GraphicalReportHandler, GraphicalTheme, NamedSource, Report, SourceSpan,
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(file: &SourceFile, err: &SyntaxError) -> Self {
        Self {
            src: named(file),
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label.clone(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct UncaughtDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    message: String,
    label: String,
}

fn named(file: &SourceFile) -> NamedSource {
    NamedSource::new(file.name.clone(), file.text.clone())
}

fn span_to_source_span(span: Span) -> SourceSpan {
    SourceSpan::from((span.start, span.end.saturating_sub(span.start)))
}

/// Renders without colour so the text can go straight into a log line.
fn render(diagnostic: &dyn Diagnostic) -> String {
    let mut out = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    match handler.render_report(&mut out, diagnostic) {
        Ok(()) => out.trim_end().to_string(),
        Err(_) => diagnostic.to_string(),
    }
}

pub fn render_syntax_errors(file: &SourceFile, errors: &SyntaxErrors) -> String {
    errors
        .errors
        .iter()
        .map(|err| render(&SyntaxDiagnostic::from_error(file, err)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_uncaught(uncaught: &Uncaught) -> String {
    let Some(site) = &uncaught.site else {
        return uncaught.to_string();
    };
    let diagnostic = UncaughtDiagnostic {
        src: named(&site.source),
        span: span_to_source_span(site.span),
        message: uncaught.to_string(),
        label: match uncaught.thrown_value() {
            Some(_) => "thrown here".to_string(),
            None => "raised here".to_string(),
        },
    };
    render(&diagnostic)
}

pub fn emit_syntax_errors(file: &SourceFile, errors: &SyntaxErrors) {
    for err in &errors.errors {
        let diagnostic = SyntaxDiagnostic::from_error(file, err);
        eprintln!("{:?}", Report::new(diagnostic));
    }
}
