use clausal::{ClausalError, ErrorKind};

/// Format a ClausalError for the terminal, labelled with its kind
pub fn format_error(error: &ClausalError) -> String {
    match error {
        ClausalError::Batch { index, source } => {
            format!(
                "Batch error: query {} failed\n  {}",
                index + 1,
                format_error(source).replace('\n', "\n  ")
            )
        }
        ClausalError::Consult { path, diagnostic } => {
            // engine diagnostics may span several lines; keep them intact under the header
            format!(
                "Syntax error in {}:\n{}",
                path.display(),
                diagnostic.trim_end()
            )
        }
        other => format!("{}: {}", label(other.kind()), other),
    }
}

fn label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "Invalid query",
        ErrorKind::Resource => "Missing resource",
        ErrorKind::Execution => "Engine error",
        ErrorKind::Batch => "Batch error",
    }
}
