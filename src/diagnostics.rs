use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Silent skip events, reported only to callers that ask for them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    FetchFailed { index: usize, reason: String },
    ImageSkipped { index: usize, reason: String },
    NullPartitionValue { index: usize },
    PartitionFailed { label: String, reason: String },
}

pub type DiagnosticSender = UnboundedSender<Diagnostic>;

/// Forward a diagnostic if anyone is listening
pub fn emit(sender: Option<&DiagnosticSender>, diagnostic: Diagnostic) {
    if let Some(sender) = sender {
        // A dropped receiver only means nobody wants diagnostics anymore
        let _ = sender.send(diagnostic);
    }
}
