use std::fmt;

/// Which part of a decode produced an error or a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStage {
    Container,
    Header,
    Dispatch,
    Rows,
    Materialize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A non-fatal finding attached to a decode result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub stage: DecodeStage,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// The source ran out before every row was decoded.
    Truncated,
    /// A row hit the packet safety limit.
    PacketLimit,
    /// Header flags were overridden by the packed-size heuristic.
    FormatCorrected,
    /// Dimensions were derived from the stream itself.
    DimensionsDetected,
}

impl Diagnostic {
    pub fn new(
        stage: DecodeStage,
        severity: Severity,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            severity,
            kind,
            message: message.into(),
        }
    }

    pub fn truncated(stage: DecodeStage, message: impl Into<String>) -> Self {
        Self::new(stage, Severity::Warning, DiagnosticKind::Truncated, message)
    }

    /// Forward the diagnostic to the `log` facade at a matching level.
    pub fn log(&self) {
        match self.severity {
            Severity::Info => log::debug!("{self}"),
            Severity::Warning => log::warn!("{self}"),
            Severity::Error => log::error!("{self}"),
        }
    }
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeStage::Container => "container",
            DecodeStage::Header => "header",
            DecodeStage::Dispatch => "dispatch",
            DecodeStage::Rows => "rows",
            DecodeStage::Materialize => "materialize",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
