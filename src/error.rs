use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use thiserror::Error;

/// Field name to message mapping produced by save-time validation.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), message.into());
        Self(fields)
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(|m| m.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(ValidationErrors),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transport: {0}")]
    Transport(String),
}

impl ModelError {
    /// The field→message map for validation failures, if any.
    pub fn fields(&self) -> Option<&ValidationErrors> {
        match self {
            ModelError::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}

type ErrorSink = Box<dyn Fn(&ModelError) + Send + Sync>;

static SINK: OnceLock<ErrorSink> = OnceLock::new();

/// Install a process-wide error sink. May be set once; later calls are ignored.
pub fn set_error_sink<F>(sink: F)
where
    F: Fn(&ModelError) + Send + Sync + 'static,
{
    let _ = SINK.set(Box::new(sink));
}

/// Report a failure to the error sink. Side channel only; callers still
/// propagate the error.
pub fn report(err: &ModelError) {
    log::error!("{}", err);
    if let Some(sink) = SINK.get() {
        sink(err);
    }
}
