use thiserror::Error;

/// Opaque error wrapper keeping `Result<T>` one machine word wide.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct SpindleError(Box<ErrorKind>);

impl SpindleError {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("ParseError: {0}")]
    Parse(#[from] spindle_cypher::ParseError),
    #[error("SerdeJsonError: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("KubeClientError: {0}")]
    KubeClient(#[from] kube::Error),
    #[error("KubeconfigError: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),
    #[error("KubeconfigInferError: {0}")]
    KubeconfigInfer(#[from] kube::config::InClusterError),
    #[error("InvalidRegex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("invalid kind: {0:?}")]
    InvalidKind(String),
    #[error("ambiguous kind `{kind}`: candidates are {}", candidates.join(", "))]
    AmbiguousKind {
        kind: String,
        candidates: Vec<String>,
    },
    #[error("{kind} `{name}` not found in namespace `{namespace}`")]
    ResourceNotFound {
        kind: String,
        name: String,
        namespace: String,
    },
    #[error("node `{node}` combines a name selector with label selectors")]
    ConflictingSelectors { node: String },
    #[error("cannot bind a kind for node `{node}`: candidates are {}", candidates.join(", "))]
    AmbiguousKindlessNode {
        node: String,
        candidates: Vec<String>,
    },
    #[error("cannot infer a kind for node `{0}` from its relationships")]
    UnresolvedKindlessChain(String),
    #[error("no relationship rule connects {kind_a} and {kind_b}")]
    NoRelationshipRule { kind_a: String, kind_b: String },
    #[error("no creation template for {kind_a} -> {kind_b}")]
    NoCreationTemplate { kind_a: String, kind_b: String },
    #[error("patch conflict on {kind} `{name}`: {details}")]
    PatchConflict {
        kind: String,
        name: String,
        details: String,
    },
    #[error("patch failed on {kind} `{name}`: {details}")]
    PatchFailed {
        kind: String,
        name: String,
        details: String,
    },
    /// Per-resource mutation failures, collected while the remaining
    /// targets were still attempted.
    #[error("{} mutation(s) failed:\n{}", failures.len(), failures.join("\n"))]
    MutationFailures { failures: Vec<String> },
    #[error("invalid duration literal: {0:?}")]
    InvalidDuration(String),
    #[error("ProviderError: {0}")]
    Provider(String),
    #[error("canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl<E> From<E> for SpindleError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        SpindleError(Box::new(ErrorKind::from(err)))
    }
}
