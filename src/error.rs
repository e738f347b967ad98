use thiserror::Error;

/// Fatal conditions that end a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("metadata signature verification failed")]
    Verification,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unsupported metadata document: {0}")]
    UnsupportedDocument(String),

    #[error("XML parse error: {0}")]
    Xml(String),
}

impl ProvisionError {
    /// Process exit code for this error: `1` when the run was refused or
    /// aborted by the remote side, `2` when the input could not be used.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::Verification | ProvisionError::Transport(_) => 1,
            ProvisionError::UnsupportedDocument(_) | ProvisionError::Xml(_) => 2,
        }
    }
}

/// Failure of a connection management call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The service answered, but not with the expected acknowledgement.
    #[error("{operation} for \"{entity_id}\" was not acknowledged: {body}")]
    Rejected {
        operation: &'static str,
        entity_id: String,
        body: String,
    },

    #[error("{operation} for \"{entity_id}\" failed: {message}")]
    Http {
        operation: &'static str,
        entity_id: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ProvisionError::Verification.exit_code(), 1);
        assert_eq!(ProvisionError::Xml("x".into()).exit_code(), 2);
        let rejected = TransportError::Rejected {
            operation: "saveConnection",
            entity_id: "urn:x".into(),
            body: "<fault/>".into(),
        };
        assert!(rejected.to_string().contains("urn:x"));
        assert_eq!(ProvisionError::from(rejected).exit_code(), 1);
    }
}
