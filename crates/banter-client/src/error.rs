use thiserror::Error;

/// Client-side failure taxonomy.
///
/// Authorization failures are deliberately surfaced to the user exactly
/// like network failures; the distinction is a security property, not a
/// UX one.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The store is unreachable or answered with a non-success status.
    #[error("Network error: {0}")]
    Network(String),

    /// Input rejected before any network call or cache mutation.
    #[error("{0}")]
    Validation(String),

    /// The channel does not belong to the caller's current workspace.
    #[error("Not authorized for this channel")]
    Authorization,
}

impl ClientError {
    /// The text shown to the user.  Validation messages are surfaced
    /// inline next to the input; everything else collapses into one
    /// generic notice.
    pub fn user_notice(&self) -> String {
        match self {
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Network(_) | ClientError::Authorization => {
                "Something went wrong".to_string()
            }
        }
    }
}

impl From<banter_shared::SharedError> for ClientError {
    fn from(err: banter_shared::SharedError) -> Self {
        ClientError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_reads_like_a_network_failure() {
        assert_eq!(
            ClientError::Authorization.user_notice(),
            ClientError::Network("boom".into()).user_notice()
        );
    }
}
