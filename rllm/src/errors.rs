use rllm_types::RllmError;
use tracing::debug;

/// Display error in a user-friendly format without stack traces.
pub fn display_user_error(err: &anyhow::Error) {
    eprintln!("rllm: {}", user_message(err));
}

/// One-line message for `err`, with hints for the errors users can fix.
pub fn user_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<RllmError>() {
        Some(RllmError::NotFound(id)) => {
            format!("no history entry with id {} (see `rllm history`)", id)
        }
        Some(RllmError::Config(reason)) => format!(
            "invalid configuration: {} (see `rllm config`)",
            reason
        ),
        Some(RllmError::Superseded) => {
            debug!("request superseded");
            "request was replaced by a newer one".to_string()
        }
        Some(other) => other.to_string(),
        None => format!("{:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;
    use rllm_types::EntryId;

    #[test]
    fn test_not_found_hint() {
        let err = anyhow::Error::from(RllmError::NotFound(EntryId(7)));
        assert_eq!(
            user_message(&err),
            "no history entry with id 7 (see `rllm history`)"
        );
    }

    #[test]
    fn test_context_chain_is_flattened() {
        let err = std::fs::read_to_string("/definitely/not/here")
            .context("failed to read export target")
            .unwrap_err();
        let message = user_message(&err);
        assert!(message.starts_with("failed to read export target: "));
        assert!(!message.contains('\n'));
    }
}
