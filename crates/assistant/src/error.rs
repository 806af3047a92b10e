use thiserror::Error;

use crate::typed::EditTarget;

/// Failures while turning a confirmed action into journal changes.
/// The `Display` text is what the user gets to read.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("User not found. Please send /start first.")]
    UserNotFound,
    #[error("No active account found. Create an account first.")]
    NoActiveAccount,
    #[error("{}", trade_not_found(.0))]
    TradeNotFound(EditTarget),
    #[error("{}", account_not_found(.0))]
    AccountNotFound(EditTarget),
    #[error("Invalid status value: '{0}'. Use open, closed or cancelled.")]
    InvalidStatus(String),
    #[error("Invalid action: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn trade_not_found(target: &EditTarget) -> String {
    match target {
        EditTarget::Id(id) => format!("Trade #{} not found.", id),
        EditTarget::Name(instrument) => {
            format!("No open trade found matching '{}'.", instrument)
        }
    }
}

fn account_not_found(target: &EditTarget) -> String {
    match target {
        EditTarget::Id(id) => format!("Account #{} not found.", id),
        EditTarget::Name(name) => format!("No account found matching '{}'.", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages_name_the_target() {
        let err = ActionError::TradeNotFound(EditTarget::Name("DAX".to_string()));
        assert_eq!(err.to_string(), "No open trade found matching 'DAX'.");

        let err = ActionError::TradeNotFound(EditTarget::Id(12));
        assert_eq!(err.to_string(), "Trade #12 not found.");

        let err = ActionError::AccountNotFound(EditTarget::Name("Prop".to_string()));
        assert_eq!(err.to_string(), "No account found matching 'Prop'.");
    }

    #[test]
    fn test_invalid_joins_errors() {
        let err = ActionError::Invalid(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Invalid action: a; b");
    }
}
