use crate::CoreError;
use plumb_store::AppState;

pub fn validate_transition(from: AppState, to: AppState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (AppState::Defined | AppState::Ready, AppState::Scheduled)
            | (AppState::Scheduled, AppState::Ready | AppState::Destroyed)
            | (AppState::Ready, AppState::Destroyed)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(AppState::Defined, AppState::Scheduled).is_ok());
        assert!(validate_transition(AppState::Scheduled, AppState::Ready).is_ok());
        assert!(validate_transition(AppState::Ready, AppState::Destroyed).is_ok());
        assert!(validate_transition(AppState::Ready, AppState::Scheduled).is_ok()); // redeploy
        assert!(validate_transition(AppState::Scheduled, AppState::Destroyed).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(validate_transition(AppState::Defined, AppState::Ready).is_err());
        assert!(validate_transition(AppState::Defined, AppState::Destroyed).is_err());
        assert!(validate_transition(AppState::Destroyed, AppState::Scheduled).is_err());
        assert!(validate_transition(AppState::Scheduled, AppState::Scheduled).is_err());
        assert!(validate_transition(AppState::Ready, AppState::Defined).is_err());
    }

    #[test]
    fn error_names_both_states() {
        let err = validate_transition(AppState::Destroyed, AppState::Ready).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid app state transition: destroyed -> ready"
        );
    }
}
