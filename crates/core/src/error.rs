//! Typed failures of level generation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("room template `{template}` is malformed: {reason}")]
    Template { template: String, reason: String },

    #[error("level plan is invalid: {0}")]
    InvalidPlan(String),

    #[error("could not place {what} after {attempts} attempts")]
    PlacementExhausted { what: String, attempts: usize },

    #[error("{carver} carver produced no usable cave after {attempts} attempts")]
    CarverExhausted { carver: &'static str, attempts: usize },

    #[error("room {room} could not be connected to the tunnel network")]
    Disconnected { room: usize },

    #[error("{what} is unreachable from the start")]
    Unreachable { what: String },

    #[error("depth {depth} failed after {attempts} attempts")]
    RetriesExhausted {
        depth: u8,
        attempts: usize,
        #[source]
        source: Box<GenError>,
    },
}

impl GenError {
    /// Failures caused by an unlucky stream; a fresh seed may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenError::PlacementExhausted { .. }
                | GenError::CarverExhausted { .. }
                | GenError::Disconnected { .. }
                | GenError::Unreachable { .. }
        )
    }
}

pub type GenResult<T> = Result<T, GenError>;

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn configuration_bugs_are_not_retried() {
        assert!(!GenError::InvalidPlan("depth 0".into()).is_retryable());
        assert!(
            !GenError::Template { template: "x".into(), reason: "ragged".into() }.is_retryable()
        );
        assert!(GenError::Disconnected { room: 3 }.is_retryable());
    }

    #[test]
    fn exhausted_retries_keep_the_last_cause() {
        let error = GenError::RetriesExhausted {
            depth: 4,
            attempts: 8,
            source: Box::new(GenError::CarverExhausted { carver: "automata", attempts: 10 }),
        };
        assert_eq!(error.to_string(), "depth 4 failed after 8 attempts");
        let source = error.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("automata carver produced no usable cave after 10 attempts")
        );
    }
}
