//! Mock oracle for tests
//!
//! Either cycles a fixed review forever or plays back a finite script of
//! results, which is how the batch-driver tests stage per-variant failures.

use crate::oracle::{OracleError, Review, ReviewOracle};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

enum Behavior {
    /// Always return a clone of the same review.
    Constant(Review),
    /// Pop scripted results in order; error once the script runs dry.
    Scripted(Mutex<VecDeque<Result<Review, OracleError>>>),
}

/// Scriptable in-memory oracle.
pub struct MockOracle {
    behavior: Behavior,
    model: String,
}

impl MockOracle {
    /// Oracle that returns the same review for every call.
    pub fn constant(review: Review) -> Self {
        Self {
            behavior: Behavior::Constant(review),
            model: "mock-reviewer".to_string(),
        }
    }

    /// Oracle that plays back `results` in order, then fails.
    pub fn scripted(results: Vec<Result<Review, OracleError>>) -> Self {
        Self {
            behavior: Behavior::Scripted(Mutex::new(results.into())),
            model: "mock-reviewer".to_string(),
        }
    }

    /// Number of scripted results not yet consumed (0 for constant mocks).
    pub fn remaining(&self) -> usize {
        match &self.behavior {
            Behavior::Constant(_) => 0,
            Behavior::Scripted(queue) => queue.lock().map(|q| q.len()).unwrap_or(0),
        }
    }
}

impl ReviewOracle for MockOracle {
    fn review(
        &self,
        _text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Review, OracleError>> + Send + '_>> {
        let result = match &self.behavior {
            Behavior::Constant(review) => Ok(review.clone()),
            Behavior::Scripted(queue) => match queue.lock() {
                Ok(mut queue) => queue.pop_front().unwrap_or_else(|| {
                    Err(OracleError::InvalidResponse(
                        "mock script exhausted".to_string(),
                    ))
                }),
                Err(_) => Err(OracleError::InvalidResponse(
                    "mock script poisoned".to_string(),
                )),
            },
        };
        Box::pin(async move { result })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
