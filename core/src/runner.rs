#![deny(missing_docs)]

//! # Test Sequences
//!
//! The model handed to the test-runner collaborator: an ordered list of
//! interactions, each owning a writable operation, plus the executed result
//! the runner returns and the oracle that reduces it to pass/fail.

use crate::catalogue::ValueCatalogue;
use crate::error::AppResult;
use crate::params::Operation;
use serde_json::Value as JsonValue;
use std::fmt;

/// Coarse classification of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 2xx
    Successful,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// Anything else.
    Other,
}

impl StatusClass {
    /// Classifies a status code.
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => StatusClass::Successful,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Other,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusClass::Successful => "successful",
            StatusClass::ClientError => "client error",
            StatusClass::ServerError => "server error",
            StatusClass::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// One request of a sequence.
#[derive(Debug, Clone)]
pub struct TestInteraction {
    operation: Operation,
    status: Option<u16>,
}

impl TestInteraction {
    /// Wraps a writable operation.
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            status: None,
        }
    }

    /// The operation to send.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Mutable access to the operation.
    pub fn operation_mut(&mut self) -> &mut Operation {
        &mut self.operation
    }

    /// Status code of the last execution, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Stores an execution result, building the actual response tree.
    pub fn record(&mut self, step: &ExecutedStep) -> AppResult<()> {
        self.status = Some(step.status);
        match &step.body {
            Some(body) => {
                self.operation.set_actual_response(body)?;
            }
            None => self.operation.clear_actual_response()?,
        }
        Ok(())
    }
}

/// An ordered list of interactions.
#[derive(Debug, Clone, Default)]
pub struct TestSequence {
    interactions: Vec<TestInteraction>,
}

impl TestSequence {
    /// An empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence with a single interaction.
    pub fn single(operation: Operation) -> Self {
        Self {
            interactions: vec![TestInteraction::new(operation)],
        }
    }

    /// Appends an interaction.
    pub fn push(&mut self, operation: Operation) {
        self.interactions.push(TestInteraction::new(operation));
    }

    /// The interactions in order.
    pub fn interactions(&self) -> &[TestInteraction] {
        &self.interactions
    }

    /// Mutable access to one interaction.
    pub fn interaction_mut(&mut self, index: usize) -> Option<&mut TestInteraction> {
        self.interactions.get_mut(index)
    }

    /// The operation of the first interaction.
    pub fn first_operation(&self) -> Option<&Operation> {
        self.interactions.first().map(TestInteraction::operation)
    }

    /// Mutable operation of the first interaction.
    pub fn first_operation_mut(&mut self) -> Option<&mut Operation> {
        self.interactions.first_mut().map(TestInteraction::operation_mut)
    }

    /// Number of interactions.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// True without interactions.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// A deep, writable copy with every execution result forgotten.
    pub fn reset_clone(&self) -> AppResult<TestSequence> {
        let mut interactions = Vec::with_capacity(self.interactions.len());
        for interaction in &self.interactions {
            let mut operation = interaction.operation.deep_clone();
            operation.clear_actual_response()?;
            interactions.push(TestInteraction::new(operation));
        }
        Ok(TestSequence { interactions })
    }

    /// Copies execution results into the interactions.
    pub fn record(&mut self, executed: &ExecutedSequence) -> AppResult<()> {
        for (interaction, step) in self.interactions.iter_mut().zip(executed.steps()) {
            interaction.record(step)?;
        }
        Ok(())
    }
}

/// Result of one executed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStep {
    /// HTTP status code.
    pub status: u16,
    /// Parsed response body, if any.
    pub body: Option<JsonValue>,
}

impl ExecutedStep {
    /// A step without a body.
    pub fn with_status(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Classification of the status code.
    pub fn class(&self) -> StatusClass {
        StatusClass::from_code(self.status)
    }
}

/// What the runner reports for a sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutedSequence {
    steps: Vec<ExecutedStep>,
}

impl ExecutedSequence {
    /// Builds a result from its steps.
    pub fn new(steps: Vec<ExecutedStep>) -> Self {
        Self { steps }
    }

    /// The steps in execution order.
    pub fn steps(&self) -> &[ExecutedStep] {
        &self.steps
    }

    /// The first executed step.
    pub fn first(&self) -> Option<&ExecutedStep> {
        self.steps.first()
    }

    /// Feeds every response body into a catalogue.
    pub fn observe_into(&self, catalogue: &mut ValueCatalogue) -> usize {
        self.steps
            .iter()
            .filter_map(|step| step.body.as_ref())
            .map(|body| catalogue.observe(body))
            .sum()
    }
}

/// Executes a sequence against the API under test.
pub trait TestRunner {
    /// Sends every interaction and reports the results.
    fn run(&mut self, sequence: &TestSequence) -> AppResult<ExecutedSequence>;
}

impl<F> TestRunner for F
where
    F: FnMut(&TestSequence) -> AppResult<ExecutedSequence>,
{
    fn run(&mut self, sequence: &TestSequence) -> AppResult<ExecutedSequence> {
        self(sequence)
    }
}

/// Reduces an executed sequence to pass/fail.
pub trait Oracle {
    /// True when the sequence behaved as expected.
    fn assess(&self, executed: &ExecutedSequence) -> bool;
}

/// Passes when the first step was successful.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCodeOracle;

impl Oracle for StatusCodeOracle {
    fn assess(&self, executed: &ExecutedSequence) -> bool {
        executed
            .first()
            .map(|step| step.class() == StatusClass::Successful)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterFactory, ParameterLocation, Template};
    use serde_json::json;

    #[test]
    fn test_status_classes() {
        assert_eq!(StatusClass::from_code(204), StatusClass::Successful);
        assert_eq!(StatusClass::from_code(404), StatusClass::ClientError);
        assert_eq!(StatusClass::from_code(503), StatusClass::ServerError);
        assert_eq!(StatusClass::from_code(302), StatusClass::Other);
    }

    #[test]
    fn test_oracle_looks_at_first_step() {
        let oracle = StatusCodeOracle;
        assert!(oracle.assess(&ExecutedSequence::new(vec![
            ExecutedStep::with_status(201),
            ExecutedStep::with_status(500)
        ])));
        assert!(!oracle.assess(&ExecutedSequence::new(vec![ExecutedStep::with_status(400)])));
        assert!(!oracle.assess(&ExecutedSequence::default()));
    }

    #[test]
    fn test_reset_clone_forgets_results() {
        let mut op = Operation::new("getPet", "GET", "/pets/{id}");
        let id = ParameterFactory::build_from_value(&mut op, None, "id", ParameterLocation::Path, &json!(1))
            .unwrap();
        op.attach_parameter(id).unwrap();
        let template = Template::new(op);

        let mut sequence = TestSequence::single(template.to_draft());
        let executed = ExecutedSequence::new(vec![ExecutedStep {
            status: 200,
            body: Some(json!({"id": 1})),
        }]);
        sequence.record(&executed).unwrap();
        assert!(sequence.first_operation().unwrap().actual_response().is_some());

        let fresh = sequence.reset_clone().unwrap();
        assert!(fresh.first_operation().unwrap().actual_response().is_none());
        assert_eq!(fresh.interactions()[0].status(), None);
    }

    #[test]
    fn test_closures_are_runners() {
        let mut calls = 0;
        let mut runner = |_: &TestSequence| {
            calls += 1;
            Ok::<_, crate::error::AppError>(ExecutedSequence::new(vec![ExecutedStep::with_status(200)]))
        };
        let executed = runner.run(&TestSequence::new()).unwrap();
        assert_eq!(executed.first().unwrap().status, 200);
        assert_eq!(calls, 1);
    }
}
