//! Usage event payloads.
//!
//! Every event shares the [`BaseEvent`] fields and flattens into a single
//! ordered JSON object for transport: base fields first (`event_type`,
//! `user_id`, `library_version`), then the variant's own fields in declared
//! order. The variants form a closed set, [`UsageEvent`].
//!
//! `user_id` is never supplied by callers. It is left empty at construction
//! and filled in by the dispatcher right before the payload is sent.
//!
//! Validation is limited to shape: a non-empty `event_type`, matching
//! lengths for the evolution name/percentage pairs, and finite non-negative
//! percentages. Percentages are relative weights and are not required to
//! sum to one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `event_type` used for evaluation runs.
pub const EVALUATION_EVENT: &str = "evaluation";

/// `event_type` used for test-set generation runs.
pub const TESTSET_GENERATION_EVENT: &str = "testset_generation";

/// Flat, insertion-ordered field mapping produced by [`UsageEvent::to_mapping`].
pub type EventMapping = Map<String, Value>;

/// Errors raised when an event payload has the wrong shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventError {
    /// The `event_type` field was empty.
    #[error("event_type must not be empty")]
    EmptyEventType,

    /// Evolution names and percentages have different lengths.
    #[error("evolution_names has {names} entries but evolution_percentages has {percentages}")]
    LengthMismatch {
        /// Number of evolution names supplied.
        names: usize,
        /// Number of evolution percentages supplied.
        percentages: usize,
    },

    /// A percentage was negative, NaN, or infinite.
    #[error("evolution percentage at index {index} is not a finite non-negative number: {value}")]
    InvalidPercentage {
        /// Position of the offending value.
        index: usize,
        /// The offending value.
        value: f64,
    },
}

// ---------------------------------------------------------------------------
// Base event
// ---------------------------------------------------------------------------

/// Fields shared by every usage event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEvent {
    /// Kind of occurrence being tracked (e.g. `"evaluation"`).
    pub event_type: String,
    /// Anonymous installation identifier, injected at dispatch time.
    #[serde(default)]
    pub user_id: String,
    /// Version of the host library that emitted the event.
    #[serde(default)]
    pub library_version: String,
}

impl BaseEvent {
    /// Create a base event with an empty `user_id`.
    pub fn new(event_type: impl Into<String>) -> Result<Self, EventError> {
        let event = Self {
            event_type: event_type.into(),
            user_id: String::new(),
            library_version: String::new(),
        };
        event.validate()?;
        Ok(event)
    }

    /// Check the shape of the base fields.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.event_type.trim().is_empty() {
            return Err(EventError::EmptyEventType);
        }
        Ok(())
    }

    fn write_into(&self, map: &mut EventMapping) {
        map.insert("event_type".to_owned(), Value::from(self.event_type.as_str()));
        map.insert("user_id".to_owned(), Value::from(self.user_id.as_str()));
        map.insert(
            "library_version".to_owned(),
            Value::from(self.library_version.as_str()),
        );
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Emitted after an evaluation run completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationEvent {
    /// Shared base fields.
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Names of the metrics that were computed, in run order.
    pub metrics: Vec<String>,
    /// Number of dataset rows evaluated.
    pub num_rows: u64,
    /// Evaluation mode label. May be empty.
    pub evaluation_mode: String,
}

impl EvaluationEvent {
    /// Build an evaluation event.
    pub fn new(
        event_type: impl Into<String>,
        metrics: Vec<String>,
        num_rows: u64,
        evaluation_mode: impl Into<String>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            base: BaseEvent::new(event_type)?,
            metrics,
            num_rows,
            evaluation_mode: evaluation_mode.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Test-set generation
// ---------------------------------------------------------------------------

/// Emitted after a synthetic test set is generated.
///
/// `evolution_names[i]` is weighted by `evolution_percentages[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsetGenerationEvent {
    /// Shared base fields.
    #[serde(flatten)]
    pub base: BaseEvent,
    /// Lower-cased names of the generation strategies, in input order.
    pub evolution_names: Vec<String>,
    /// Relative weight of each strategy, aligned with `evolution_names`.
    pub evolution_percentages: Vec<f64>,
    /// Number of rows generated.
    pub num_rows: u64,
}

impl TestsetGenerationEvent {
    /// Build a test-set generation event from parallel name/weight lists.
    pub fn new(
        event_type: impl Into<String>,
        evolution_names: Vec<String>,
        evolution_percentages: Vec<f64>,
        num_rows: u64,
    ) -> Result<Self, EventError> {
        let event = Self {
            base: BaseEvent::new(event_type)?,
            evolution_names,
            evolution_percentages,
            num_rows,
        };
        event.validate()?;
        Ok(event)
    }

    /// Build a `testset_generation` event from `(strategy name, weight)` pairs.
    ///
    /// Strategy names are lower-cased (`"MultiContextEvolution"` becomes
    /// `"multicontextevolution"`); pair order is preserved.
    pub fn from_distribution<I, S>(distribution: I, num_rows: u64) -> Result<Self, EventError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let (names, percentages) = distribution
            .into_iter()
            .map(|(name, weight)| (name.as_ref().to_lowercase(), weight))
            .unzip();
        Self::new(TESTSET_GENERATION_EVENT, names, percentages, num_rows)
    }

    /// Check base fields, list alignment and percentage values.
    pub fn validate(&self) -> Result<(), EventError> {
        self.base.validate()?;
        if self.evolution_names.len() != self.evolution_percentages.len() {
            return Err(EventError::LengthMismatch {
                names: self.evolution_names.len(),
                percentages: self.evolution_percentages.len(),
            });
        }
        if let Some((index, &value)) = self
            .evolution_percentages
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || p.is_sign_negative())
        {
            return Err(EventError::InvalidPercentage { index, value });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Closed set of events
// ---------------------------------------------------------------------------

/// Any event the dispatcher can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UsageEvent {
    /// An evaluation run.
    Evaluation(EvaluationEvent),
    /// A test-set generation run.
    TestsetGeneration(TestsetGenerationEvent),
    /// A bare event with only the shared fields.
    Base(BaseEvent),
}

impl UsageEvent {
    /// Shared base fields.
    pub const fn base(&self) -> &BaseEvent {
        match self {
            Self::Evaluation(e) => &e.base,
            Self::TestsetGeneration(e) => &e.base,
            Self::Base(b) => b,
        }
    }

    /// Mutable access to the shared base fields.
    pub const fn base_mut(&mut self) -> &mut BaseEvent {
        match self {
            Self::Evaluation(e) => &mut e.base,
            Self::TestsetGeneration(e) => &mut e.base,
            Self::Base(b) => b,
        }
    }

    /// The event's `event_type`.
    pub fn event_type(&self) -> &str {
        &self.base().event_type
    }

    /// Validate the shape of the whole payload.
    pub fn validate(&self) -> Result<(), EventError> {
        match self {
            Self::Evaluation(e) => e.base.validate(),
            Self::TestsetGeneration(e) => e.validate(),
            Self::Base(b) => b.validate(),
        }
    }

    /// Flatten the event into an ordered field mapping.
    ///
    /// `event_type` and `user_id` are always present, even while `user_id`
    /// is still the empty placeholder.
    pub fn to_mapping(&self) -> EventMapping {
        let mut map = EventMapping::new();
        self.base().write_into(&mut map);
        match self {
            Self::Evaluation(e) => {
                map.insert("metrics".to_owned(), Value::from(e.metrics.clone()));
                map.insert("num_rows".to_owned(), Value::from(e.num_rows));
                map.insert(
                    "evaluation_mode".to_owned(),
                    Value::from(e.evaluation_mode.as_str()),
                );
            }
            Self::TestsetGeneration(e) => {
                map.insert(
                    "evolution_names".to_owned(),
                    Value::from(e.evolution_names.clone()),
                );
                map.insert(
                    "evolution_percentages".to_owned(),
                    Value::from(e.evolution_percentages.clone()),
                );
                map.insert("num_rows".to_owned(), Value::from(e.num_rows));
            }
            Self::Base(_) => {}
        }
        map
    }
}

impl From<BaseEvent> for UsageEvent {
    fn from(event: BaseEvent) -> Self {
        Self::Base(event)
    }
}

impl From<EvaluationEvent> for UsageEvent {
    fn from(event: EvaluationEvent) -> Self {
        Self::Evaluation(event)
    }
}

impl From<TestsetGenerationEvent> for UsageEvent {
    fn from(event: TestsetGenerationEvent) -> Self {
        Self::TestsetGeneration(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(map: &EventMapping) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn base_event_mapping_carries_type_and_user_id() -> Result<(), EventError> {
        let event = UsageEvent::from(BaseEvent::new(EVALUATION_EVENT)?);
        let map = event.to_mapping();
        assert_eq!(map.get("event_type").and_then(Value::as_str), Some("evaluation"));
        assert!(map.get("user_id").is_some_and(Value::is_string));
        Ok(())
    }

    #[test]
    fn empty_event_type_is_rejected() {
        assert_eq!(BaseEvent::new("  "), Err(EventError::EmptyEventType));
        assert!(EvaluationEvent::new("", vec![], 0, "").is_err());
    }

    #[test]
    fn evaluation_event_mapping_shape() -> Result<(), EventError> {
        let mut event = UsageEvent::from(EvaluationEvent::new(
            EVALUATION_EVENT,
            vec!["harmfulness".to_owned()],
            1,
            "",
        )?);
        event.base_mut().user_id = "a-0123".to_owned();

        let map = event.to_mapping();
        assert_eq!(
            keys(&map),
            [
                "event_type",
                "user_id",
                "library_version",
                "metrics",
                "num_rows",
                "evaluation_mode"
            ]
        );
        assert_eq!(map.get("user_id").and_then(Value::as_str), Some("a-0123"));
        assert_eq!(map.get("evaluation_mode").and_then(Value::as_str), Some(""));
        assert_eq!(
            map.get("metrics").and_then(Value::as_array).map(Vec::len),
            Some(1)
        );
        assert_eq!(map.get("num_rows").and_then(Value::as_u64), Some(1));
        Ok(())
    }

    #[test]
    fn testset_event_preserves_order_and_values() -> Result<(), EventError> {
        let event = TestsetGenerationEvent::from_distribution(
            [
                ("SimpleEvolution", 0.5),
                ("MultiContextEvolution", 0.3),
                ("ReasoningEvolution", 0.2),
            ],
            10,
        )?;
        assert_eq!(event.base.event_type, TESTSET_GENERATION_EVENT);

        let map = UsageEvent::from(event).to_mapping();
        assert_eq!(
            map.get("evolution_names"),
            Some(&serde_json::json!([
                "simpleevolution",
                "multicontextevolution",
                "reasoningevolution"
            ]))
        );
        assert_eq!(
            map.get("evolution_percentages"),
            Some(&serde_json::json!([0.5, 0.3, 0.2]))
        );
        Ok(())
    }

    #[test]
    fn percentages_need_not_sum_to_one() {
        let event = TestsetGenerationEvent::new(
            TESTSET_GENERATION_EVENT,
            vec!["simpleevolution".to_owned(), "reasoningevolution".to_owned()],
            vec![3.0, 4.5],
            2,
        );
        assert!(event.is_ok());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let event = TestsetGenerationEvent::new(
            TESTSET_GENERATION_EVENT,
            vec!["simpleevolution".to_owned()],
            vec![0.5, 0.5],
            2,
        );
        assert_eq!(
            event.err(),
            Some(EventError::LengthMismatch {
                names: 1,
                percentages: 2
            })
        );
    }

    #[test]
    fn non_finite_percentages_are_rejected() {
        let event = TestsetGenerationEvent::from_distribution([("a", 0.5), ("b", f64::NAN)], 1);
        assert!(matches!(
            event,
            Err(EventError::InvalidPercentage { index: 1, .. })
        ));
        let negative = TestsetGenerationEvent::from_distribution([("a", -0.1)], 1);
        assert!(matches!(
            negative,
            Err(EventError::InvalidPercentage { index: 0, .. })
        ));
    }

    #[test]
    fn serde_output_matches_mapping() -> Result<(), Box<dyn std::error::Error>> {
        let event = UsageEvent::from(EvaluationEvent::new(
            EVALUATION_EVENT,
            vec!["faithfulness".to_owned(), "answer_relevancy".to_owned()],
            42,
            "qa",
        )?);
        let Value::Object(serialized) = serde_json::to_value(&event)? else {
            return Err("event did not serialize to an object".into());
        };
        assert_eq!(serialized, event.to_mapping());
        Ok(())
    }
}
