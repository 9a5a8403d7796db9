//! Thoughts: schema-injected fields forcing intermediate reasoning.
//!
//! A thought's field name is the literal JSON key the model must populate —
//! often a full sentence acting as an in-band instruction. Opening thoughts
//! precede the result in the envelope, closing thoughts follow it.

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use gwion_schema::{Schema, Schematic};

use crate::error::{GenError, Result};

/// Envelope key for opening thoughts.
pub const OPENING_KEY: &str = "OpeningThoughts";

/// Envelope key for the result value.
pub const RESULT_KEY: &str = "result";

/// Envelope key for closing thoughts.
pub const CLOSING_KEY: &str = "ClosingThoughts";

// ─────────────────────────────────────────────────────────────────────────────
// Thought
// ─────────────────────────────────────────────────────────────────────────────

/// Where a thought field sits relative to the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Emitted before the result.
    Opening,
    /// Emitted after the result.
    Closing,
}

type ThoughtCallback =
    Arc<dyn Fn(Value) -> BoxFuture<'static, std::result::Result<(), String>> + Send + Sync>;

/// A typed field injected into the required output schema, with a
/// post-generation processing callback.
#[derive(Clone)]
pub struct Thought {
    name: String,
    position: Position,
    schema: Schema,
    process: ThoughtCallback,
}

impl Thought {
    /// An opening thought with a no-op callback.
    pub fn opening<T: Schematic + 'static>(name: impl Into<String>) -> Self {
        Self::opening_with::<T, _, _>(name, |_value| async { Ok(()) })
    }

    /// An opening thought processed by `process` after extraction.
    pub fn opening_with<T, F, Fut>(name: impl Into<String>, process: F) -> Self
    where
        T: Schematic + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        Self::new::<T, F, Fut>(name, Position::Opening, process)
    }

    /// A closing thought with a no-op callback.
    pub fn closing<T: Schematic + 'static>(name: impl Into<String>) -> Self {
        Self::closing_with::<T, _, _>(name, |_value| async { Ok(()) })
    }

    /// A closing thought processed by `process` after extraction.
    pub fn closing_with<T, F, Fut>(name: impl Into<String>, process: F) -> Self
    where
        T: Schematic + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        Self::new::<T, F, Fut>(name, Position::Closing, process)
    }

    fn new<T, F, Fut>(name: impl Into<String>, position: Position, process: F) -> Self
    where
        T: Schematic + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        let callback: ThoughtCallback = Arc::new(
            move |value: Value| -> BoxFuture<'static, std::result::Result<(), String>> {
                match gwion_schema::decode_value::<T>(value) {
                    Err(e) => Box::pin(async move { Err(e.to_string()) }),
                    Ok(decoded) => Box::pin(process(decoded)),
                }
            },
        );

        Self {
            name: name.into(),
            position,
            schema: T::schema(),
            process: callback,
        }
    }

    /// The field name — the JSON key the model must populate.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where this thought sits in the envelope.
    pub fn position(&self) -> Position {
        self.position
    }

    /// The field's value schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl std::fmt::Debug for Thought {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thought")
            .field("name", &self.name)
            .field("position", &self.position)
            .finish()
    }
}

/// Concatenate thought groups into one active set.
pub fn aggregate<I>(groups: I) -> Vec<Thought>
where
    I: IntoIterator<Item = Vec<Thought>>,
{
    groups.into_iter().flatten().collect()
}

/// The built-in pair used when no thoughts are active, so every generation
/// carries at least minimal structured reasoning.
pub fn default_thoughts() -> Vec<Thought> {
    vec![
        Thought::opening::<String>(
            "Before answering, I restate my role and the instructions I must follow",
        ),
        Thought::closing::<String>(
            "I confirm the answer above complies with every instruction I was given",
        ),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// The decoded result-tool payload: opening thoughts, the result value,
/// closing thoughts. Lives only long enough to dispatch its fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Opening thought field name → raw value.
    #[serde(default, rename = "OpeningThoughts")]
    pub opening: Map<String, Value>,
    /// The result value, decoded by the caller into its typed form.
    #[serde(rename = "result")]
    pub result: Value,
    /// Closing thought field name → raw value.
    #[serde(default, rename = "ClosingThoughts")]
    pub closing: Map<String, Value>,
}

/// Build the result-tool input schema for the active thoughts and a result
/// value schema: `{OpeningThoughts, result, ClosingThoughts}`.
pub fn envelope_schema(thoughts: &[Thought], result: Schema) -> Schema {
    let collect = |position: Position| {
        let mut object = Schema::object();
        for thought in thoughts.iter().filter(|t| t.position() == position) {
            object = object.field(thought.name(), thought.schema().clone());
        }
        object
    };

    Schema::object()
        .field(OPENING_KEY, collect(Position::Opening))
        .field(RESULT_KEY, result)
        .field(CLOSING_KEY, collect(Position::Closing))
}

/// Run the processing callbacks for every thought field in the envelope.
///
/// Fields are matched by exact name within their position; a field with no
/// registered thought is a fatal protocol violation (the model broke the
/// schema it was given). With duplicate registrations the FIRST wins. All
/// callbacks launch concurrently and are joined before returning.
pub async fn handle(thoughts: &[Thought], envelope: &Envelope) -> Result<()> {
    let mut pending: Vec<(String, BoxFuture<'static, std::result::Result<(), String>>)> =
        Vec::new();

    for (position, fields) in [
        (Position::Opening, &envelope.opening),
        (Position::Closing, &envelope.closing),
    ] {
        for (name, value) in fields {
            let thought = thoughts
                .iter()
                .find(|t| t.position() == position && t.name() == name.as_str())
                .ok_or_else(|| GenError::UnknownThought(name.clone()))?;
            pending.push((name.clone(), (thought.process)(value.clone())));
        }
    }

    let (names, futures): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
    let outcomes = futures::future::join_all(futures).await;

    for (name, outcome) in names.into_iter().zip(outcomes) {
        if let Err(message) = outcome {
            return Err(GenError::Thought {
                field: name,
                message,
            });
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
