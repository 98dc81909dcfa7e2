use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

/// Returned in place of a fact when the table has nothing usable.
pub const NO_FACTS_SENTINEL: &str = "No facts available in DynamoDB.";

/// One row of the fact table.
///
/// Only the `FactText` attribute is read; every other attribute is ignored.
/// Records are created and deleted outside this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    #[serde(rename = "FactText", default, skip_serializing_if = "Option::is_none")]
    pub fact_text: Option<String>,
}

impl FactRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            fact_text: Some(text.into()),
        }
    }

    /// The fact text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.fact_text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Pick one record with `pick(len)` and return its text.
///
/// `None` when `records` is empty or the chosen record has no text. A
/// record without text is not skipped in favour of another one.
pub fn pick_fact(records: &[FactRecord], pick: impl FnOnce(usize) -> usize) -> Option<&str> {
    if records.is_empty() {
        return None;
    }
    let idx = pick(records.len()).min(records.len() - 1);
    records[idx].text()
}

/// Uniform index in `0..len` from the thread-local generator.
pub fn random_index(len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    thread_rng().gen_range(0..len)
}
