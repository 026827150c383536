use serde::{Deserialize, Serialize};

/// The single entity stored on the ledger, keyed by [`Record::id`].
///
/// Serde names are the persisted wire format and must not change without a
/// migration. Unknown or missing fields are rejected on decode.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    /// Caller-assigned primary key; never changes once stored.
    pub id: String,
    pub task_id: i64,
    pub company_code: i64,
    #[serde(rename = "letter_num")]
    pub letter_number: String,
    #[serde(rename = "predict_value")]
    pub predicted_value: String,
    #[serde(rename = "predict_divation")]
    pub predicted_deviation: String,
    pub f_value: String,
}

impl Record {
    /// The same record under a different id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// The two records every ledger is seeded with at deployment.
pub fn bootstrap_records() -> [Record; 2] {
    [
        Record {
            id: "1".into(),
            task_id: 122,
            company_code: 2,
            letter_number: "ln1".into(),
            predicted_value: "pv1".into(),
            predicted_deviation: "pd1".into(),
            f_value: "fv1".into(),
        },
        Record {
            id: "2".into(),
            task_id: 122,
            company_code: 3,
            letter_number: "ln2".into(),
            predicted_value: "pv2".into(),
            predicted_deviation: "pd2".into(),
            f_value: "fv2".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_ids_are_one_and_two() {
        let ids: Vec<String> = bootstrap_records().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn with_id_keeps_fields() {
        let [first, _] = bootstrap_records();
        let moved = first.clone().with_id("99");
        assert_eq!(moved.id, "99");
        assert_eq!(moved.task_id, first.task_id);
        assert_eq!(moved.f_value, first.f_value);
    }
}
