use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to parse rule source: {0}")]
    InvalidDocument(#[from] serde_yaml::Error),

    #[error("rule {0} references an unknown kind")]
    UnknownRuleKind(String),

    #[error("duplicate rule id: {0}")]
    DuplicateRuleId(String),

    #[error("conflicting MODIFY patches on fields {fields:?} from rules {rule_ids:?}")]
    ConflictingPatch {
        fields: Vec<String>,
        rule_ids: Vec<String>,
    },

    #[error("rule {rule_id} crashed during evaluation: {detail}")]
    RuleCrashed { rule_id: String, detail: String },
}
