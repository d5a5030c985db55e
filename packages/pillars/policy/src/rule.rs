//! The rule taxonomy: a sealed set of typed variants, one per rule
//! family, each a pure `(intent, context) -> RuleOutcome` predicate.
//!
//! Declarative config (YAML, see [`crate::engine::RuleSet::load`]) is
//! deserialized directly into this enum via serde's internally-tagged
//! representation, so the loader and the evaluator share one model
//! instead of a string-condition DSL sitting between them.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use paladin_core::Intent;

use crate::pii;
use crate::verdict::Remediation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reversibility {
    High,
    Medium,
    Low,
}

/// The per-rule decision. `NotApplicable` means the rule had nothing to
/// say about this intent, not that it allowed it.
#[derive(Debug, Clone)]
pub enum RuleOutcome {
    NotApplicable,
    Allow,
    Warn { reason: String },
    Modify { patch: Value, reason: String },
    Deny {
        reason: String,
        remediation: Option<Remediation>,
    },
}

fn deny(reason: impl Into<String>) -> RuleOutcome {
    RuleOutcome::Deny {
        reason: reason.into(),
        remediation: None,
    }
}

fn deny_with(reason: impl Into<String>, remediation: Remediation) -> RuleOutcome {
    RuleOutcome::Deny {
        reason: reason.into(),
        remediation: Some(remediation),
    }
}

fn as_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str)
}

fn as_decimal(value: Option<&Value>) -> Option<Decimal> {
    value.and_then(|v| {
        if let Some(n) = v.as_f64() {
            Decimal::try_from(n).ok()
        } else {
            v.as_str().and_then(|s| s.parse().ok())
        }
    })
}

fn as_bool(value: Option<&Value>) -> Option<bool> {
    value.and_then(Value::as_bool)
}

/// Render a `Decimal` as a JSON number, preferring an integer
/// representation when the value is whole (money amounts in these rules
/// are almost always whole dollars).
fn decimal_to_value(d: Decimal) -> Value {
    if let Ok(i) = i64::try_from(d) {
        Value::from(i)
    } else {
        Value::from(d.to_string().parse::<f64>().unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    WeekendBan {
        id: String,
        capability_prefix: String,
    },
    BusinessHours {
        id: String,
        capability_prefix: String,
        start_hour: u32,
        end_hour: u32,
    },
    DailyQuota {
        id: String,
        capability_prefix: String,
        max_per_day: u64,
    },
    CompensationBand {
        id: String,
        role: String,
        floor: Decimal,
        ceiling: Decimal,
    },
    EquityCap {
        id: String,
        role: String,
        max_shares: u64,
    },
    InclusiveLanguageDenylist {
        id: String,
        terms: Vec<String>,
    },
    PiiRedact {
        id: String,
    },
    ExpenseThreshold {
        id: String,
        max_amount: Decimal,
    },
    ReceiptRequired {
        id: String,
        floor: Decimal,
    },
    SelfApprovalBan {
        id: String,
    },
    CategoryCap {
        id: String,
        category: String,
        cap: Decimal,
    },
    RightToWorkRequired {
        id: String,
    },
    DataMinimization {
        id: String,
        capability_prefix: String,
        allowed_fields: Vec<String>,
    },
    RetentionLimit {
        id: String,
        max_days: i64,
    },
    CrossBorderTransfer {
        id: String,
        allowed_regions: Vec<String>,
    },
    ChangeWindow {
        id: String,
        capability_prefix: String,
        allowed_start_hour: u32,
        allowed_end_hour: u32,
    },
    SlaThreshold {
        id: String,
        max_duration_ms: u64,
    },
    /// Exists only to exercise the engine's rule-crash isolation path in
    /// tests; no production rule source ever emits this kind.
    #[cfg(test)]
    TestPanic {
        id: String,
    },
}

impl Rule {
    pub fn id(&self) -> &str {
        match self {
            Rule::WeekendBan { id, .. }
            | Rule::BusinessHours { id, .. }
            | Rule::DailyQuota { id, .. }
            | Rule::CompensationBand { id, .. }
            | Rule::EquityCap { id, .. }
            | Rule::InclusiveLanguageDenylist { id, .. }
            | Rule::PiiRedact { id, .. }
            | Rule::ExpenseThreshold { id, .. }
            | Rule::ReceiptRequired { id, .. }
            | Rule::SelfApprovalBan { id, .. }
            | Rule::CategoryCap { id, .. }
            | Rule::RightToWorkRequired { id, .. }
            | Rule::DataMinimization { id, .. }
            | Rule::RetentionLimit { id, .. }
            | Rule::CrossBorderTransfer { id, .. }
            | Rule::ChangeWindow { id, .. }
            | Rule::SlaThreshold { id, .. } => id,
            #[cfg(test)]
            Rule::TestPanic { id, .. } => id,
        }
    }

    /// Pure evaluation. Must never panic: malformed arguments are treated
    /// as `NotApplicable` rather than crashing the rule (a rule that does
    /// panic is caught by the engine and converted to Deny at the call
    /// site, per the failure-semantics contract).
    pub fn evaluate(&self, intent: &Intent) -> RuleOutcome {
        match self {
            Rule::WeekendBan { capability_prefix, .. } => evaluate_weekend_ban(intent, capability_prefix),
            Rule::BusinessHours {
                capability_prefix,
                start_hour,
                end_hour,
                ..
            } => evaluate_business_hours(intent, capability_prefix, *start_hour, *end_hour),
            Rule::DailyQuota {
                capability_prefix,
                max_per_day,
                ..
            } => evaluate_daily_quota(intent, capability_prefix, *max_per_day),
            Rule::CompensationBand {
                role, floor, ceiling, ..
            } => evaluate_compensation_band(intent, role, *floor, *ceiling),
            Rule::EquityCap { role, max_shares, .. } => evaluate_equity_cap(intent, role, *max_shares),
            Rule::InclusiveLanguageDenylist { terms, .. } => evaluate_inclusive_language(intent, terms),
            Rule::PiiRedact { .. } => evaluate_pii_redact(intent),
            Rule::ExpenseThreshold { max_amount, .. } => evaluate_expense_threshold(intent, *max_amount),
            Rule::ReceiptRequired { floor, .. } => evaluate_receipt_required(intent, *floor),
            Rule::SelfApprovalBan { .. } => evaluate_self_approval_ban(intent),
            Rule::CategoryCap { category, cap, .. } => evaluate_category_cap(intent, category, *cap),
            Rule::RightToWorkRequired { .. } => evaluate_right_to_work(intent),
            Rule::DataMinimization {
                capability_prefix,
                allowed_fields,
                ..
            } => evaluate_data_minimization(intent, capability_prefix, allowed_fields),
            Rule::RetentionLimit { max_days, .. } => evaluate_retention_limit(intent, *max_days),
            Rule::CrossBorderTransfer { allowed_regions, .. } => {
                evaluate_cross_border_transfer(intent, allowed_regions)
            }
            Rule::ChangeWindow {
                capability_prefix,
                allowed_start_hour,
                allowed_end_hour,
                ..
            } => evaluate_change_window(intent, capability_prefix, *allowed_start_hour, *allowed_end_hour),
            Rule::SlaThreshold { max_duration_ms, .. } => evaluate_sla_threshold(intent, *max_duration_ms),
            #[cfg(test)]
            Rule::TestPanic { .. } => panic!("deliberate test panic"),
        }
    }
}

// ---- Temporal/scheduling ----------------------------------------------

fn evaluate_weekend_ban(intent: &Intent, capability_prefix: &str) -> RuleOutcome {
    if !intent.capability.starts_with(capability_prefix) {
        return RuleOutcome::NotApplicable;
    }
    let Some(date_str) = as_str(intent.argument("date")) else {
        return RuleOutcome::NotApplicable;
    };
    let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
        return RuleOutcome::NotApplicable;
    };
    use chrono::Weekday;
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        let mut next_monday = date.succ_opt().unwrap_or(date);
        while next_monday.weekday() != Weekday::Mon {
            next_monday = next_monday.succ_opt().unwrap_or(next_monday);
        }
        deny_with(
            format!("{capability_prefix} actions are not permitted on weekends"),
            Remediation {
                suggestion: format!("reschedule to the next weekday ({next_monday})"),
                auto_fix: Some(json!({ "date": next_monday.format("%Y-%m-%d").to_string() })),
                reversibility: Reversibility::High,
            },
        )
    } else {
        RuleOutcome::Allow
    }
}

fn evaluate_business_hours(intent: &Intent, capability_prefix: &str, start_hour: u32, end_hour: u32) -> RuleOutcome {
    if !intent.capability.starts_with(capability_prefix) {
        return RuleOutcome::NotApplicable;
    }
    let Some(time_str) = as_str(intent.argument("time")) else {
        return RuleOutcome::NotApplicable;
    };
    let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M") else {
        return RuleOutcome::NotApplicable;
    };
    let hour = time.hour();
    if hour < start_hour || hour >= end_hour {
        deny(format!(
            "{time_str} falls outside business hours ({start_hour}:00-{end_hour}:00)"
        ))
    } else {
        RuleOutcome::Allow
    }
}

fn evaluate_daily_quota(intent: &Intent, capability_prefix: &str, max_per_day: u64) -> RuleOutcome {
    if !intent.capability.starts_with(capability_prefix) {
        return RuleOutcome::NotApplicable;
    }
    let Some(count) = intent.context.get("daily_count_for_capability").and_then(Value::as_u64) else {
        return RuleOutcome::NotApplicable;
    };
    if count >= max_per_day {
        deny(format!(
            "daily quota of {max_per_day} for {capability_prefix} already reached ({count} today)"
        ))
    } else {
        RuleOutcome::Allow
    }
}

// ---- Compensation bands -------------------------------------------------

fn evaluate_compensation_band(intent: &Intent, role: &str, floor: Decimal, ceiling: Decimal) -> RuleOutcome {
    if intent.capability != "offer.generate" {
        return RuleOutcome::NotApplicable;
    }
    if as_str(intent.argument("role")) != Some(role) {
        return RuleOutcome::NotApplicable;
    }
    let Some(salary) = as_decimal(intent.argument("salary")) else {
        return RuleOutcome::NotApplicable;
    };
    if salary > ceiling {
        deny_with(
            format!("salary {salary} exceeds the {role} band ceiling of {ceiling}"),
            Remediation {
                suggestion: format!("clamp salary to band.max ({ceiling})"),
                auto_fix: Some(json!({ "salary": decimal_to_value(ceiling) })),
                reversibility: Reversibility::High,
            },
        )
    } else if salary < floor {
        deny_with(
            format!("salary {salary} is below the {role} band floor of {floor}"),
            Remediation {
                suggestion: format!("clamp salary to band.min ({floor})"),
                auto_fix: Some(json!({ "salary": decimal_to_value(floor) })),
                reversibility: Reversibility::High,
            },
        )
    } else {
        RuleOutcome::Allow
    }
}

fn evaluate_equity_cap(intent: &Intent, role: &str, max_shares: u64) -> RuleOutcome {
    if intent.capability != "offer.generate" || as_str(intent.argument("role")) != Some(role) {
        return RuleOutcome::NotApplicable;
    }
    let Some(shares) = intent.argument("equity_shares").and_then(Value::as_u64) else {
        return RuleOutcome::NotApplicable;
    };
    if shares > max_shares {
        deny_with(
            format!("equity grant of {shares} shares exceeds the {role} cap of {max_shares}"),
            Remediation {
                suggestion: format!("clamp equity grant to {max_shares} shares"),
                auto_fix: Some(json!({ "equity_shares": max_shares })),
                reversibility: Reversibility::High,
            },
        )
    } else {
        RuleOutcome::Allow
    }
}

// ---- Communication safety ------------------------------------------------

fn evaluate_inclusive_language(intent: &Intent, terms: &[String]) -> RuleOutcome {
    let Some(text) = as_str(intent.argument("body")).or_else(|| as_str(intent.argument("description"))) else {
        return RuleOutcome::NotApplicable;
    };
    let lowered = text.to_lowercase();
    if let Some(term) = terms.iter().find(|t| lowered.contains(&t.to_lowercase())) {
        deny(format!("text contains denylisted term: \"{term}\""))
    } else {
        RuleOutcome::NotApplicable
    }
}

fn evaluate_pii_redact(intent: &Intent) -> RuleOutcome {
    let Some(body) = as_str(intent.argument("body")) else {
        return RuleOutcome::NotApplicable;
    };
    let external = as_bool(intent.context.get("recipient_external")).unwrap_or(false);
    if !external {
        return RuleOutcome::NotApplicable;
    }
    let scan = pii::scan_and_redact(body);
    if !scan.matched_any {
        return RuleOutcome::NotApplicable;
    }
    RuleOutcome::Modify {
        patch: json!({ "body": scan.redacted }),
        reason: "redacted structured PII for an external recipient".to_string(),
    }
}

// ---- Expense/financial ----------------------------------------------------

fn evaluate_expense_threshold(intent: &Intent, max_amount: Decimal) -> RuleOutcome {
    if !intent.capability.starts_with("expense.") {
        return RuleOutcome::NotApplicable;
    }
    let Some(amount) = as_decimal(intent.argument("amount")) else {
        return RuleOutcome::NotApplicable;
    };
    if amount > max_amount {
        deny_with(
            format!("expense amount {amount} exceeds the per-transaction threshold of {max_amount}"),
            Remediation {
                suggestion: "split the expense or route it through manager approval".to_string(),
                auto_fix: None,
                reversibility: Reversibility::Low,
            },
        )
    } else {
        RuleOutcome::Allow
    }
}

fn evaluate_receipt_required(intent: &Intent, floor: Decimal) -> RuleOutcome {
    if !intent.capability.starts_with("expense.") {
        return RuleOutcome::NotApplicable;
    }
    let Some(amount) = as_decimal(intent.argument("amount")) else {
        return RuleOutcome::NotApplicable;
    };
    if amount <= floor {
        return RuleOutcome::NotApplicable;
    }
    if as_bool(intent.argument("receipt_attached")).unwrap_or(false) {
        RuleOutcome::Allow
    } else {
        deny_with(
            format!("expenses over {floor} require an attached receipt"),
            Remediation {
                suggestion: "attach a receipt and resubmit".to_string(),
                auto_fix: None,
                reversibility: Reversibility::Medium,
            },
        )
    }
}

fn evaluate_self_approval_ban(intent: &Intent) -> RuleOutcome {
    if !intent.capability.starts_with("expense.") {
        return RuleOutcome::NotApplicable;
    }
    let Some(approver) = as_str(intent.argument("approver_id")) else {
        return RuleOutcome::NotApplicable;
    };
    if approver == intent.agent_id.as_str() {
        deny("an expense cannot be approved by its own requester")
    } else {
        RuleOutcome::Allow
    }
}

fn evaluate_category_cap(intent: &Intent, category: &str, cap: Decimal) -> RuleOutcome {
    if !intent.capability.starts_with("expense.") {
        return RuleOutcome::NotApplicable;
    }
    if as_str(intent.argument("category")) != Some(category) {
        return RuleOutcome::NotApplicable;
    }
    let Some(amount) = as_decimal(intent.argument("amount")) else {
        return RuleOutcome::NotApplicable;
    };
    if amount > cap {
        deny(format!("amount {amount} exceeds the {category} category cap of {cap}"))
    } else {
        RuleOutcome::Allow
    }
}

// ---- Identity/right-to-work -------------------------------------------

fn evaluate_right_to_work(intent: &Intent) -> RuleOutcome {
    if intent.capability != "hr.onboard" {
        return RuleOutcome::NotApplicable;
    }
    if as_bool(intent.argument("work_authorization_verified")).unwrap_or(false) {
        RuleOutcome::Allow
    } else {
        deny_with(
            "onboarding cannot proceed without verified work authorization",
            Remediation {
                suggestion: "complete work authorization verification before onboarding".to_string(),
                auto_fix: None,
                reversibility: Reversibility::Low,
            },
        )
    }
}

// ---- Data privacy --------------------------------------------------------

fn evaluate_data_minimization(intent: &Intent, capability_prefix: &str, allowed_fields: &[String]) -> RuleOutcome {
    if !intent.capability.starts_with(capability_prefix) {
        return RuleOutcome::NotApplicable;
    }
    let Some(obj) = intent.arguments.as_object() else {
        return RuleOutcome::NotApplicable;
    };
    let extra: Vec<&str> = obj
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed_fields.iter().any(|a| a == k))
        .collect();
    if extra.is_empty() {
        RuleOutcome::NotApplicable
    } else {
        RuleOutcome::Warn {
            reason: format!("arguments include fields beyond the minimum necessary set: {extra:?}"),
        }
    }
}

fn evaluate_retention_limit(intent: &Intent, max_days: i64) -> RuleOutcome {
    let Some(retention_days) = intent.argument("retention_days").and_then(Value::as_i64) else {
        return RuleOutcome::NotApplicable;
    };
    if retention_days > max_days {
        deny_with(
            format!("requested retention of {retention_days} days exceeds the limit of {max_days}"),
            Remediation {
                suggestion: format!("reduce retention to {max_days} days"),
                auto_fix: Some(json!({ "retention_days": max_days })),
                reversibility: Reversibility::High,
            },
        )
    } else {
        RuleOutcome::Allow
    }
}

fn evaluate_cross_border_transfer(intent: &Intent, allowed_regions: &[String]) -> RuleOutcome {
    let Some(destination) = as_str(intent.context.get("destination_region")) else {
        return RuleOutcome::NotApplicable;
    };
    if allowed_regions.iter().any(|r| r == destination) {
        RuleOutcome::Allow
    } else {
        deny_with(
            format!("cross-border transfer to {destination} is not in the approved region list"),
            Remediation {
                suggestion: "route the transfer through an approved region or obtain a transfer exception".to_string(),
                auto_fix: None,
                reversibility: Reversibility::Medium,
            },
        )
    }
}

// ---- Operational ----------------------------------------------------------

fn evaluate_change_window(
    intent: &Intent,
    capability_prefix: &str,
    allowed_start_hour: u32,
    allowed_end_hour: u32,
) -> RuleOutcome {
    if !intent.capability.starts_with(capability_prefix) {
        return RuleOutcome::NotApplicable;
    }
    let hour = intent.submitted_at.hour();
    if hour < allowed_start_hour || hour >= allowed_end_hour {
        deny_with(
            format!("change actions are restricted to {allowed_start_hour}:00-{allowed_end_hour}:00"),
            Remediation {
                suggestion: "schedule this change within the approved change window".to_string(),
                auto_fix: None,
                reversibility: Reversibility::High,
            },
        )
    } else {
        RuleOutcome::Allow
    }
}

fn evaluate_sla_threshold(intent: &Intent, max_duration_ms: u64) -> RuleOutcome {
    let Some(expected_ms) = intent.argument("expected_duration_ms").and_then(Value::as_u64) else {
        return RuleOutcome::NotApplicable;
    };
    if expected_ms > max_duration_ms {
        RuleOutcome::Warn {
            reason: format!("expected duration {expected_ms}ms exceeds the SLA threshold of {max_duration_ms}ms"),
        }
    } else {
        RuleOutcome::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paladin_core::Intent;

    fn intent(capability: &str, args: Value) -> Intent {
        Intent::new("agent-1", capability, args)
    }

    #[test]
    fn weekend_ban_denies_saturday() {
        let rule = Rule::WeekendBan {
            id: "temporal.weekend_ban".into(),
            capability_prefix: "calendar.".into(),
        };
        let i = intent("calendar.book", json!({ "date": "2026-02-08" }));
        match rule.evaluate(&i) {
            RuleOutcome::Deny { reason, .. } => assert!(reason.contains("weekend")),
            other => panic!("expected deny, got {other:?}"),
        }
    }

    #[test]
    fn weekend_ban_allows_weekday() {
        let rule = Rule::WeekendBan {
            id: "temporal.weekend_ban".into(),
            capability_prefix: "calendar.".into(),
        };
        let i = intent("calendar.book", json!({ "date": "2026-02-10" }));
        assert!(matches!(rule.evaluate(&i), RuleOutcome::Allow));
    }

    #[test]
    fn compensation_band_proposes_clamp_remediation() {
        let rule = Rule::CompensationBand {
            id: "comp.bands".into(),
            role: "L4".into(),
            floor: Decimal::new(120_000, 0),
            ceiling: Decimal::new(180_000, 0),
        };
        let i = intent("offer.generate", json!({ "role": "L4", "salary": 200000 }));
        match rule.evaluate(&i) {
            RuleOutcome::Deny { remediation, .. } => {
                let fix = remediation.unwrap().auto_fix.unwrap();
                assert_eq!(fix["salary"], 180000);
            }
            other => panic!("expected deny, got {other:?}"),
        }
    }

    #[test]
    fn pii_redact_only_fires_for_external_recipients() {
        let rule = Rule::PiiRedact {
            id: "comms.pii".into(),
        };
        let mut i = intent("email.send", json!({ "body": "call 555-123-4567" }));
        assert!(matches!(rule.evaluate(&i), RuleOutcome::NotApplicable));

        i.context.insert("recipient_external".into(), json!(true));
        match rule.evaluate(&i) {
            RuleOutcome::Modify { patch, .. } => {
                assert_eq!(patch["body"], "call [REDACTED_PHONE]");
            }
            other => panic!("expected modify, got {other:?}"),
        }
    }

    #[test]
    fn unrelated_capability_is_not_applicable() {
        let rule = Rule::WeekendBan {
            id: "temporal.weekend_ban".into(),
            capability_prefix: "calendar.".into(),
        };
        let i = intent("email.send", json!({}));
        assert!(matches!(rule.evaluate(&i), RuleOutcome::NotApplicable));
    }
}
