//! Run with: cargo bench -p paladin-policy

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal_macros::dec;
use serde_json::json;

use paladin_core::Intent;
use paladin_policy::{PolicyEngine, Rule, RuleSet};

fn small_rule_set() -> RuleSet {
    RuleSet {
        rules: vec![
            Rule::WeekendBan {
                id: "temporal.weekend_ban".into(),
                capability_prefix: "calendar.".into(),
            },
            Rule::CompensationBand {
                id: "hr.compensation_bands".into(),
                role: "L4".into(),
                floor: dec!(120000),
                ceiling: dec!(180000),
            },
            Rule::PiiRedact {
                id: "comms.pii".into(),
            },
        ],
    }
}

fn large_rule_set() -> RuleSet {
    let mut rules = small_rule_set().rules;
    for i in 0..50 {
        rules.push(Rule::CategoryCap {
            id: format!("expense.category_cap.{i}"),
            category: format!("category_{i}"),
            cap: dec!(1000),
        });
    }
    RuleSet { rules }
}

fn benchmark_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_evaluate");

    let scenarios = vec![
        (
            "allow_path",
            Intent::new("scheduler", "calendar.book", json!({"date": "2026-02-10", "time": "14:00"})),
        ),
        (
            "deny_path",
            Intent::new("negotiator", "offer.generate", json!({"role": "L4", "salary": 200000})),
        ),
        (
            "modify_path",
            Intent::new(
                "sourcer",
                "email.send",
                json!({"to": "external@example.com", "body": "contact 555-123-4567"}),
            )
            .with_context("recipient_external", json!(true)),
        ),
    ];

    for rule_set_size in ["small", "large"] {
        let engine = PolicyEngine::new(if rule_set_size == "small" {
            small_rule_set()
        } else {
            large_rule_set()
        });
        for (name, intent) in &scenarios {
            group.throughput(Throughput::Elements(1));
            group.bench_with_input(BenchmarkId::new(rule_set_size, name), intent, |b, intent| {
                b.iter(|| engine.evaluate(black_box(intent)));
            });
        }
    }

    group.finish();
}

fn benchmark_reload(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_reload");
    let yaml = "rules:\n  - kind: weekend_ban\n    id: temporal.weekend_ban\n    capability_prefix: calendar.\n";
    let engine = PolicyEngine::new(small_rule_set());
    group.bench_function("hot_reload", |b| {
        b.iter(|| engine.reload(black_box(yaml)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, benchmark_evaluate, benchmark_reload);
criterion_main!(benches);
