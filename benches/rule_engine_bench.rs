//! 物料规则引擎性能基准测试
//!
//! 测试覆盖：
//! - 规则集加载（校验 + 表达式预解析）
//! - 不同构件数量下的端到端计算
//! - 串行与并行计算对比

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use material_rules::{EngineOptions, Feature, MaterialEngine, RuleSet, load_rule_set};
use serde_json::{Value, json};
use std::hint::black_box;

/// 创建包含 N 条规则的规则集
fn create_rule_set_json(rules_count: usize) -> Value {
    let mut rules = vec![
        json!({
            "when": { "feature": "wall", "partitionType": "Interior" },
            "materials": [
                { "sku": "STUD-362-20GA", "qty": "length * 0.75", "uom": "ea" },
                { "sku": "GWB-58-X", "qty": "length * height_ft * 2" },
                { "sku": "TRACK-362", "qty": "length * 2 * (1 + waste_pct)" }
            ]
        }),
        json!({
            "when": { "feature": "pipe", "service": "Water" },
            "materials": [
                { "sku": "PVC-2IN", "qty": "length*(1+waste_pct)", "uom": "ft" }
            ]
        }),
    ];

    // 额外的规则不会命中，只增加匹配成本
    let base = rules.len();
    rules.extend((base..rules_count).map(|i| {
        json!({
            "when": { "feature": format!("feature_{}", i), "zone": "B" },
            "materials": [{ "sku": format!("SKU-{}", i), "qty": "count * 2" }]
        })
    }));

    json!({
        "version": 1,
        "units": { "linear": "ft", "area": "ft2", "volume": "ft3" },
        "vars": { "height_ft": 10, "waste_pct": 0.07 },
        "rules": rules
    })
}

/// 创建 N 个构件，墙体与管线交替
fn create_features(count: usize) -> Vec<Feature> {
    (0..count)
        .map(|i| {
            let (kind, key, value) = if i % 2 == 0 {
                ("wall", "partitionType", "Interior")
            } else {
                ("pipe", "service", "Water")
            };
            Feature::new(format!("f-{}", i), kind)
                .with_length(10.0 + (i % 50) as f64)
                .with_prop("feature", kind)
                .with_prop(key, value)
        })
        .collect()
}

/// 规则集加载基准
fn bench_rule_set_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_set_loading");

    for rules_count in [10, 100, 1000] {
        let raw = create_rule_set_json(rules_count);
        group.throughput(Throughput::Elements(rules_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rules_count), &raw, |b, raw| {
            b.iter(|| load_rule_set(black_box(raw)))
        });
    }

    group.finish();
}

/// 端到端计算基准
fn bench_engine_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_run");
    let rule_set = RuleSet::from_json(&create_rule_set_json(50).to_string()).unwrap();
    let sequential = MaterialEngine::default();
    let parallel = MaterialEngine::new(EngineOptions {
        parallel: true,
        ..Default::default()
    });

    for features_count in [100, 1_000, 10_000] {
        let features = create_features(features_count);
        group.throughput(Throughput::Elements(features_count as u64));

        group.bench_with_input(
            BenchmarkId::new("sequential", features_count),
            &features,
            |b, features| b.iter(|| sequential.run(black_box(&rule_set), black_box(features))),
        );

        group.bench_with_input(
            BenchmarkId::new("parallel", features_count),
            &features,
            |b, features| b.iter(|| parallel.run(black_box(&rule_set), black_box(features))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_rule_set_loading, bench_engine_run);
criterion_main!(benches);
