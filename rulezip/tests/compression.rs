//! End-to-end compression runs against small knowledge bases, checking the
//! mined rules, the necessity analysis, and the recovery round trip.

use rulezip::compress::Compressor;
use rulezip::config::MiningConfig;
use rulezip::eval::EvalMetric;
use rulezip::kb::KnowledgeBase;
use rulezip::mining::StopFlag;
use rulezip::recovery::{reconstruct, validate};

/// father = {(a,b),(b,c),(c,d),(d,e)}, mother = {(i,j)},
/// parent = father plus (i,j); constants a-j.
fn family_kb() -> KnowledgeBase {
    let mut kb = KnowledgeBase::new();
    for symbol in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
        kb.symbols_mut().add_str(symbol);
    }
    let parent = kb.add_relation("parent", 2).unwrap();
    for pair in [[0, 1], [1, 2], [2, 3], [3, 4], [8, 9]] {
        kb.add_fact(parent, &pair).unwrap();
    }
    let father = kb.add_relation("father", 2).unwrap();
    for pair in [[0, 1], [1, 2], [2, 3], [3, 4]] {
        kb.add_fact(father, &pair).unwrap();
    }
    let mother = kb.add_relation("mother", 2).unwrap();
    kb.add_fact(mother, &[8, 9]).unwrap();
    kb
}

#[test]
fn family_round_trip() {
    let original = family_kb();
    let mut kb = original.clone();
    let config = MiningConfig {
        metric: EvalMetric::CompressionRatio,
        min_fact_coverage: 0.1,
        targets: vec!["parent".to_string()],
        ..MiningConfig::default()
    };

    let result = Compressor::new(config, StopFlag::new())
        .compress(&mut kb)
        .unwrap();

    assert_eq!(result.rules.len(), 1);
    assert_eq!(result.rules[0].display(&kb), "parent(X0,X1):-father(X0,X1)");
    assert!(result.counterexamples.is_empty());

    // The mother-derived parent fact has no father witness and stays
    // necessary, next to all father and mother facts.
    let parent = kb.find_relation("parent").unwrap();
    let ij = kb.relation(parent).find(&[8, 9]).unwrap();
    assert!(result
        .necessary
        .iter()
        .any(|fact| fact.relation == parent && fact.index == ij));
    assert_eq!(result.necessary.len(), 6);

    let recovered = reconstruct(&original, &result).unwrap();
    assert_eq!(recovered.relation(parent).len(), 5);
    assert!(validate(&original, &result).unwrap());
}

#[test]
fn mutually_derived_relations_keep_one_fact_per_cycle() {
    let mut original = KnowledgeBase::new();
    for symbol in ["a", "b", "c", "d", "e", "f"] {
        original.symbols_mut().add_str(symbol);
    }
    let husband = original.add_relation("husband", 2).unwrap();
    let wife = original.add_relation("wife", 2).unwrap();
    for pair in [[0, 1], [2, 3], [4, 5]] {
        original.add_fact(husband, &pair).unwrap();
        original.add_fact(wife, &[pair[1], pair[0]]).unwrap();
    }

    let mut kb = original.clone();
    let config = MiningConfig {
        metric: EvalMetric::CompressionRatio,
        min_fact_coverage: 0.1,
        ..MiningConfig::default()
    };

    let result = Compressor::new(config, StopFlag::new())
        .compress(&mut kb)
        .unwrap();

    assert_eq!(result.rules.len(), 2);
    assert_eq!(result.rules[0].display(&kb), "husband(X0,X1):-wife(X1,X0)");
    assert_eq!(result.rules[1].display(&kb), "wife(X0,X1):-husband(X1,X0)");
    assert!(result.counterexamples.is_empty());

    // Every fact is derived from its mirror image, so the derivation graph
    // consists of three two-cycles; one member of each must be stored.
    assert_eq!(result.necessary.len(), 3);

    assert!(validate(&original, &result).unwrap());
}

#[test]
fn reports_resolve_names() {
    let original = family_kb();
    let mut kb = original.clone();
    let config = MiningConfig {
        metric: EvalMetric::CompressionRatio,
        min_fact_coverage: 0.1,
        targets: vec!["parent".to_string()],
        ..MiningConfig::default()
    };

    let result = Compressor::new(config, StopFlag::new())
        .compress(&mut kb)
        .unwrap();
    let report = result.report(&kb);

    assert_eq!(report.rules, vec!["parent(X0,X1):-father(X0,X1)"]);
    assert!(report
        .necessary
        .iter()
        .any(|fact| fact.relation == "parent" && fact.tuple == ["i", "j"]));
    assert_eq!(report.supplementary_constants, vec!["f", "g", "h"]);
    assert_eq!(report.parameters.min_fact_coverage, 0.1);
    assert_eq!(report.parameters.metric, EvalMetric::CompressionRatio);

    let serialized = serde_json::to_string(&report).unwrap();
    assert!(serialized.contains("parent(X0,X1):-father(X0,X1)"));
    assert!(serialized.contains("min_fact_coverage"));
}
