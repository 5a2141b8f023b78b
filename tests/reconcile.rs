use std::collections::BTreeMap;

use kira_mirna_graph::domain::{
    MirnaId, MirnaKind, RelationKind, RelationSpec, Score, ScoreConvention, TargetId,
};
use kira_mirna_graph::gene::GeneRecord;
use kira_mirna_graph::graph::{GraphStore, JsonGraph, MirnaNode};
use kira_mirna_graph::reconcile::{EdgeOutcome, EdgeReconciler, Observation, Provenance};

struct Fixture {
    graph: JsonGraph,
    mirna: MirnaId,
    target: TargetId,
}

fn fixture() -> Fixture {
    let mut graph = JsonGraph::in_memory();
    let (mirna, _) = graph
        .merge_mirna(MirnaNode::new(
            "hsa-miR-23a-3p",
            Some("MIMAT0000078"),
            "Homo sapiens",
            MirnaKind::Mature,
        ))
        .unwrap();
    let (target, _) = graph
        .merge_target(&GeneRecord {
            symbol: Some("TP53".to_string()),
            geneid: Some("7157".to_string()),
            ..GeneRecord::default()
        })
        .unwrap();
    Fixture {
        graph,
        mirna,
        target,
    }
}

fn observe<'a>(
    fixture: &Fixture,
    relation: &'a RelationSpec,
    score: Score,
    source_mirna: &str,
    source_target: &str,
) -> Observation<'a> {
    Observation {
        relation,
        from: fixture.mirna,
        to: fixture.target,
        score,
        provenance: Provenance {
            source_mirna: source_mirna.to_string(),
            source_target: source_target.to_string(),
        },
        evidence: BTreeMap::new(),
    }
}

#[test]
fn targetscan_keeps_lowest_score_and_collects_provenance() {
    let mut fixture = fixture();
    let relation = RelationSpec::new("TargetScan", RelationKind::TargetScan);
    let mut reconciler = EdgeReconciler::new();

    let first = observe(&fixture, &relation, Score::Numeric(0.45), "miR-23-3p", "ENSG1");
    let created = reconciler.reconcile(&mut fixture.graph, first).unwrap();
    let EdgeOutcome::Created(id) = created else {
        panic!("expected a new edge, got {created:?}");
    };

    let better = observe(&fixture, &relation, Score::Numeric(0.30), "miR-23a-3p", "ENSG1");
    assert_eq!(
        reconciler.reconcile(&mut fixture.graph, better).unwrap(),
        EdgeOutcome::Updated(id)
    );
    let worse = observe(&fixture, &relation, Score::Numeric(0.90), "miR-23-3p", "ENSG1.2");
    assert_eq!(
        reconciler.reconcile(&mut fixture.graph, worse).unwrap(),
        EdgeOutcome::Updated(id)
    );

    let edge = fixture.graph.edge(id).unwrap();
    assert_eq!(edge.score, Score::Numeric(0.30));
    assert_eq!(edge.source_mirnas, vec!["miR-23-3p", "miR-23a-3p"]);
    assert_eq!(edge.source_targets, vec!["ENSG1", "ENSG1.2"]);
    assert_eq!(fixture.graph.edges().count(), 1);

    let range = reconciler.range("TargetScan");
    assert_eq!((range.min, range.max), (Some(0.30), Some(0.90)));
}

#[test]
fn pictar_keeps_highest_score_per_source_pair() {
    let mut fixture = fixture();
    let relation = RelationSpec::new("PicTar4", RelationKind::PicTar);
    let mut reconciler = EdgeReconciler::new();

    let first = observe(&fixture, &relation, Score::Numeric(2.5), "mmu-miR-1", "NM_001");
    let EdgeOutcome::Created(id) = reconciler.reconcile(&mut fixture.graph, first).unwrap() else {
        panic!("expected a new edge");
    };
    let second = observe(&fixture, &relation, Score::Numeric(4.0), "MMU-MIR-1", "nm_001");
    reconciler.reconcile(&mut fixture.graph, second).unwrap();
    assert_eq!(fixture.graph.edge(id).unwrap().score, Score::Numeric(4.0));

    let other_site = observe(&fixture, &relation, Score::Numeric(1.0), "mmu-miR-1", "NM_002");
    assert!(matches!(
        reconciler.reconcile(&mut fixture.graph, other_site).unwrap(),
        EdgeOutcome::Created(_)
    ));
}

#[test]
fn rna22_duplicate_is_left_alone() {
    let mut fixture = fixture();
    let relation = RelationSpec::new("RNA22v2", RelationKind::Rna22);
    let mut reconciler = EdgeReconciler::new();

    let first = observe(&fixture, &relation, Score::Numeric(0.01), "hsa-miR-23a-3p", "NM_000546");
    let EdgeOutcome::Created(id) = reconciler.reconcile(&mut fixture.graph, first).unwrap() else {
        panic!("expected a new edge");
    };
    let duplicate =
        observe(&fixture, &relation, Score::Numeric(0.001), "hsa-miR-23a-3p", "NM_000546");
    assert_eq!(
        reconciler.reconcile(&mut fixture.graph, duplicate).unwrap(),
        EdgeOutcome::AlreadyExists(id)
    );
    assert_eq!(fixture.graph.edge(id).unwrap().score, Score::Numeric(0.01));
}

#[test]
fn mirtarbase_records_every_observation() {
    let mut fixture = fixture();
    let relation = RelationSpec::new("miRTarBase", RelationKind::MirTarBase);
    let mut reconciler = EdgeReconciler::new();

    for pmid in ["19015723", "19015723", "21258411"] {
        let observation = observe(
            &fixture,
            &relation,
            Score::Text(pmid.to_string()),
            "hsa-miR-23a-3p",
            "7157",
        );
        assert!(matches!(
            reconciler.reconcile(&mut fixture.graph, observation).unwrap(),
            EdgeOutcome::Created(_)
        ));
    }
    assert_eq!(fixture.graph.edges_for_relation("miRTarBase").count(), 3);

    let info = reconciler.finish("miRTarBase", "http://mirtarbase", 0.0);
    assert_eq!((info.min, info.max), (0.0, 0.0));
}

#[test]
fn configured_convention_overrides_tool_default() {
    let mut fixture = fixture();
    let relation = RelationSpec::new("TargetScanContext", RelationKind::TargetScan)
        .with_convention(ScoreConvention::HigherIsBetter);
    let mut reconciler = EdgeReconciler::new();

    for score in [1.0, 5.0, 3.0] {
        let observation = observe(&fixture, &relation, Score::Numeric(score), "miR-23", "E");
        reconciler.reconcile(&mut fixture.graph, observation).unwrap();
    }
    let (_, edge) = fixture.graph.edges().next().unwrap();
    assert_eq!(edge.score, Score::Numeric(5.0));

    let info = reconciler.finish("TargetScanContext", "https://targetscan", 0.5);
    assert_eq!((info.min, info.max, info.cutoff), (1.0, 5.0, 0.5));
    assert_eq!(info.name, "TargetScanContext");
}

#[test]
fn finish_without_observations_defaults_to_zero() {
    let reconciler = EdgeReconciler::new();
    let info = reconciler.finish("PicTar", "http://pictar", 0.0);
    assert_eq!((info.min, info.max), (0.0, 0.0));
    assert!(!info.updated_at.is_empty());
}
