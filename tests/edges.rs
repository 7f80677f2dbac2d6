use lf_sampler::{
    data::{
        candidates::{Candidate, CandidateTable},
        predictions::join_candidates,
        Split,
    },
    edges::{aggregate, recall_at_cutoff, threshold_search, CandidatePrediction, Statistic},
    Error,
};
use proptest::prelude::*;

fn prediction(pair: (&str, &str), marginal: f64, in_kb: bool) -> CandidatePrediction {
    CandidatePrediction {
        entity_id_1: pair.0.into(),
        entity_id_2: pair.1.into(),
        entity_1_name: None,
        entity_2_name: None,
        split: Split::Test,
        in_reference_kb: in_kb,
        marginal,
    }
}

#[test]
fn group_statistics_and_strict_cutoff() {
    let pair = ("DOID:1612", "672");
    let edges = aggregate(&[
        prediction(pair, 0.9, true),
        prediction(pair, 0.2, false),
        prediction(pair, 0.4, false),
    ]);
    assert_eq!(edges.len(), 1);
    let edge = &edges[0];
    assert_eq!(edge.max_score, 0.9);
    assert!((edge.mean_score - 0.5).abs() < 1e-12);
    assert_eq!(edge.median_score, 0.4);
    assert!(edge.in_reference_kb);

    assert_eq!(recall_at_cutoff(&edges, Statistic::Max, 0.5).edges_existing, 1);
    assert_eq!(recall_at_cutoff(&edges, Statistic::Median, 0.5).edges_existing, 0);
    let max = recall_at_cutoff(&edges, Statistic::Max, 0.5);
    assert_eq!(max.recall, 1.0);
    assert_eq!(max.total_existing, 1);
}

#[test]
fn regrouping_by_max_is_idempotent() {
    let predictions = vec![
        prediction(("a", "x"), 0.3, false),
        prediction(("b", "y"), 0.8, true),
        prediction(("a", "x"), 0.6, false),
        prediction(("b", "y"), 0.1, true),
    ];
    let once = aggregate(&predictions);
    let regrouped: Vec<CandidatePrediction> =
        once.iter().map(|edge| edge.as_prediction(Statistic::Max)).collect();
    let twice = aggregate(&regrouped);
    let scores = |edges: &[lf_sampler::edges::GroupedEdge]| -> Vec<f64> {
        edges.iter().map(|e| e.max_score).collect()
    };
    assert_eq!(scores(&once), scores(&twice));
    assert_eq!(scores(&once), vec![0.6, 0.8]);
}

#[test]
fn unknown_prediction_ids_fail_the_join() {
    let table = CandidateTable::new(vec![Candidate {
        candidate_id: 1,
        sentence_id: 10,
        entity_id_1: "DOID:1612".into(),
        entity_id_2: "672".into(),
        split: Split::Dev,
        sentence_text: "BRCA1 mutations in breast cancer".into(),
        sentence_length: 5,
        in_reference_kb: true,
        entity_1_name: Some("breast cancer".into()),
        entity_2_name: Some("BRCA1".into()),
    }])
    .unwrap();
    let joined = join_candidates(&table, &[(1, 0.7)]).unwrap();
    assert_eq!(joined[0].entity_2_name.as_deref(), Some("BRCA1"));
    assert!(matches!(
        join_candidates(&table, &[(1, 0.7), (2, 0.1)]),
        Err(Error::UnknownCandidate(2))
    ));
}

proptest! {
    #[test]
    fn thresholds_rise_as_precision_targets_rise(
        scored in prop::collection::vec((0.0f64..1.0, any::<bool>()), 2..60),
    ) {
        prop_assume!(scored.iter().any(|(_, kb)| *kb) && scored.iter().any(|(_, kb)| !*kb));
        let predictions: Vec<CandidatePrediction> = scored
            .iter()
            .enumerate()
            .map(|(i, (score, kb))| prediction((format!("e{i}").as_str(), "g"), *score, *kb))
            .collect();
        let edges = aggregate(&predictions);
        let rows = threshold_search(&edges, Statistic::Max).unwrap();
        for pair in rows.windows(2) {
            prop_assert!(pair[0].precision_target > pair[1].precision_target);
            prop_assert!(pair[0].score_threshold >= pair[1].score_threshold);
            prop_assert!(pair[0].edges_existing <= pair[1].edges_existing);
            prop_assert!(pair[0].edges_novel <= pair[1].edges_novel);
        }
    }
}
