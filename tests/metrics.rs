use lf_sampler::{
    metrics::{auc, evaluate, precision_recall_curve, roc_curve},
    Error,
};

#[test]
fn single_class_truth_is_undefined() {
    let err = evaluate(&[true, true, true], &[0.2, 0.5, 0.9]).unwrap_err();
    assert!(matches!(err, Error::UndefinedMetric { positives: 3, negatives: 0 }));
    assert_eq!(err.status(), "undefined");
}

#[test]
fn perfect_ranking_scores_one() {
    let truth = [false, false, true, true];
    let scores = [0.1, 0.4, 0.35, 0.8];
    let eval = evaluate(&truth, &[0.1, 0.2, 0.7, 0.9]).unwrap();
    assert_eq!(eval.auroc, 1.0);
    assert_eq!(eval.aupr, 1.0);

    let roc = roc_curve(&truth, &scores).unwrap();
    assert!((auc(&roc.false_positive_rate, &roc.true_positive_rate) - 0.75).abs() < 1e-12);
    let pr = precision_recall_curve(&truth, &scores).unwrap();
    assert_eq!(pr.precision.last(), Some(&1.0));
    assert_eq!(pr.recall.last(), Some(&0.0));
}

#[test]
fn mismatched_lengths_are_rejected() {
    assert!(matches!(
        evaluate(&[true, false], &[0.5]),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        evaluate(&[true, false], &[0.5, f64::NAN]),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn curves_reject_truth_shorter_than_scores() {
    let scores = [0.9, 0.4, 0.1];
    assert!(matches!(
        roc_curve(&[true, false], &scores),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        precision_recall_curve(&[true], &scores),
        Err(Error::Configuration(_))
    ));
}
