use super::*;

#[test]
fn matching_pair_is_consistent() {
    let report = compare_positions(&[0, 1, 2], &[0, 1, 2], Some(3));

    assert!(report.is_consistent);
    assert_eq!(report.total_issues(), 0);
    assert!(report.summary().contains("Index is consistent"));
}

#[test]
fn vector_order_does_not_matter() {
    let report = compare_positions(&[0, 1, 2], &[2, 0, 1], Some(3));
    assert!(report.is_consistent);
}

#[test]
fn missing_vectors_are_reported() {
    let report = compare_positions(&[0, 1, 2, 3], &[0, 1], Some(4));

    assert!(!report.is_consistent);
    assert_eq!(report.missing_vectors, vec![2, 3]);
    assert!(report.orphaned_vectors.is_empty());
    assert!(report.summary().contains("2 missing vectors"));
    assert!(report.summary().contains("4 chunks vs 2 vectors"));
}

#[test]
fn orphaned_vectors_are_reported() {
    let report = compare_positions(&[0], &[0, 1], Some(1));

    assert!(!report.is_consistent);
    assert_eq!(report.orphaned_vectors, vec![1]);
    assert!(report.summary().contains("1 orphaned vectors"));
}

#[test]
fn gaps_in_chunk_positions_are_inconsistent() {
    let report = compare_positions(&[0, 2], &[0, 2], Some(2));

    assert!(!report.positions_contiguous);
    assert!(!report.is_consistent);
    assert!(report.summary().contains("gaps"));
}

#[test]
fn duplicate_vectors_are_inconsistent() {
    let report = compare_positions(&[0, 1], &[0, 1, 1], Some(2));
    assert!(!report.is_consistent);
}

#[test]
fn missing_build_record_is_inconsistent() {
    let report = compare_positions(&[0, 1], &[0, 1], None);

    assert!(!report.is_consistent);
    assert!(report.summary().contains("no completed build recorded"));
}

#[test]
fn empty_pair_with_record_is_consistent() {
    let report = compare_positions(&[], &[], Some(0));
    assert!(report.is_consistent);
}
