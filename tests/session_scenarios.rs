//! End-to-end tuning scenarios
//!
//! Each test drives a session through the public API the way a front-end
//! would: create, judge, persist, reload, finalize.

use printtune::prelude::*;
use std::sync::Once;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn tuner() -> Tuner {
    init_tracing();
    let mut config = TuneConfig::default();
    config.proposal.num_restarts = 4;
    config.proposal.raw_samples = 32;
    config.proposal.local_iterations = 20;
    Tuner::new(config).unwrap()
}

fn expected_l4() -> [[f64; 6]; 4] {
    // exposure_stops, contrast, saturation, temp, tint, gamma
    [
        [-0.8, -0.2, 0.0, -0.5, 0.0, 0.15],
        [-0.8, 0.2, 0.0, 0.5, 0.0, -0.15],
        [0.8, -0.2, 0.0, 0.5, 0.0, 0.15],
        [0.8, 0.2, 0.0, -0.5, 0.0, -0.15],
    ]
}

/// Check a model-driven round against the box its metadata describes
fn assert_within_round_box(round: &Round) {
    let center = round.metadata.center.expect("model-driven round has a center");
    let half_widths = round.metadata.schedule.half_widths(round.delta_scale);
    match round.metadata.method.as_ref().expect("model-driven round has a method") {
        ProposalMethod::Acquisition { .. } => {
            let search_box = SearchBox::around(&center.vector, &half_widths, NOMINAL_RANGE);
            for c in &round.candidates {
                assert!(search_box.contains(&c.vector), "{:?} outside {:?}", c.vector, search_box);
            }
        }
        ProposalMethod::Fallback { .. } => {
            for c in &round.candidates {
                for axis in Axis::ALL {
                    let offset = (c.vector[axis] - center.vector[axis]).abs();
                    assert!(offset <= half_widths[axis.index()] + 1e-9);
                }
            }
        }
    }
}

#[test]
fn initial_round_is_fixed_l4_design() {
    let session = tuner().new_session("ref.png");
    let round = session.round(1).unwrap();

    assert_eq!(round.mode, RoundMode::Orthogonal);
    assert_eq!(round.purpose, RoundPurpose::InitialDesign);
    assert_eq!(round.slots(), vec!["A", "B", "C", "D"]);
    assert_eq!(round.phase(), 1);
    assert!(round.judgment.is_none());
    for (candidate, expected) in round.candidates.iter().zip(expected_l4()) {
        for (got, want) in candidate.vector.values().iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{:?} vs {:?}", candidate.vector, expected);
        }
    }
}

#[test]
fn chosen_then_reprint() {
    let tuner = tuner();
    let session = tuner.new_session("ref.png");

    // Round 1: B wins over A, C, D
    let outcome = tuner
        .submit_judgment(&session, 1, &JudgmentRequest::chosen("B"))
        .unwrap();
    let session = outcome.session;
    assert_eq!(
        session.comparisons(),
        &[
            Comparison::new(1, 0),
            Comparison::new(1, 2),
            Comparison::new(1, 3)
        ]
    );
    let r2 = session.round(2).unwrap();
    assert_eq!(r2.mode, RoundMode::Pairwise);
    assert_eq!(r2.purpose, RoundPurpose::PairwiseExplore);
    assert_eq!(r2.candidates.len(), 2);
    assert_eq!(r2.phase(), 2);
    assert_eq!(
        r2.metadata.provenance,
        Provenance::Explore {
            source_round: 1,
            from_rejudge: false
        }
    );
    for c in &r2.candidates {
        assert!(c.vector.within(NOMINAL_RANGE));
    }

    // Round 2: undecidable on shadows, reprint twice as wide
    let outcome = tuner
        .submit_judgment(&session, 2, &JudgmentRequest::reprint(Rubric::Shadows, 2.0))
        .unwrap();
    let session = outcome.session;
    assert_eq!(outcome.transition.new_comparisons, 0);
    assert_eq!(session.comparisons().len(), 3);

    let r3 = session.round(3).unwrap();
    assert_eq!(r3.mode, RoundMode::Pairwise);
    assert_eq!(r3.purpose, RoundPurpose::Reprint);
    assert_eq!(r3.phase(), 2);
    assert_eq!(r3.delta_scale, 2.0);
    assert_eq!(r3.rubric, Some(Rubric::Shadows));

    let base = PhaseTable::default().schedule(2, None);
    assert_eq!(r3.metadata.schedule.delta, base.delta);
    assert!((r3.metadata.schedule.scaled_delta(r3.delta_scale) - 2.0 * base.delta).abs() < 1e-12);
    assert_eq!(
        r3.metadata.schedule.active_axes,
        vec![Axis::Exposure, Axis::Gamma, Axis::Contrast]
    );
    assert_within_round_box(r3);

    // Round 3 is exactly the proposal for the doubled box
    let config = tuner.config();
    let points: Vec<ParameterVector> = session
        .registry()
        .entries()
        .iter()
        .take(6)
        .map(|e| e.vector)
        .collect();
    let replay = |delta_scale: f64| {
        let request = ProposalRequest {
            points: &points,
            comparisons: session.comparisons(),
            anchor: r3.metadata.center.unwrap(),
            schedule: &r3.metadata.schedule,
            delta_scale,
            q: 2,
            seed: r3.metadata.seed.unwrap(),
        };
        propose(&request, &config.model, &config.proposal)
    };
    let doubled = replay(2.0);
    let got: Vec<ParameterVector> = r3.candidates.iter().map(|c| c.vector).collect();
    assert_eq!(got, doubled.vectors);
    assert_eq!(Some(doubled.center), r3.metadata.center);
    assert_ne!(got, replay(1.0).vectors);
}

#[test]
fn third_rejudge_is_recorded_as_reprint() {
    let tuner = tuner();
    let mut session = tuner.new_session("ref.png");

    for round_index in 1..=2 {
        let outcome = tuner
            .submit_judgment(&session, round_index, &JudgmentRequest::rejudge(Rubric::Skin, "A"))
            .unwrap();
        assert!(!outcome.transition.rejudge_downgraded());
        session = outcome.session;
    }
    assert_eq!(session.rejudge_count(), 2);
    assert_eq!(session.current_phase(), 3);
    let after_two = session.comparisons().len();
    assert_eq!(after_two, 3 + 1);

    let outcome = tuner
        .submit_judgment(&session, 3, &JudgmentRequest::rejudge(Rubric::Skin, "B"))
        .unwrap();
    assert!(outcome.transition.rejudge_downgraded());
    let session = outcome.session;

    assert_eq!(session.rejudge_count(), 2);
    assert_eq!(session.comparisons().len(), after_two);
    match session.round(3).unwrap().judgment.as_ref().unwrap() {
        Judgment::Undecidable {
            next_action,
            chosen_slot,
            rejudge_exhausted,
            ..
        } => {
            assert_eq!(*next_action, NextAction::Reprint);
            assert!(chosen_slot.is_none());
            assert!(rejudge_exhausted);
        }
        other => panic!("unexpected judgment {:?}", other),
    }
    let r4 = session.round(4).unwrap();
    assert_eq!(r4.phase(), 3);
    assert_eq!(r4.purpose, RoundPurpose::Reprint);
    assert_eq!(
        r4.metadata.provenance,
        Provenance::Reprint {
            source_round: 3,
            trigger: ReprintTrigger::RejudgeExhausted
        }
    );
}

#[test]
fn both_bad_on_initial_round_shifts_block() {
    let tuner = tuner();
    let session = tuner.new_session("ref.png");
    let outcome = tuner
        .submit_judgment(&session, 1, &JudgmentRequest::both_bad(Rubric::Overall, 1.0))
        .unwrap();
    let session = outcome.session;

    let r2 = session.round(2).unwrap();
    assert_eq!(r2.mode, RoundMode::Orthogonal);
    assert_eq!(r2.phase(), 1);
    assert_eq!(
        r2.metadata.shift,
        Some(BlockShift {
            axis: Axis::Exposure,
            step: 0.35
        })
    );
    let r1 = session.round(1).unwrap();
    for (a, b) in r1.candidates.iter().zip(&r2.candidates) {
        assert_eq!(a.slot, b.slot);
        assert!((b.vector[Axis::Exposure] - a.vector[Axis::Exposure] - 0.35).abs() < 1e-12);
        assert_ne!(a.candidate_id, b.candidate_id);
    }
    assert!(session.comparisons().is_empty());

    // Judging the shifted block indexes its candidates after round 1
    let outcome = tuner
        .submit_judgment(&session, 2, &JudgmentRequest::chosen("D"))
        .unwrap();
    assert_eq!(
        outcome.session.comparisons(),
        &[
            Comparison::new(7, 4),
            Comparison::new(7, 5),
            Comparison::new(7, 6)
        ]
    );
    assert_eq!(outcome.session.round(3).unwrap().phase(), 2);
}

#[test]
fn round_cap_records_final_judgment_only() {
    init_tracing();
    let mut config = TuneConfig::default().with_max_rounds(3);
    config.proposal.num_restarts = 2;
    config.proposal.raw_samples = 8;
    config.proposal.local_iterations = 5;
    let tuner = Tuner::new(config).unwrap();

    let mut session = tuner.new_session("ref.png");
    session = tuner
        .submit_judgment(&session, 1, &JudgmentRequest::chosen("A"))
        .unwrap()
        .session;
    session = tuner
        .submit_judgment(&session, 2, &JudgmentRequest::chosen("B"))
        .unwrap()
        .session;
    assert_eq!(session.round_count(), 3);
    let comparisons = session.comparisons().to_vec();

    let outcome = tuner
        .submit_judgment(&session, 3, &JudgmentRequest::chosen("A"))
        .unwrap();
    assert!(outcome.transition.next_round.is_none());
    let session = outcome.session;
    assert_eq!(session.round_count(), 3);
    assert_eq!(session.comparisons(), comparisons.as_slice());
    assert!(session.pending_round().is_none());
    assert!(session.is_capped(3));

    assert_eq!(
        tuner
            .submit_judgment(&session, 3, &JudgmentRequest::chosen("B"))
            .unwrap_err(),
        JudgmentError::RoundAlreadyJudged(3)
    );
}

#[test]
fn persisted_session_resumes_identically() {
    let tuner = tuner();
    let dir = tempfile::TempDir::new().unwrap();
    let store = FileStore::new(dir.path()).with_format(StoreFormat::Binary);

    let session = tuner.new_session("ref.png");
    let session = tuner
        .submit_judgment(&session, 1, &JudgmentRequest::chosen("C"))
        .unwrap()
        .session;
    store.save(&session).unwrap();

    let restored = store.load(session.id()).unwrap();
    assert_eq!(restored, session);

    // The restored copy continues exactly like the original
    let a = tuner
        .submit_judgment(&session, 2, &JudgmentRequest::both_bad(Rubric::Highlights, 1.5))
        .unwrap()
        .session;
    let b = tuner
        .submit_judgment(&restored, 2, &JudgmentRequest::both_bad(Rubric::Highlights, 1.5))
        .unwrap()
        .session;
    let va: Vec<_> = a.round(3).unwrap().candidates.iter().map(|c| c.vector).collect();
    let vb: Vec<_> = b.round(3).unwrap().candidates.iter().map(|c| c.vector).collect();
    assert_eq!(va, vb);
}

#[test]
fn finalize_stores_an_observed_candidate() {
    let tuner = tuner();
    let dir = tempfile::TempDir::new().unwrap();
    let store = FileStore::new(dir.path());

    let mut session = tuner.new_session("ref.png");
    assert!(!session.has_finalized_best());
    for (round_index, slot) in [(1, "D"), (2, "A"), (3, "B")] {
        session = tuner
            .submit_judgment(&session, round_index, &JudgmentRequest::chosen(slot))
            .unwrap()
            .session;
    }
    assert!(session.has_finalized_best());

    let best = tuner.finalize(&session, &store).unwrap().unwrap();
    assert!(best.warning.is_none());
    assert!(session
        .registry()
        .entries()
        .iter()
        .any(|e| e.vector == best.vector));
    assert_eq!(store.load_best(session.id()).unwrap(), best.vector);
}
