//! Judgment submission
//!
//! [`submit_judgment`] is the only way callers mutate a session after
//! round 1. It validates the request against the session, then applies
//! the transition to a copy; an invalid request leaves the caller's
//! session untouched.
//!
//! [`Tuner`] bundles a configuration and a schedule policy for callers
//! that drive many sessions with the same settings.

use serde::{Deserialize, Serialize};

use crate::config::TuneConfig;
use crate::error::{ConfigError, JudgmentError, TuneResult};
use crate::estimate::{estimate_best, BestEstimate};
use crate::schedule::{Rubric, SchedulePolicy};
use crate::session::machine::apply_judgment;
use crate::session::{Judgment, NextAction, Round, Session, Transition};
use crate::store::BestParamsStore;

/// Judgment kind as submitted by a front-end
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentKind {
    /// One candidate was preferred
    Chosen,
    /// No clear preference
    Undecidable,
    /// Every candidate was unacceptable
    BothBad,
}

impl JudgmentKind {
    /// Kind name as stored
    pub fn name(&self) -> &'static str {
        match self {
            JudgmentKind::Chosen => "chosen",
            JudgmentKind::Undecidable => "undecidable",
            JudgmentKind::BothBad => "both_bad",
        }
    }
}

/// Unvalidated judgment fields
///
/// Front-ends fill in whatever the user supplied; [`submit_judgment`]
/// decides whether the combination is legal for `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JudgmentRequest {
    /// Judgment kind
    pub kind: JudgmentKind,
    /// Preferred slot for `chosen`
    #[serde(default)]
    pub winning_slot: Option<String>,
    /// Flagged rubric for `undecidable` and `both_bad`
    #[serde(default)]
    pub rubric: Option<Rubric>,
    /// Follow-up for `undecidable`
    #[serde(default)]
    pub next_action: Option<NextAction>,
    /// Forced choice for `undecidable` with `rejudge`
    #[serde(default)]
    pub chosen_slot: Option<String>,
    /// Box widening for reprints, 1.0 when absent
    #[serde(default)]
    pub delta_scale: Option<f64>,
}

impl JudgmentRequest {
    /// Request with no fields set
    pub fn new(kind: JudgmentKind) -> Self {
        Self {
            kind,
            winning_slot: None,
            rubric: None,
            next_action: None,
            chosen_slot: None,
            delta_scale: None,
        }
    }

    /// `chosen` with the preferred slot
    pub fn chosen(slot: impl Into<String>) -> Self {
        Self {
            winning_slot: Some(slot.into()),
            ..Self::new(JudgmentKind::Chosen)
        }
    }

    /// `undecidable` resolved by forcing a choice under `rubric`
    pub fn rejudge(rubric: Rubric, chosen_slot: impl Into<String>) -> Self {
        Self {
            rubric: Some(rubric),
            next_action: Some(NextAction::Rejudge),
            chosen_slot: Some(chosen_slot.into()),
            ..Self::new(JudgmentKind::Undecidable)
        }
    }

    /// `undecidable` followed by a wider reprint
    pub fn reprint(rubric: Rubric, delta_scale: f64) -> Self {
        Self {
            rubric: Some(rubric),
            next_action: Some(NextAction::Reprint),
            delta_scale: Some(delta_scale),
            ..Self::new(JudgmentKind::Undecidable)
        }
    }

    /// `both_bad` followed by a wider reprint
    pub fn both_bad(rubric: Rubric, delta_scale: f64) -> Self {
        Self {
            rubric: Some(rubric),
            delta_scale: Some(delta_scale),
            ..Self::new(JudgmentKind::BothBad)
        }
    }

    /// Check the fields against `round` and build the judgment to record
    pub fn validate(&self, round: &Round) -> Result<Judgment, JudgmentError> {
        let kind = self.kind.name();
        let timestamp = chrono::Utc::now();

        match self.kind {
            JudgmentKind::Chosen => {
                reject(kind, "rubric", self.rubric.is_some())?;
                reject(kind, "next_action", self.next_action.is_some())?;
                reject(kind, "chosen_slot", self.chosen_slot.is_some())?;
                reject(kind, "delta_scale", self.delta_scale.is_some())?;
                let slot = require(kind, "winning_slot", self.winning_slot.as_ref())?;
                check_slot(round, slot)?;
                Ok(Judgment::Chosen {
                    winning_slot: slot.clone(),
                    timestamp,
                })
            }
            JudgmentKind::Undecidable => {
                reject(kind, "winning_slot", self.winning_slot.is_some())?;
                let rubric = *require(kind, "rubric", self.rubric.as_ref())?;
                let next_action = *require(kind, "next_action", self.next_action.as_ref())?;
                match next_action {
                    NextAction::Rejudge => {
                        reject(kind, "delta_scale", self.delta_scale.is_some())?;
                        let slot = require(kind, "chosen_slot", self.chosen_slot.as_ref())?;
                        check_slot(round, slot)?;
                        Ok(Judgment::Undecidable {
                            rubric,
                            next_action,
                            chosen_slot: Some(slot.clone()),
                            delta_scale: 1.0,
                            rejudge_exhausted: false,
                            timestamp,
                        })
                    }
                    NextAction::Reprint => {
                        reject(kind, "chosen_slot", self.chosen_slot.is_some())?;
                        Ok(Judgment::Undecidable {
                            rubric,
                            next_action,
                            chosen_slot: None,
                            delta_scale: checked_delta_scale(self.delta_scale)?,
                            rejudge_exhausted: false,
                            timestamp,
                        })
                    }
                }
            }
            JudgmentKind::BothBad => {
                reject(kind, "winning_slot", self.winning_slot.is_some())?;
                reject(kind, "next_action", self.next_action.is_some())?;
                reject(kind, "chosen_slot", self.chosen_slot.is_some())?;
                let rubric = *require(kind, "rubric", self.rubric.as_ref())?;
                Ok(Judgment::BothBad {
                    rubric,
                    delta_scale: checked_delta_scale(self.delta_scale)?,
                    timestamp,
                })
            }
        }
    }
}

fn require<'a, T>(
    kind: &'static str,
    field: &'static str,
    value: Option<&'a T>,
) -> Result<&'a T, JudgmentError> {
    value.ok_or(JudgmentError::MissingField { kind, field })
}

fn reject(kind: &'static str, field: &'static str, present: bool) -> Result<(), JudgmentError> {
    if present {
        Err(JudgmentError::UnexpectedField { kind, field })
    } else {
        Ok(())
    }
}

fn check_slot(round: &Round, slot: &str) -> Result<(), JudgmentError> {
    match round.candidate(slot) {
        Some(_) => Ok(()),
        None => Err(JudgmentError::UnknownSlot {
            slot: slot.to_string(),
            round_index: round.round_index,
        }),
    }
}

fn checked_delta_scale(delta_scale: Option<f64>) -> Result<f64, JudgmentError> {
    let value = delta_scale.unwrap_or(1.0);
    if value.is_finite() && value >= 1.0 {
        Ok(value)
    } else {
        Err(JudgmentError::InvalidDeltaScale(value))
    }
}

/// Locate the round a judgment targets and check it is still open
fn open_round(session: &Session, round_index: usize) -> Result<&Round, JudgmentError> {
    if session.round_count() == 0 {
        return Err(JudgmentError::NoRounds);
    }
    let round = session
        .round(round_index)
        .ok_or(JudgmentError::UnknownRound {
            round_index,
            round_count: session.round_count(),
        })?;
    if round.is_judged() {
        return Err(JudgmentError::RoundAlreadyJudged(round_index));
    }
    Ok(round)
}

/// Start a session and create its initial round
pub fn new_session(reference_image: impl Into<String>, policy: &dyn SchedulePolicy) -> Session {
    let mut session = Session::new(reference_image);
    session.create_initial_round(policy);
    tracing::info!(session = %session.id(), "session created");
    session
}

/// Validate and apply a judgment, returning the updated session
///
/// On error the input session is unchanged. A rejudge past the budget is
/// recorded as a reprint, and at the round cap only the judgment is
/// recorded; neither is an error.
pub fn submit_judgment(
    session: &Session,
    round_index: usize,
    request: &JudgmentRequest,
    config: &TuneConfig,
    policy: &dyn SchedulePolicy,
) -> Result<Session, JudgmentError> {
    submit(session, round_index, request, config, policy).map(|(session, _)| session)
}

fn submit(
    session: &Session,
    round_index: usize,
    request: &JudgmentRequest,
    config: &TuneConfig,
    policy: &dyn SchedulePolicy,
) -> Result<(Session, Transition), JudgmentError> {
    let judgment = open_round(session, round_index).and_then(|round| request.validate(round));
    let judgment = match judgment {
        Ok(judgment) => judgment,
        Err(e) => {
            tracing::debug!(session = %session.id(), round_index, error = %e, "judgment rejected");
            return Err(e);
        }
    };

    let mut next = session.clone();
    let transition = apply_judgment(&mut next, round_index, judgment, config, policy);
    Ok((next, transition))
}

/// Outcome of [`Tuner::submit_judgment`]
#[derive(Clone, Debug)]
pub struct JudgmentOutcome {
    /// Updated session
    pub session: Session,
    /// What the judgment changed
    pub transition: Transition,
    /// Best estimate after the judgment
    pub best: Option<BestEstimate>,
}

/// Session driver with a fixed configuration and schedule policy
///
/// # Example
///
/// ```rust,ignore
/// let tuner = Tuner::builder().max_rounds(8).build()?;
/// let session = tuner.new_session("portrait.tif");
/// let outcome = tuner.submit_judgment(&session, 1, &JudgmentRequest::chosen("B"))?;
/// ```
pub struct Tuner {
    config: TuneConfig,
    policy: Box<dyn SchedulePolicy>,
}

impl Tuner {
    /// Create a tuner that schedules with the configured phase table
    pub fn new(config: TuneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = Box::new(config.schedule.clone());
        Ok(Self { config, policy })
    }

    /// Start building a tuner
    pub fn builder() -> TunerBuilder {
        TunerBuilder::new()
    }

    /// Active configuration
    pub fn config(&self) -> &TuneConfig {
        &self.config
    }

    /// Active schedule policy
    pub fn policy(&self) -> &dyn SchedulePolicy {
        self.policy.as_ref()
    }

    /// Start a session with its initial round
    pub fn new_session(&self, reference_image: impl Into<String>) -> Session {
        new_session(reference_image, self.policy())
    }

    /// Validate and apply a judgment
    pub fn submit_judgment(
        &self,
        session: &Session,
        round_index: usize,
        request: &JudgmentRequest,
    ) -> Result<JudgmentOutcome, JudgmentError> {
        let (session, transition) =
            submit(session, round_index, request, &self.config, self.policy())?;
        let best = estimate_best(&session, &self.config.model);
        Ok(JudgmentOutcome {
            session,
            transition,
            best,
        })
    }

    /// Best parameters seen so far
    pub fn estimate_best(&self, session: &Session) -> Option<BestEstimate> {
        estimate_best(session, &self.config.model)
    }

    /// Estimate and persist the best parameters
    ///
    /// Saves nothing and returns `None` until a `chosen` judgment has been
    /// recorded.
    pub fn finalize<S>(&self, session: &Session, store: &S) -> TuneResult<Option<BestEstimate>>
    where
        S: BestParamsStore + ?Sized,
    {
        if !session.has_finalized_best() {
            tracing::info!(session = %session.id(), "no chosen judgment yet; nothing to finalize");
            return Ok(None);
        }
        let best = match self.estimate_best(session) {
            Some(best) => best,
            None => return Ok(None),
        };
        store.save_best(session.id(), &best.vector)?;
        tracing::info!(
            session = %session.id(),
            source = ?best.source,
            "best parameters finalized"
        );
        Ok(Some(best))
    }
}

impl std::fmt::Debug for Tuner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tuner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Tuner`]
pub struct TunerBuilder {
    config: TuneConfig,
    policy: Option<Box<dyn SchedulePolicy>>,
}

impl TunerBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            config: TuneConfig::default(),
            policy: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: TuneConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the round cap
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.config.max_rounds = max_rounds;
        self
    }

    /// Set the rejudge budget
    pub fn max_rejudge(mut self, max_rejudge: usize) -> Self {
        self.config.max_rejudge = max_rejudge;
        self
    }

    /// Set the base seed for proposals
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.proposal.seed = seed;
        self
    }

    /// Use a custom schedule policy instead of the configured phase table
    pub fn schedule_policy<P>(mut self, policy: P) -> Self
    where
        P: SchedulePolicy + 'static,
    {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Validate the configuration and build the tuner
    pub fn build(self) -> Result<Tuner, ConfigError> {
        self.config.validate()?;
        let policy = match self.policy {
            Some(policy) => policy,
            None => Box::new(self.config.schedule.clone()),
        };
        Ok(Tuner {
            config: self.config,
            policy,
        })
    }
}

impl Default for TunerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{AxisSchedule, PhaseTable};
    use crate::space::Axis;
    use crate::store::FileStore;

    fn tuner() -> Tuner {
        let mut config = TuneConfig::default();
        config.proposal.num_restarts = 3;
        config.proposal.raw_samples = 16;
        config.proposal.local_iterations = 10;
        Tuner::new(config).unwrap()
    }

    fn try_submit(session: &Session, request: &JudgmentRequest) -> Result<Session, JudgmentError> {
        submit_judgment(session, 1, request, &TuneConfig::default(), &PhaseTable::default())
    }

    #[test]
    fn test_request_constructors() {
        let r = JudgmentRequest::rejudge(Rubric::Skin, "A");
        assert_eq!(r.kind, JudgmentKind::Undecidable);
        assert_eq!(r.next_action, Some(NextAction::Rejudge));
        assert_eq!(r.chosen_slot.as_deref(), Some("A"));

        let r = JudgmentRequest::both_bad(Rubric::Highlights, 1.5);
        assert_eq!(r.delta_scale, Some(1.5));
        assert!(r.next_action.is_none());
    }

    #[test]
    fn test_missing_fields() {
        let session = tuner().new_session("ref.png");

        let mut request = JudgmentRequest::new(JudgmentKind::Chosen);
        let err = try_submit(&session, &request).unwrap_err();
        assert_eq!(
            err,
            JudgmentError::MissingField {
                kind: "chosen",
                field: "winning_slot"
            }
        );

        request = JudgmentRequest::new(JudgmentKind::Undecidable);
        request.rubric = Some(Rubric::Overall);
        let err = try_submit(&session, &request).unwrap_err();
        assert_eq!(
            err,
            JudgmentError::MissingField {
                kind: "undecidable",
                field: "next_action"
            }
        );

        request.next_action = Some(NextAction::Rejudge);
        let err = try_submit(&session, &request).unwrap_err();
        assert_eq!(
            err,
            JudgmentError::MissingField {
                kind: "undecidable",
                field: "chosen_slot"
            }
        );

        let request = JudgmentRequest::new(JudgmentKind::BothBad);
        let err = try_submit(&session, &request).unwrap_err();
        assert_eq!(
            err,
            JudgmentError::MissingField {
                kind: "both_bad",
                field: "rubric"
            }
        );
    }

    #[test]
    fn test_unexpected_fields() {
        let session = tuner().new_session("ref.png");
        let mut request = JudgmentRequest::reprint(Rubric::Shadows, 2.0);
        request.chosen_slot = Some("A".to_string());
        let err = try_submit(&session, &request).unwrap_err();
        assert_eq!(
            err,
            JudgmentError::UnexpectedField {
                kind: "undecidable",
                field: "chosen_slot"
            }
        );

        let mut request = JudgmentRequest::chosen("A");
        request.rubric = Some(Rubric::Skin);
        assert!(matches!(
            try_submit(&session, &request),
            Err(JudgmentError::UnexpectedField { field: "rubric", .. })
        ));
    }

    #[test]
    fn test_invalid_targets() {
        let tuner = tuner();
        let empty = Session::new("ref.png");
        assert_eq!(
            tuner
                .submit_judgment(&empty, 1, &JudgmentRequest::chosen("A"))
                .unwrap_err(),
            JudgmentError::NoRounds
        );

        let session = tuner.new_session("ref.png");
        assert_eq!(
            tuner
                .submit_judgment(&session, 2, &JudgmentRequest::chosen("A"))
                .unwrap_err(),
            JudgmentError::UnknownRound {
                round_index: 2,
                round_count: 1
            }
        );
        assert!(matches!(
            tuner.submit_judgment(&session, 0, &JudgmentRequest::chosen("A")),
            Err(JudgmentError::UnknownRound { .. })
        ));
        assert_eq!(
            tuner
                .submit_judgment(&session, 1, &JudgmentRequest::chosen("E"))
                .unwrap_err(),
            JudgmentError::UnknownSlot {
                slot: "E".to_string(),
                round_index: 1
            }
        );
        assert_eq!(
            tuner
                .submit_judgment(&session, 1, &JudgmentRequest::both_bad(Rubric::Overall, 0.5))
                .unwrap_err(),
            JudgmentError::InvalidDeltaScale(0.5)
        );
        assert!(matches!(
            tuner.submit_judgment(&session, 1, &JudgmentRequest::reprint(Rubric::Overall, f64::NAN)),
            Err(JudgmentError::InvalidDeltaScale(_))
        ));
    }

    #[test]
    fn test_rejected_request_leaves_session_unchanged() {
        let tuner = tuner();
        let session = tuner.new_session("ref.png");
        let before = session.clone();
        let _ = tuner.submit_judgment(&session, 1, &JudgmentRequest::chosen("Z"));
        assert_eq!(session, before);
    }

    #[test]
    fn test_already_judged_round() {
        let tuner = tuner();
        let session = tuner.new_session("ref.png");
        let outcome = tuner
            .submit_judgment(&session, 1, &JudgmentRequest::chosen("B"))
            .unwrap();
        assert_eq!(
            tuner
                .submit_judgment(&outcome.session, 1, &JudgmentRequest::chosen("A"))
                .unwrap_err(),
            JudgmentError::RoundAlreadyJudged(1)
        );
    }

    #[test]
    fn test_outcome_reports_transition_and_best() {
        let tuner = tuner();
        let session = tuner.new_session("ref.png");
        let outcome = tuner
            .submit_judgment(&session, 1, &JudgmentRequest::chosen("B"))
            .unwrap();
        assert_eq!(outcome.transition.new_comparisons, 3);
        assert_eq!(outcome.transition.next_round, Some(2));
        assert!(outcome.best.is_some());
        assert_eq!(session.round_count(), 1);
        assert_eq!(outcome.session.round_count(), 2);
    }

    #[test]
    fn test_builder_custom_policy() {
        struct TintOnly;

        impl SchedulePolicy for TintOnly {
            fn schedule(&self, phase: usize, _rubric: Option<Rubric>) -> AxisSchedule {
                AxisSchedule {
                    phase,
                    active_axes: vec![Axis::Tint],
                    delta: 0.4,
                    micro_ratio: 0.1,
                }
            }
        }

        let tuner = Tuner::builder()
            .max_rounds(3)
            .seed(11)
            .schedule_policy(TintOnly)
            .build()
            .unwrap();
        assert_eq!(tuner.config().max_rounds, 3);
        let session = tuner.new_session("ref.png");
        assert_eq!(session.rounds()[0].metadata.schedule.active_axes, vec![Axis::Tint]);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        assert!(Tuner::builder().max_rounds(0).build().is_err());
    }

    #[test]
    fn test_finalize() {
        let tuner = tuner();
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let session = tuner.new_session("ref.png");
        assert!(tuner.finalize(&session, &store).unwrap().is_none());

        let session = tuner
            .submit_judgment(&session, 1, &JudgmentRequest::chosen("C"))
            .unwrap()
            .session;
        let best = tuner.finalize(&session, &store).unwrap().unwrap();
        assert_eq!(store.load_best(session.id()).unwrap(), best.vector);
    }
}
