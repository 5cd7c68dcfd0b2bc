//! Aggregate root for the Turn Resolution context.
//!
//! A `Game` owns its roster, the current round and at most one open action.
//! Every command method validates first and records events only once the
//! whole transition is known to succeed; recorded events are applied
//! immediately so later steps of the same command see the new state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use storyloom_core::aggregate::AggregateRoot;
use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::event::EventMetadata;
use storyloom_core::rng::DeterministicRng;
use uuid::Uuid;

use super::arguments::{Argument, ArgumentLedger, ArgumentType};
use super::commands::{JoinTarget, PersonaSpec};
use super::events::{
    ActionProposed, ArbiterDesignated, ArbiterReviewCompleted, ArgumentAdded,
    ArgumentStrengthToggled, ArgumentationClosed, ArgumentationMarkedComplete, GameEvent,
    GameEventKind, GameStarted, Narration, NarrationEdited, NarrationSubmitted,
    PersonaLeadChanged, PlayerJoined, ProposalsSkipped, RoundCompleted, RoundStarted,
    RoundSummaryWritten, TokensDrawn, VoteCast, VotingClosed,
};
use super::momentum::NpcMomentum;
use super::personas::{Persona, Roster, SharedPersonaCoordinator, Voice};
use super::phase::{GamePhase, phase_name};
use super::settings::{GameSettings, ResolutionMethod};
use super::strategy::{Evidence, ResolutionStrategy, strategy_for};
use super::token_pool::{TokenDraw, TokenPool};
use super::votes::{Vote, VoteTally, VoteType};

/// Whether a round is still collecting actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    InProgress,
    Completed,
}

/// One cycle in which every persona of the round completes an action.
#[derive(Debug, Clone)]
pub struct Round {
    pub(crate) round_id: Uuid,
    pub(crate) round_number: u32,
    pub(crate) actions_completed: u32,
    pub(crate) total_actions_required: u32,
    pub(crate) status: RoundStatus,
    /// Roster as it stood when the round started.
    pub(crate) roster: Roster,
    pub(crate) proposed_personas: Vec<Uuid>,
    pub(crate) proposals_skipped: bool,
    pub(crate) summary: Option<String>,
}

/// One persona's proposed deed and everything gathered on it.
#[derive(Debug, Clone)]
pub struct Action {
    pub(crate) action_id: Uuid,
    pub(crate) round_id: Uuid,
    pub(crate) sequence_number: u32,
    pub(crate) initiator_id: Uuid,
    pub(crate) persona_id: Uuid,
    pub(crate) initiated_by_npc: bool,
    pub(crate) description: String,
    pub(crate) desired_outcome: String,
    pub(crate) argumentation_was_skipped: bool,
    pub(crate) voting_was_skipped: bool,
    pub(crate) ledger: ArgumentLedger,
    pub(crate) tally: VoteTally,
    pub(crate) token_draw: Option<TokenDraw>,
    pub(crate) narration: Option<Narration>,
}

/// Inputs received against inputs required to close a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub received: usize,
    pub required: usize,
}

impl Progress {
    #[must_use]
    pub fn is_complete(self) -> bool {
        self.received >= self.required
    }

    #[must_use]
    pub fn remaining(self) -> usize {
        self.required.saturating_sub(self.received)
    }
}

/// What a command did to the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// The phase the game is in after the command.
    pub phase: Option<GamePhase>,
    /// The open action, if any.
    pub action_id: Option<Uuid>,
    /// Set while argumentation or voting is still waiting for inputs.
    pub waiting: Option<Progress>,
    /// The draw, for commands that drew or looked one up.
    pub token_draw: Option<TokenDraw>,
    /// The new strength flag, for argument reviews.
    pub is_strong: Option<bool>,
}

/// The aggregate root for a game; its phase machine drives every round.
#[derive(Debug)]
pub struct Game {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count, uncommitted events included).
    pub(crate) version: i64,
    pub(crate) host_id: Uuid,
    pub(crate) settings: GameSettings,
    /// Roster as it stands now; joins land here first.
    pub(crate) roster: Roster,
    pub(crate) arbiter_id: Option<Uuid>,
    /// `None` until the game starts.
    pub(crate) phase: Option<GamePhase>,
    pub(crate) phase_started_at: Option<DateTime<Utc>>,
    pub(crate) npc_momentum: NpcMomentum,
    pub(crate) current_round: Option<Round>,
    pub(crate) completed_rounds: Vec<Round>,
    pub(crate) current_action: Option<Action>,
    pub(crate) completed_actions: Vec<Action>,
    /// Set by `apply` when an event does not fit the state it lands on.
    invariant_breach: Option<String>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<GameEvent>,
}

impl Game {
    /// Creates an empty, not yet started game.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            host_id: Uuid::nil(),
            settings: GameSettings::default(),
            roster: Roster::default(),
            arbiter_id: None,
            phase: None,
            phase_started_at: None,
            npc_momentum: NpcMomentum::default(),
            current_round: None,
            completed_rounds: Vec::new(),
            current_action: None,
            completed_actions: Vec::new(),
            invariant_breach: None,
            uncommitted_events: Vec::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Option<GamePhase> {
        self.phase
    }

    #[must_use]
    pub fn current_action_id(&self) -> Option<Uuid> {
        self.current_action.as_ref().map(|a| a.action_id)
    }

    #[must_use]
    pub fn current_round_id(&self) -> Option<Uuid> {
        self.current_round.as_ref().map(|r| r.round_id)
    }

    #[must_use]
    pub fn npc_momentum(&self) -> i64 {
        self.npc_momentum.value()
    }

    /// Checks the structural invariants of the game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvariantViolation` if an event was applied to
    /// a state it did not fit, if the open action does not match the phase,
    /// or if a round has completed more actions than it requires.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if let Some(breach) = &self.invariant_breach {
            return Err(DomainError::InvariantViolation(breach.clone()));
        }
        let Some(phase) = self.phase else {
            if self.current_action.is_some() {
                return Err(DomainError::InvariantViolation(
                    "an action is open before the game started".to_owned(),
                ));
            }
            return Ok(());
        };
        if phase.has_open_action() != self.current_action.is_some() {
            return Err(DomainError::InvariantViolation(format!(
                "phase {phase} {} an open action",
                if phase.has_open_action() { "requires" } else { "forbids" }
            )));
        }
        match &self.current_round {
            None => Err(DomainError::InvariantViolation(
                "a started game has no current round".to_owned(),
            )),
            Some(round) if round.actions_completed > round.total_actions_required => {
                Err(DomainError::InvariantViolation(format!(
                    "round {} completed {} of {} actions",
                    round.round_number, round.actions_completed, round.total_actions_required
                )))
            }
            Some(_) => Ok(()),
        }
    }

    // --- administrative commands ---

    /// Starts the game and its first round.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the game already started, the
    /// settings are invalid, or the personas break the line-up rules.
    pub fn start(
        &mut self,
        host_id: Uuid,
        settings: GameSettings,
        personas: Vec<PersonaSpec>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        if self.phase.is_some() || self.version > 0 {
            return Err(DomainError::Validation("game has already started".to_owned()));
        }
        settings.validate()?;

        let personas: Vec<Persona> = personas
            .into_iter()
            .map(|spec| Persona {
                persona_id: Uuid::new_v4(),
                lead_player_id: spec
                    .lead_player_id
                    .or_else(|| spec.member_ids.first().copied())
                    .unwrap_or_default(),
                name: spec.name.trim().to_owned(),
                is_npc: spec.is_npc,
                member_ids: spec.member_ids,
            })
            .collect();
        Roster::new(personas.clone()).validate(&settings.shared_personas)?;

        self.record(
            GameEventKind::GameStarted(GameStarted {
                game_id: self.id,
                host_id,
                settings,
                personas,
            }),
            correlation_id,
            clock,
        );
        self.start_round(1, correlation_id, clock);
        Ok(self.outcome())
    }

    /// Adds a player to the roster from the next round on.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` before the game starts and
    /// `DomainError::Validation` if the player already plays a persona or
    /// the target persona cannot be joined.
    pub fn join(
        &mut self,
        player_id: Uuid,
        target: JoinTarget,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.require_started("game.join")?;
        if let Some(persona) = self.roster.player_persona(player_id) {
            return Err(DomainError::Validation(format!(
                "player already plays persona {}",
                persona.name
            )));
        }

        let joined = match target {
            JoinTarget::ExistingPersona { persona_id } => {
                let persona = self.roster.persona(persona_id).ok_or_else(|| {
                    DomainError::Validation(format!("persona {persona_id} not found"))
                })?;
                if persona.is_npc {
                    return Err(DomainError::Validation(
                        "the NPC persona cannot be joined".to_owned(),
                    ));
                }
                if !self.settings.shared_personas.allow_shared_personas {
                    return Err(DomainError::Validation(
                        "shared personas are disabled for this game".to_owned(),
                    ));
                }
                PlayerJoined {
                    player_id,
                    persona_id,
                    new_persona_name: None,
                }
            }
            JoinTarget::NewPersona { name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(DomainError::Validation(
                        "persona name must not be empty".to_owned(),
                    ));
                }
                PlayerJoined {
                    player_id,
                    persona_id: Uuid::new_v4(),
                    new_persona_name: Some(name.to_owned()),
                }
            }
        };

        self.record(GameEventKind::PlayerJoined(joined), correlation_id, clock);
        Ok(self.outcome())
    }

    /// Designates the arbiter, or clears it with `None`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` unless the actor is the host.
    pub fn designate_arbiter(
        &mut self,
        actor_id: Uuid,
        arbiter_id: Option<Uuid>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.require_host(actor_id, "designate the arbiter")?;
        self.record(
            GameEventKind::ArbiterDesignated(ArbiterDesignated { arbiter_id }),
            correlation_id,
            clock,
        );
        Ok(self.outcome())
    }

    /// Changes a persona's lead, in the roster and the current round.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` unless the actor is the host and
    /// `DomainError::Validation` if the persona is unknown or the new lead
    /// is not a member.
    pub fn set_persona_lead(
        &mut self,
        actor_id: Uuid,
        persona_id: Uuid,
        lead_player_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.require_host(actor_id, "change a persona lead")?;
        let persona = self
            .roster
            .persona(persona_id)
            .ok_or_else(|| DomainError::Validation(format!("persona {persona_id} not found")))?;
        if !persona.is_member(lead_player_id) {
            return Err(DomainError::Validation(format!(
                "player {lead_player_id} is not a member of persona {}",
                persona.name
            )));
        }
        self.record(
            GameEventKind::PersonaLeadChanged(PersonaLeadChanged {
                persona_id,
                lead_player_id,
            }),
            correlation_id,
            clock,
        );
        Ok(self.outcome())
    }

    // --- proposal ---

    /// Opens an action for the persona and attaches the opening argument.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside the proposal phase,
    /// `DomainError::NotEligible` if the actor does not lead a persona of
    /// the round or the NPC persona proposes before every player persona,
    /// `DomainError::AlreadyActed` if the persona already proposed this
    /// round, and `DomainError::Validation` for an empty description.
    #[allow(clippy::too_many_arguments)]
    pub fn propose_action(
        &mut self,
        actor_id: Uuid,
        persona_id: Uuid,
        description: &str,
        desired_outcome: &str,
        opening_argument: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        let command = "game.propose_action";
        if self.phase != Some(GamePhase::Proposal) {
            return Err(self.phase_violation(command));
        }
        if self.current_action.is_some() {
            return Err(DomainError::InvariantViolation(
                "an action is already open".to_owned(),
            ));
        }

        let round = self.round()?;
        let persona = round.roster.persona(persona_id).ok_or_else(|| DomainError::NotEligible {
            actor_id,
            reason: "persona is not taking part in the current round".to_owned(),
        })?;
        if !persona.is_lead(actor_id) {
            return Err(DomainError::NotEligible {
                actor_id,
                reason: "only the persona lead proposes".to_owned(),
            });
        }
        if round.proposed_personas.contains(&persona_id) {
            return Err(DomainError::AlreadyActed {
                actor_id,
                phase: GamePhase::Proposal.to_string(),
            });
        }
        if persona.is_npc
            && round
                .roster
                .player_personas()
                .any(|p| !round.proposed_personas.contains(&p.persona_id))
        {
            return Err(DomainError::NotEligible {
                actor_id,
                reason: "the NPC persona proposes after every player persona".to_owned(),
            });
        }
        if description.trim().is_empty() {
            return Err(DomainError::Validation(
                "action description must not be empty".to_owned(),
            ));
        }
        if opening_argument.trim().is_empty() {
            return Err(DomainError::Validation(
                "opening argument must not be empty".to_owned(),
            ));
        }

        #[allow(clippy::cast_possible_truncation)]
        let sequence_number = round.proposed_personas.len() as u32 + 1;
        let proposed = ActionProposed {
            action_id: Uuid::new_v4(),
            round_id: round.round_id,
            sequence_number,
            initiator_id: actor_id,
            persona_id,
            description: description.trim().to_owned(),
            desired_outcome: desired_outcome.trim().to_owned(),
            opening_argument: Argument {
                argument_id: Uuid::new_v4(),
                player_id: actor_id,
                persona_id,
                argument_type: ArgumentType::InitiatorFor,
                content: opening_argument.trim().to_owned(),
                sequence: 1,
                is_strong: false,
            },
        };

        self.record(GameEventKind::ActionProposed(proposed), correlation_id, clock);
        self.close_argumentation_if_complete(correlation_id, clock)?;
        Ok(self.outcome())
    }

    /// Ends the round's proposals early.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` unless the actor is the host,
    /// `DomainError::AlreadyAdvanced` if the round already completed,
    /// and `DomainError::PhaseViolation` while an action is open or before
    /// anything was proposed this round.
    pub fn skip_proposals(
        &mut self,
        actor_id: Uuid,
        round_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        let command = "game.skip_proposals";
        self.require_host(actor_id, "skip proposals")?;
        let round = self.round()?;
        if round.round_id != round_id {
            if self.completed_rounds.iter().any(|r| r.round_id == round_id) {
                return Err(self.already_advanced(command));
            }
            return Err(DomainError::Validation(format!("round {round_id} not found")));
        }
        match self.phase {
            Some(GamePhase::Proposal) => {}
            Some(GamePhase::RoundSummary) => return Err(self.already_advanced(command)),
            _ => return Err(self.phase_violation(command)),
        }
        if round.proposed_personas.is_empty() {
            return Err(self.phase_violation(command));
        }
        let round_number = round.round_number;

        self.record(
            GameEventKind::ProposalsSkipped(ProposalsSkipped { round_id }),
            correlation_id,
            clock,
        );
        self.record(
            GameEventKind::RoundCompleted(RoundCompleted {
                round_id,
                round_number,
            }),
            correlation_id,
            clock,
        );
        Ok(self.outcome())
    }

    // --- argumentation ---

    /// Adds an argument to the open action.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside argumentation,
    /// `DomainError::Validation` for an `INITIATOR_FOR` or empty argument,
    /// `DomainError::NotEligible` for non-participants,
    /// `DomainError::AlreadyActed` after the arguer marked completion, and
    /// `DomainError::LimitExceeded` once the quota is used up.
    pub fn add_argument(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        argument_type: ArgumentType,
        content: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.expect_action_phase("game.add_argument", action_id, GamePhase::Argumentation)?;
        if argument_type == ArgumentType::InitiatorFor {
            return Err(DomainError::Validation(
                "INITIATOR_FOR arguments are attached at proposal time".to_owned(),
            ));
        }
        if content.trim().is_empty() {
            return Err(DomainError::Validation(
                "argument content must not be empty".to_owned(),
            ));
        }

        let argument = {
            let action = self.open_action()?;
            let round = self.round()?;
            let coordinator = self.coordinator(round);
            let not_participant = || DomainError::NotEligible {
                actor_id,
                reason: "not a participant in the current round".to_owned(),
            };
            let quota = coordinator.quota_for(actor_id).ok_or_else(not_participant)?;
            let persona_id = round
                .roster
                .voice_of(actor_id)
                .map(|p| p.persona_id)
                .ok_or_else(not_participant)?;

            let voices = coordinator.arguer_voices(action.initiator_id, action.persona_id);
            if has_finished_arguing(&action.ledger, &voices, actor_id) {
                return Err(DomainError::AlreadyActed {
                    actor_id,
                    phase: GamePhase::Argumentation.to_string(),
                });
            }
            action
                .ledger
                .check_limit(actor_id, quota, self.settings.argument_limit)?;

            Argument {
                argument_id: Uuid::new_v4(),
                player_id: actor_id,
                persona_id,
                argument_type,
                content: content.trim().to_owned(),
                sequence: action.ledger.next_sequence(),
                is_strong: false,
            }
        };

        self.record(
            GameEventKind::ArgumentAdded(ArgumentAdded {
                action_id,
                argument,
            }),
            correlation_id,
            clock,
        );
        Ok(self.outcome())
    }

    /// Records that the actor has finished arguing; closes argumentation
    /// once every arguer has.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside argumentation,
    /// `DomainError::NotEligible` for players who are not arguers on this
    /// action, and `DomainError::AlreadyActed` for a repeated signal or for
    /// the initiating persona, which is complete from the start.
    pub fn complete_argumentation(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.expect_action_phase(
            "game.complete_argumentation",
            action_id,
            GamePhase::Argumentation,
        )?;
        {
            let action = self.open_action()?;
            let round = self.round()?;
            if !round.roster.is_participant(actor_id) {
                return Err(DomainError::NotEligible {
                    actor_id,
                    reason: "not a participant in the current round".to_owned(),
                });
            }
            let already_acted = DomainError::AlreadyActed {
                actor_id,
                phase: GamePhase::Argumentation.to_string(),
            };
            let in_initiating_persona = round
                .roster
                .persona(action.persona_id)
                .is_some_and(|p| p.is_member(actor_id));
            if actor_id == action.initiator_id || in_initiating_persona {
                return Err(already_acted);
            }
            let voices = self
                .coordinator(round)
                .arguer_voices(action.initiator_id, action.persona_id);
            let voice = voices
                .iter()
                .find(|v| v.members.contains(&actor_id))
                .ok_or_else(|| DomainError::NotEligible {
                    actor_id,
                    reason: "not an arguer on this action".to_owned(),
                })?;
            if action.ledger.is_voice_complete(voice) {
                return Err(already_acted);
            }
        }

        self.record(
            GameEventKind::ArgumentationMarkedComplete(ArgumentationMarkedComplete {
                action_id,
                player_id: actor_id,
            }),
            correlation_id,
            clock,
        );
        self.close_argumentation_if_complete(correlation_id, clock)?;
        Ok(self.outcome())
    }

    /// Closes argumentation without waiting for every arguer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` unless the actor is the host,
    /// `DomainError::AlreadyAdvanced` if the action already left
    /// argumentation, and `DomainError::PhaseViolation` otherwise.
    pub fn skip_argumentation(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.require_host(actor_id, "skip argumentation")?;
        self.check_skip("game.skip_argumentation", action_id, GamePhase::Argumentation)?;
        let next_phase = self.next_phase(GamePhase::Argumentation)?;

        self.record(
            GameEventKind::ArgumentationClosed(ArgumentationClosed {
                action_id,
                skipped: true,
                next_phase,
            }),
            correlation_id,
            clock,
        );
        self.close_voting_if_complete(false, correlation_id, clock)?;
        Ok(self.outcome())
    }

    // --- arbiter review ---

    /// Toggles whether a FOR or AGAINST argument is strong.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside arbiter review,
    /// `DomainError::NotEligible` unless the actor is the arbiter, and
    /// `DomainError::Validation` for unknown or unmarkable arguments.
    pub fn review_argument(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        argument_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.expect_action_phase("game.review_argument", action_id, GamePhase::ArbiterReview)?;
        self.require_arbiter(actor_id)?;
        let argument = self
            .open_action()?
            .ledger
            .argument(argument_id)
            .ok_or_else(|| DomainError::Validation(format!("argument {argument_id} not found")))?;
        if !argument.argument_type.can_be_strong() {
            return Err(DomainError::Validation(
                "only FOR and AGAINST arguments can be marked strong".to_owned(),
            ));
        }
        let is_strong = !argument.is_strong;

        self.record(
            GameEventKind::ArgumentStrengthToggled(ArgumentStrengthToggled {
                action_id,
                argument_id,
                is_strong,
            }),
            correlation_id,
            clock,
        );
        Ok(TurnOutcome {
            is_strong: Some(is_strong),
            ..self.outcome()
        })
    }

    /// Ends the arbiter's review. When the review leads straight to
    /// resolution the arbiter's draw happens in the same command.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside arbiter review and
    /// `DomainError::NotEligible` unless the actor is the arbiter.
    pub fn complete_arbiter_review(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
    ) -> Result<TurnOutcome, DomainError> {
        self.expect_action_phase(
            "game.complete_arbiter_review",
            action_id,
            GamePhase::ArbiterReview,
        )?;
        self.require_arbiter(actor_id)?;
        let next_phase = self.next_phase(GamePhase::ArbiterReview)?;

        if next_phase == GamePhase::Resolution {
            let (draw, momentum_delta) = self.prepare_draw(actor_id, clock, rng)?;
            self.record(
                GameEventKind::ArbiterReviewCompleted(ArbiterReviewCompleted {
                    action_id,
                    next_phase,
                }),
                correlation_id,
                clock,
            );
            self.record(
                GameEventKind::TokensDrawn(TokensDrawn {
                    action_id,
                    draw: draw.clone(),
                    momentum_delta,
                }),
                correlation_id,
                clock,
            );
            return Ok(TurnOutcome {
                token_draw: Some(draw),
                ..self.outcome()
            });
        }

        self.record(
            GameEventKind::ArbiterReviewCompleted(ArbiterReviewCompleted {
                action_id,
                next_phase,
            }),
            correlation_id,
            clock,
        );
        self.close_voting_if_complete(false, correlation_id, clock)?;
        Ok(self.outcome())
    }

    // --- voting ---

    /// Records the actor's vote; closes voting once every voter has voted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside voting,
    /// `DomainError::NotEligible` for players who may not vote on this
    /// action, and `DomainError::DuplicateVote` for a second vote.
    pub fn cast_vote(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        vote_type: VoteType,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.expect_action_phase("game.cast_vote", action_id, GamePhase::Voting)?;
        {
            let action = self.open_action()?;
            let round = self.round()?;
            self.coordinator(round)
                .check_voter(actor_id, action.initiator_id, action.persona_id)?;
            action.tally.check_can_vote(action_id, actor_id)?;
        }

        self.record(
            GameEventKind::VoteCast(VoteCast {
                action_id,
                vote: Vote {
                    voter_id: actor_id,
                    vote_type,
                    was_auto_filled: false,
                },
            }),
            correlation_id,
            clock,
        );
        self.close_voting_if_complete(false, correlation_id, clock)?;
        Ok(self.outcome())
    }

    /// Fills every missing vote with UNCERTAIN and closes voting.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` unless the actor is the host,
    /// `DomainError::AlreadyAdvanced` if the action already left voting,
    /// and `DomainError::PhaseViolation` otherwise.
    pub fn skip_voting(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.require_host(actor_id, "skip voting")?;
        self.check_skip("game.skip_voting", action_id, GamePhase::Voting)?;
        let missing = {
            let action = self.open_action()?;
            let voters = self.voters(action)?;
            action.tally.missing_voters(&voters)
        };

        for voter_id in missing {
            self.record(
                GameEventKind::VoteCast(VoteCast {
                    action_id,
                    vote: Vote {
                        voter_id,
                        vote_type: VoteType::Uncertain,
                        was_auto_filled: true,
                    },
                }),
                correlation_id,
                clock,
            );
        }
        self.close_voting_if_complete(true, correlation_id, clock)?;
        Ok(self.outcome())
    }

    // --- resolution and narration ---

    /// Draws three tokens for the action. A repeated draw returns the
    /// recorded result without touching the RNG.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside resolution,
    /// `DomainError::NotEligible` for anyone but the strategy's drawer, and
    /// `DomainError::Validation` if the pool holds fewer than three tokens.
    pub fn draw_tokens(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
    ) -> Result<TurnOutcome, DomainError> {
        if let Some(draw) = self.find_action(action_id).and_then(|a| a.token_draw.clone()) {
            return Ok(TurnOutcome {
                token_draw: Some(draw),
                ..self.outcome()
            });
        }
        self.expect_action_phase("game.draw_tokens", action_id, GamePhase::Resolution)?;
        let initiator_id = self.open_action()?.initiator_id;
        if !self
            .strategy()
            .may_draw(actor_id, initiator_id, self.arbiter_id)
        {
            return Err(DomainError::NotEligible {
                actor_id,
                reason: match self.strategy().method() {
                    ResolutionMethod::TokenDraw => "only the initiator draws tokens",
                    ResolutionMethod::Arbiter => "only the arbiter draws tokens",
                }
                .to_owned(),
            });
        }
        let (draw, momentum_delta) = self.prepare_draw(actor_id, clock, rng)?;

        self.record(
            GameEventKind::TokensDrawn(TokensDrawn {
                action_id,
                draw: draw.clone(),
                momentum_delta,
            }),
            correlation_id,
            clock,
        );
        Ok(TurnOutcome {
            token_draw: Some(draw),
            ..self.outcome()
        })
    }

    /// Records the initiator's narration and completes the action; the
    /// round completes with its last required action.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PhaseViolation` outside narration,
    /// `DomainError::NotEligible` unless the actor initiated the action, and
    /// `DomainError::Validation` for empty content.
    pub fn submit_narration(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        content: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.expect_action_phase("game.submit_narration", action_id, GamePhase::Narration)?;
        if self.open_action()?.initiator_id != actor_id {
            return Err(DomainError::NotEligible {
                actor_id,
                reason: "only the initiator narrates".to_owned(),
            });
        }
        if content.trim().is_empty() {
            return Err(DomainError::Validation(
                "narration must not be empty".to_owned(),
            ));
        }

        self.record(
            GameEventKind::NarrationSubmitted(NarrationSubmitted {
                action_id,
                narration: Narration {
                    narration_id: Uuid::new_v4(),
                    author_id: actor_id,
                    content: content.trim().to_owned(),
                    edited_by: None,
                },
            }),
            correlation_id,
            clock,
        );

        let round = self.round()?;
        if round.actions_completed >= round.total_actions_required {
            let completed = RoundCompleted {
                round_id: round.round_id,
                round_number: round.round_number,
            };
            self.record(GameEventKind::RoundCompleted(completed), correlation_id, clock);
        }
        Ok(self.outcome())
    }

    /// Replaces the text of a completed action's narration.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` unless the actor is the host and
    /// `DomainError::Validation` if the action has no narration yet or the
    /// content is empty.
    pub fn edit_narration(
        &mut self,
        actor_id: Uuid,
        action_id: Uuid,
        content: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.require_host(actor_id, "edit narrations")?;
        if !self
            .find_action(action_id)
            .is_some_and(|a| a.narration.is_some())
        {
            return Err(DomainError::Validation(format!(
                "action {action_id} has no narration to edit"
            )));
        }
        if content.trim().is_empty() {
            return Err(DomainError::Validation(
                "narration must not be empty".to_owned(),
            ));
        }

        self.record(
            GameEventKind::NarrationEdited(NarrationEdited {
                action_id,
                editor_id: actor_id,
                content: content.trim().to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(self.outcome())
    }

    /// Writes the summary of a completed round and starts the next one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` unless the actor is the host,
    /// `DomainError::PhaseViolation` outside the round-summary gate, and
    /// `DomainError::Validation` for empty content.
    pub fn write_round_summary(
        &mut self,
        actor_id: Uuid,
        content: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<TurnOutcome, DomainError> {
        self.require_host(actor_id, "write round summaries")?;
        if self.phase != Some(GamePhase::RoundSummary) {
            return Err(self.phase_violation("game.write_round_summary"));
        }
        if content.trim().is_empty() {
            return Err(DomainError::Validation(
                "round summary must not be empty".to_owned(),
            ));
        }
        let round = self.round()?;
        let (round_id, next_number) = (round.round_id, round.round_number + 1);

        self.record(
            GameEventKind::RoundSummaryWritten(RoundSummaryWritten {
                round_id,
                author_id: actor_id,
                content: content.trim().to_owned(),
            }),
            correlation_id,
            clock,
        );
        self.start_round(next_number, correlation_id, clock);
        Ok(self.outcome())
    }

    // --- derived state ---

    /// Progress of the phase the open action is in, if it waits for inputs.
    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        let action = self.current_action.as_ref()?;
        match self.phase? {
            GamePhase::Argumentation => self.argument_progress(action),
            GamePhase::Voting => self.vote_progress(action),
            _ => None,
        }
    }

    pub(crate) fn argument_progress(&self, action: &Action) -> Option<Progress> {
        let round = self.current_round.as_ref()?;
        let voices = self
            .coordinator(round)
            .arguer_voices(action.initiator_id, action.persona_id);
        Some(Progress {
            received: action.ledger.completed_voices(&voices),
            required: voices.len(),
        })
    }

    pub(crate) fn vote_progress(&self, action: &Action) -> Option<Progress> {
        let voters = self.voters(action).ok()?;
        Some(Progress {
            received: action.tally.submitted_by(&voters),
            required: voters.len(),
        })
    }

    /// The pool the open action would draw from right now.
    pub(crate) fn current_pool(&self) -> Option<TokenPool> {
        let action = self.current_action.as_ref()?;
        let voters = self.voters(action).ok()?;
        Some(self.strategy().build_pool(&Evidence {
            tally: &action.tally,
            ledger: &action.ledger,
            voters: &voters,
        }))
    }

    pub(crate) fn strategy(&self) -> &'static dyn ResolutionStrategy {
        strategy_for(&self.settings)
    }

    fn coordinator<'a>(&self, round: &'a Round) -> SharedPersonaCoordinator<'a> {
        SharedPersonaCoordinator::new(&round.roster, self.settings.shared_personas)
    }

    fn voters(&self, action: &Action) -> Result<Vec<Uuid>, DomainError> {
        let round = self.round()?;
        Ok(self
            .coordinator(round)
            .eligible_voters(action.initiator_id, action.persona_id))
    }

    fn outcome(&self) -> TurnOutcome {
        TurnOutcome {
            phase: self.phase,
            action_id: self.current_action_id(),
            waiting: self.progress().filter(|p| !p.is_complete()),
            token_draw: None,
            is_strong: None,
        }
    }

    fn find_action(&self, action_id: Uuid) -> Option<&Action> {
        self.current_action
            .iter()
            .chain(self.completed_actions.iter())
            .find(|a| a.action_id == action_id)
    }

    // --- guards ---

    fn round(&self) -> Result<&Round, DomainError> {
        self.current_round.as_ref().ok_or_else(|| {
            DomainError::InvariantViolation("game has no current round".to_owned())
        })
    }

    fn open_action(&self) -> Result<&Action, DomainError> {
        self.current_action
            .as_ref()
            .ok_or_else(|| DomainError::InvariantViolation("no action is open".to_owned()))
    }

    fn next_phase(&self, phase: GamePhase) -> Result<GamePhase, DomainError> {
        self.strategy().phase_after(phase).ok_or_else(|| {
            DomainError::InvariantViolation(format!("no phase follows {phase} for this game"))
        })
    }

    fn phase_violation(&self, command: &str) -> DomainError {
        DomainError::PhaseViolation {
            command: command.to_owned(),
            phase: phase_name(self.phase).to_owned(),
        }
    }

    fn already_advanced(&self, command: &str) -> DomainError {
        DomainError::AlreadyAdvanced {
            command: command.to_owned(),
            phase: phase_name(self.phase).to_owned(),
        }
    }

    fn require_started(&self, command: &str) -> Result<(), DomainError> {
        if self.phase.is_none() {
            return Err(self.phase_violation(command));
        }
        Ok(())
    }

    fn require_host(&self, actor_id: Uuid, what: &str) -> Result<(), DomainError> {
        if actor_id != self.host_id {
            return Err(DomainError::NotEligible {
                actor_id,
                reason: format!("only the host may {what}"),
            });
        }
        Ok(())
    }

    fn require_arbiter(&self, actor_id: Uuid) -> Result<(), DomainError> {
        if self.arbiter_id != Some(actor_id) {
            return Err(DomainError::NotEligible {
                actor_id,
                reason: "only the designated arbiter reviews arguments".to_owned(),
            });
        }
        Ok(())
    }

    /// The action must be the open one and in `expected`.
    fn expect_action_phase(
        &self,
        command: &str,
        action_id: Uuid,
        expected: GamePhase,
    ) -> Result<(), DomainError> {
        match self.find_action(action_id) {
            None => Err(DomainError::Validation(format!("action {action_id} not found"))),
            Some(_)
                if self.current_action_id() == Some(action_id) && self.phase == Some(expected) =>
            {
                Ok(())
            }
            Some(_) => Err(self.phase_violation(command)),
        }
    }

    /// A skip applies only while the action is in `target`; once the action
    /// has moved past it the skip reports the phase it is in now.
    fn check_skip(&self, command: &str, action_id: Uuid, target: GamePhase) -> Result<(), DomainError> {
        if self.find_action(action_id).is_none() {
            return Err(DomainError::Validation(format!("action {action_id} not found")));
        }
        if self.current_action_id() != Some(action_id) {
            return Err(self.already_advanced(command));
        }
        let sequence = self.strategy().phase_sequence();
        let position = |phase: Option<GamePhase>| phase.and_then(|p| sequence.iter().position(|s| *s == p));
        match (position(self.phase), position(Some(target))) {
            (Some(current), Some(wanted)) if current == wanted => Ok(()),
            (Some(current), Some(wanted)) if current > wanted => Err(self.already_advanced(command)),
            _ => Err(self.phase_violation(command)),
        }
    }

    // --- transitions ---

    fn start_round(&mut self, round_number: u32, correlation_id: Uuid, clock: &dyn Clock) {
        #[allow(clippy::cast_possible_truncation)]
        let total_actions_required = self.roster.personas().len() as u32;
        self.record(
            GameEventKind::RoundStarted(RoundStarted {
                round_id: Uuid::new_v4(),
                round_number,
                total_actions_required,
            }),
            correlation_id,
            clock,
        );
    }

    fn close_argumentation_if_complete(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.phase != Some(GamePhase::Argumentation) {
            return Ok(());
        }
        let Some(action_id) = self.current_action_id() else {
            return Ok(());
        };
        if !self.progress().is_some_and(Progress::is_complete) {
            return Ok(());
        }
        let next_phase = self.next_phase(GamePhase::Argumentation)?;
        self.record(
            GameEventKind::ArgumentationClosed(ArgumentationClosed {
                action_id,
                skipped: false,
                next_phase,
            }),
            correlation_id,
            clock,
        );
        self.close_voting_if_complete(false, correlation_id, clock)
    }

    /// Closes voting when every voter has voted; a skip closes it after the
    /// missing votes were filled in.
    fn close_voting_if_complete(
        &mut self,
        skipped: bool,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.phase != Some(GamePhase::Voting) {
            return Ok(());
        }
        let Some(action_id) = self.current_action_id() else {
            return Ok(());
        };
        if !self.progress().is_some_and(Progress::is_complete) {
            return Ok(());
        }
        let next_phase = self.next_phase(GamePhase::Voting)?;
        self.record(
            GameEventKind::VotingClosed(VotingClosed {
                action_id,
                skipped,
                next_phase,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    fn prepare_draw(
        &self,
        drawer_id: Uuid,
        clock: &dyn Clock,
        rng: &mut dyn DeterministicRng,
    ) -> Result<(TokenDraw, i64), DomainError> {
        let action = self.open_action()?;
        let voters = self.voters(action)?;
        let pool = self.strategy().build_pool(&Evidence {
            tally: &action.tally,
            ledger: &action.ledger,
            voters: &voters,
        });
        let tokens = pool.draw(rng)?;
        let draw = TokenDraw::new(action.action_id, tokens, pool, drawer_id, clock.now());
        let momentum_delta = NpcMomentum::delta_for(action.initiated_by_npc, draw.result_value);
        Ok((draw, momentum_delta))
    }

    fn record(&mut self, kind: GameEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let event = GameEvent {
            metadata: EventMetadata::for_command(
                kind.event_type(),
                self.id,
                self.version + 1,
                correlation_id,
                clock.now(),
            ),
            kind,
        };
        self.apply(&event);
        self.uncommitted_events.push(event);
    }

    // --- apply helpers ---

    fn enter(&mut self, phase: GamePhase, at: DateTime<Utc>) {
        self.phase = Some(phase);
        self.phase_started_at = Some(at);
    }

    fn breach(&mut self, message: String) {
        if self.invariant_breach.is_none() {
            self.invariant_breach = Some(message);
        }
    }

    fn open_action_mut(&mut self, action_id: Uuid) -> Option<&mut Action> {
        if self.current_action_id() != Some(action_id) {
            self.breach(format!("event for action {action_id}, which is not open"));
            return None;
        }
        self.current_action.as_mut()
    }
}

fn has_finished_arguing(ledger: &ArgumentLedger, voices: &[Voice], player_id: Uuid) -> bool {
    ledger.completed_by().contains(&player_id)
        || voices
            .iter()
            .any(|v| v.members.contains(&player_id) && ledger.is_voice_complete(v))
}

impl AggregateRoot for Game {
    type Event = GameEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            GameEventKind::GameStarted(payload) => {
                self.host_id = payload.host_id;
                self.settings = payload.settings;
                self.roster = Roster::new(payload.personas.clone());
            }
            GameEventKind::RoundStarted(payload) => {
                if let Some(current) = self.current_round.as_ref().map(|r| r.round_number) {
                    self.breach(format!(
                        "round {} started while round {current} is still current",
                        payload.round_number
                    ));
                }
                self.current_round = Some(Round {
                    round_id: payload.round_id,
                    round_number: payload.round_number,
                    actions_completed: 0,
                    total_actions_required: payload.total_actions_required,
                    status: RoundStatus::InProgress,
                    roster: self.roster.clone(),
                    proposed_personas: Vec::new(),
                    proposals_skipped: false,
                    summary: None,
                });
                self.enter(GamePhase::Proposal, at);
            }
            GameEventKind::PlayerJoined(payload) => match &payload.new_persona_name {
                Some(name) => self.roster.add_persona(Persona {
                    persona_id: payload.persona_id,
                    name: name.clone(),
                    is_npc: false,
                    lead_player_id: payload.player_id,
                    member_ids: vec![payload.player_id],
                }),
                None => self.roster.add_member(payload.persona_id, payload.player_id),
            },
            GameEventKind::ArbiterDesignated(payload) => {
                self.arbiter_id = payload.arbiter_id;
            }
            GameEventKind::PersonaLeadChanged(payload) => {
                self.roster.set_lead(payload.persona_id, payload.lead_player_id);
                if let Some(round) = self.current_round.as_mut() {
                    round.roster.set_lead(payload.persona_id, payload.lead_player_id);
                }
            }
            GameEventKind::ActionProposed(payload) => {
                if self.current_action.is_some() {
                    self.breach(format!(
                        "action {} proposed while another action is open",
                        payload.action_id
                    ));
                }
                let mut initiated_by_npc = false;
                if let Some(round) = self.current_round.as_mut() {
                    round.proposed_personas.push(payload.persona_id);
                    initiated_by_npc = round
                        .roster
                        .persona(payload.persona_id)
                        .is_some_and(|p| p.is_npc);
                }
                let mut ledger = ArgumentLedger::default();
                ledger.record(payload.opening_argument.clone());
                self.current_action = Some(Action {
                    action_id: payload.action_id,
                    round_id: payload.round_id,
                    sequence_number: payload.sequence_number,
                    initiator_id: payload.initiator_id,
                    persona_id: payload.persona_id,
                    initiated_by_npc,
                    description: payload.description.clone(),
                    desired_outcome: payload.desired_outcome.clone(),
                    argumentation_was_skipped: false,
                    voting_was_skipped: false,
                    ledger,
                    tally: VoteTally::default(),
                    token_draw: None,
                    narration: None,
                });
                self.enter(GamePhase::Argumentation, at);
            }
            GameEventKind::ArgumentAdded(payload) => {
                if let Some(action) = self.open_action_mut(payload.action_id) {
                    action.ledger.record(payload.argument.clone());
                }
            }
            GameEventKind::ArgumentationMarkedComplete(payload) => {
                if let Some(action) = self.open_action_mut(payload.action_id) {
                    action.ledger.mark_complete(payload.player_id);
                }
            }
            GameEventKind::ArgumentationClosed(payload) => {
                if let Some(action) = self.open_action_mut(payload.action_id) {
                    action.argumentation_was_skipped = payload.skipped;
                }
                self.enter(payload.next_phase, at);
            }
            GameEventKind::ArgumentStrengthToggled(payload) => {
                if let Some(action) = self.open_action_mut(payload.action_id) {
                    action
                        .ledger
                        .set_strength(payload.argument_id, payload.is_strong);
                }
            }
            GameEventKind::ArbiterReviewCompleted(payload) => {
                self.enter(payload.next_phase, at);
            }
            GameEventKind::VoteCast(payload) => {
                if let Some(action) = self.open_action_mut(payload.action_id) {
                    action.tally.record(payload.vote.clone());
                }
            }
            GameEventKind::VotingClosed(payload) => {
                if let Some(action) = self.open_action_mut(payload.action_id) {
                    action.voting_was_skipped = payload.skipped;
                }
                self.enter(payload.next_phase, at);
            }
            GameEventKind::TokensDrawn(payload) => {
                if let Some(action) = self.open_action_mut(payload.action_id) {
                    if action.token_draw.is_some() {
                        let message = format!("action {} drew tokens twice", payload.action_id);
                        self.breach(message);
                    } else {
                        action.token_draw = Some(payload.draw.clone());
                        self.npc_momentum.apply(payload.momentum_delta);
                    }
                }
                self.enter(GamePhase::Narration, at);
            }
            GameEventKind::NarrationSubmitted(payload) => {
                if self.open_action_mut(payload.action_id).is_some() {
                    if let Some(mut action) = self.current_action.take() {
                        action.narration = Some(payload.narration.clone());
                        self.completed_actions.push(action);
                    }
                    if let Some(round) = self.current_round.as_mut() {
                        round.actions_completed += 1;
                    }
                }
                self.enter(GamePhase::Proposal, at);
            }
            GameEventKind::NarrationEdited(payload) => {
                let narration = self
                    .completed_actions
                    .iter_mut()
                    .find(|a| a.action_id == payload.action_id)
                    .and_then(|a| a.narration.as_mut());
                match narration {
                    Some(narration) => {
                        narration.content.clone_from(&payload.content);
                        narration.edited_by = Some(payload.editor_id);
                    }
                    None => self.breach(format!(
                        "narration edited on action {} without a narration",
                        payload.action_id
                    )),
                }
            }
            GameEventKind::ProposalsSkipped(_) => {
                if let Some(round) = self.current_round.as_mut() {
                    round.proposals_skipped = true;
                }
            }
            GameEventKind::RoundCompleted(_) => {
                if let Some(round) = self.current_round.as_mut() {
                    round.status = RoundStatus::Completed;
                }
                self.enter(GamePhase::RoundSummary, at);
            }
            GameEventKind::RoundSummaryWritten(payload) => match self.current_round.take() {
                Some(mut round) if round.round_id == payload.round_id => {
                    round.summary = Some(payload.content.clone());
                    self.completed_rounds.push(round);
                }
                other => {
                    self.current_round = other;
                    self.breach(format!(
                        "summary written for round {}, which is not current",
                        payload.round_id
                    ));
                }
            },
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::{
        ArbiterReviewOutcome, ArgumentMode, SharedPersonaSettings, VotingMode,
    };
    use crate::domain::token_pool::ResultType;
    use storyloom_core::event::DomainEvent;
    use storyloom_test_support::{FixedClock, MockRng, SequenceRng};

    fn fixed_clock() -> FixedClock {
        FixedClock::standard()
    }

    struct Table {
        game: Game,
        host: Uuid,
        alice: Uuid,
        bob: Uuid,
        carol: Uuid,
        gm: Uuid,
    }

    impl Table {
        fn persona_of(&self, player: Uuid) -> Uuid {
            self.game.roster.voice_of(player).unwrap().persona_id
        }

        fn npc_persona(&self) -> Uuid {
            self.game.roster.npc_persona().unwrap().persona_id
        }

        fn propose(&mut self, player: Uuid) -> Uuid {
            let persona_id = self.persona_of(player);
            self.propose_as(player, persona_id)
        }

        fn propose_as(&mut self, player: Uuid, persona_id: Uuid) -> Uuid {
            self.game
                .propose_action(
                    player,
                    persona_id,
                    "Climb the tower",
                    "Reach the bell",
                    "I am a good climber",
                    Uuid::new_v4(),
                    &fixed_clock(),
                )
                .unwrap()
                .action_id
                .unwrap()
        }

        fn finish_arguing(&mut self, action_id: Uuid, players: &[Uuid]) {
            for player in players {
                self.game
                    .complete_argumentation(*player, action_id, Uuid::new_v4(), &fixed_clock())
                    .unwrap();
            }
        }

        fn vote(&mut self, action_id: Uuid, player: Uuid, vote_type: VoteType) -> TurnOutcome {
            self.game
                .cast_vote(player, action_id, vote_type, Uuid::new_v4(), &fixed_clock())
                .unwrap()
        }

        fn draw(&mut self, player: Uuid, action_id: Uuid) -> TokenDraw {
            self.game
                .draw_tokens(player, action_id, Uuid::new_v4(), &fixed_clock(), &mut MockRng)
                .unwrap()
                .token_draw
                .unwrap()
        }

        fn narrate(&mut self, player: Uuid, action_id: Uuid) -> TurnOutcome {
            self.game
                .submit_narration(player, action_id, "It went well.", Uuid::new_v4(), &fixed_clock())
                .unwrap()
        }

        /// Runs an action through to narration with every voter voting
        /// LIKELY_SUCCESS.
        fn play_through(&mut self, initiator: Uuid, persona_id: Uuid) -> Uuid {
            let action_id = self.propose_as(initiator, persona_id);
            let action = self.game.current_action.clone().unwrap();
            let round = self.game.current_round.clone().unwrap();
            let coordinator = SharedPersonaCoordinator::new(&round.roster, self.game.settings.shared_personas);
            for voice in coordinator.arguer_voices(action.initiator_id, action.persona_id) {
                self.finish_arguing(action_id, &voice.members[..1]);
            }
            for voter in coordinator.eligible_voters(action.initiator_id, action.persona_id) {
                self.vote(action_id, voter, VoteType::LikelySuccess);
            }
            self.draw(initiator, action_id);
            self.narrate(initiator, action_id);
            action_id
        }
    }

    fn table(settings: GameSettings, with_npc: bool) -> Table {
        let (host, alice, bob, carol, gm) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let spec = |name: &str, member: Uuid, is_npc: bool| PersonaSpec {
            name: name.to_owned(),
            is_npc,
            lead_player_id: None,
            member_ids: vec![member],
        };
        let mut personas = vec![
            spec("Ada", alice, false),
            spec("Brin", bob, false),
            spec("Cato", carol, false),
        ];
        if with_npc {
            personas.push(spec("The Forest", gm, true));
        }
        let mut game = Game::new(Uuid::new_v4());
        game.start(host, settings, personas, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        game.clear_uncommitted_events();
        Table {
            game,
            host,
            alice,
            bob,
            carol,
            gm,
        }
    }

    fn assert_phase_violation(result: Result<TurnOutcome, DomainError>, expected_phase: &str) {
        match result.unwrap_err() {
            DomainError::PhaseViolation { phase, .. } => assert_eq!(phase, expected_phase),
            other => panic!("expected PhaseViolation, got {other:?}"),
        }
    }

    // --- start ---

    #[test]
    fn test_start_produces_game_and_round_events() {
        // Arrange
        let mut game = Game::new(Uuid::new_v4());
        let personas = vec![
            PersonaSpec {
                name: "Ada".to_owned(),
                is_npc: false,
                lead_player_id: None,
                member_ids: vec![Uuid::new_v4()],
            },
            PersonaSpec {
                name: "Brin".to_owned(),
                is_npc: false,
                lead_player_id: None,
                member_ids: vec![Uuid::new_v4()],
            },
        ];

        // Act
        let outcome = game
            .start(
                Uuid::new_v4(),
                GameSettings::default(),
                personas,
                Uuid::new_v4(),
                &fixed_clock(),
            )
            .unwrap();

        // Assert
        let events = game.uncommitted_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "game.started");
        assert_eq!(events[1].event_type(), "game.round_started");
        assert_eq!(events[0].metadata().sequence_number, 1);
        assert_eq!(events[1].metadata().sequence_number, 2);
        assert_eq!(outcome.phase, Some(GamePhase::Proposal));
        assert_eq!(game.committed_version(), 0);
        let round = game.current_round.as_ref().unwrap();
        assert_eq!(round.round_number, 1);
        assert_eq!(round.total_actions_required, 2);
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn test_start_twice_returns_validation() {
        let mut t = table(GameSettings::default(), false);

        let result = t.game.start(
            t.host,
            GameSettings::default(),
            Vec::new(),
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    // --- proposal ---

    #[test]
    fn test_propose_opens_argumentation_with_initiator_argument() {
        let mut t = table(GameSettings::default(), false);

        let action_id = t.propose(t.alice);

        assert_eq!(t.game.phase(), Some(GamePhase::Argumentation));
        let action = t.game.current_action.as_ref().unwrap();
        assert_eq!(action.action_id, action_id);
        assert_eq!(action.sequence_number, 1);
        let opening = &action.ledger.arguments()[0];
        assert_eq!(opening.argument_type, ArgumentType::InitiatorFor);
        assert_eq!(opening.sequence, 1);
        assert_eq!(
            t.game.progress(),
            Some(Progress {
                received: 0,
                required: 2
            })
        );
    }

    #[test]
    fn test_propose_by_non_lead_returns_not_eligible() {
        let mut t = table(GameSettings::default(), false);
        let ada = t.persona_of(t.alice);

        let result = t.game.propose_action(
            t.bob,
            ada,
            "Steal the map",
            "Get away",
            "Nobody is watching",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::NotEligible { .. })));
        assert!(t.game.uncommitted_events().is_empty());
    }

    #[test]
    fn test_second_proposal_by_same_persona_returns_already_acted() {
        let mut t = table(GameSettings::default(), false);
        let ada = t.persona_of(t.alice);
        t.play_through(t.alice, ada);

        let result = t.game.propose_action(
            t.alice,
            ada,
            "Again",
            "More",
            "Because",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        match result.unwrap_err() {
            DomainError::AlreadyActed { actor_id, phase } => {
                assert_eq!(actor_id, t.alice);
                assert_eq!(phase, "proposal");
            }
            other => panic!("expected AlreadyActed, got {other:?}"),
        }
    }

    #[test]
    fn test_propose_while_action_open_returns_phase_violation() {
        let mut t = table(GameSettings::default(), false);
        t.propose(t.alice);
        let brin = t.persona_of(t.bob);

        let result = t.game.propose_action(
            t.bob,
            brin,
            "Run",
            "Escape",
            "Fast",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert_phase_violation(result, "argumentation");
    }

    #[test]
    fn test_npc_cannot_propose_before_players() {
        let mut t = table(GameSettings::default(), true);
        let npc = t.npc_persona();

        let result = t.game.propose_action(
            t.gm,
            npc,
            "The trees close in",
            "Trap the party",
            "The forest is hungry",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        match result.unwrap_err() {
            DomainError::NotEligible { reason, .. } => assert!(reason.contains("NPC")),
            other => panic!("expected NotEligible, got {other:?}"),
        }
    }

    // --- argumentation ---

    #[test]
    fn test_add_argument_records_sequence_and_persona() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);

        t.game
            .add_argument(
                t.bob,
                action_id,
                ArgumentType::Against,
                "The walls are wet",
                Uuid::new_v4(),
                &fixed_clock(),
            )
            .unwrap();

        let action = t.game.current_action.as_ref().unwrap();
        let argument = &action.ledger.arguments()[1];
        assert_eq!(argument.sequence, 2);
        assert_eq!(argument.persona_id, t.persona_of(t.bob));
        assert_eq!(t.game.uncommitted_events()[1].event_type(), "game.argument_added");
    }

    #[test]
    fn test_add_initiator_for_returns_validation() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);

        let result = t.game.add_argument(
            t.bob,
            action_id,
            ArgumentType::InitiatorFor,
            "Me too",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_add_argument_beyond_limit_returns_limit_exceeded() {
        let settings = GameSettings {
            argument_limit: 1,
            ..GameSettings::default()
        };
        let mut t = table(settings, false);
        let action_id = t.propose(t.alice);
        t.game
            .add_argument(t.bob, action_id, ArgumentType::For, "One", Uuid::new_v4(), &fixed_clock())
            .unwrap();

        let result = t.game.add_argument(
            t.bob,
            action_id,
            ArgumentType::Clarification,
            "Two",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        match result.unwrap_err() {
            DomainError::LimitExceeded { actor_id, limit } => {
                assert_eq!(actor_id, t.bob);
                assert_eq!(limit, 1);
            }
            other => panic!("expected LimitExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_add_argument_after_completion_returns_already_acted() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob]);

        let result = t.game.add_argument(
            t.bob,
            action_id,
            ArgumentType::For,
            "Wait",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::AlreadyActed { .. })));
    }

    #[test]
    fn test_initiator_completing_argumentation_returns_already_acted() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);

        let result =
            t.game
                .complete_argumentation(t.alice, action_id, Uuid::new_v4(), &fixed_clock());

        assert!(matches!(result, Err(DomainError::AlreadyActed { .. })));
    }

    #[test]
    fn test_argumentation_closes_when_every_arguer_completes() {
        // Arrange
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob]);
        assert_eq!(t.game.phase(), Some(GamePhase::Argumentation));

        // Act
        let outcome = t
            .game
            .complete_argumentation(t.carol, action_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();

        // Assert
        assert_eq!(outcome.phase, Some(GamePhase::Voting));
        assert_eq!(
            outcome.waiting,
            Some(Progress {
                received: 0,
                required: 2
            })
        );
        let action = t.game.current_action.as_ref().unwrap();
        assert!(!action.argumentation_was_skipped);
    }

    // --- voting ---

    #[test]
    fn test_vote_reports_waiting_then_closes_voting() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);

        let first = t.vote(action_id, t.bob, VoteType::LikelySuccess);
        assert_eq!(first.phase, Some(GamePhase::Voting));
        assert_eq!(first.waiting.unwrap().remaining(), 1);

        let second = t.vote(action_id, t.carol, VoteType::Uncertain);
        assert_eq!(second.phase, Some(GamePhase::Resolution));
        assert_eq!(second.waiting, None);
        assert_eq!(
            t.game.current_pool(),
            Some(TokenPool {
                success_count: 4,
                failure_count: 2
            })
        );
    }

    #[test]
    fn test_initiator_vote_returns_not_eligible() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);

        let result = t.game.cast_vote(
            t.alice,
            action_id,
            VoteType::LikelySuccess,
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::NotEligible { .. })));
    }

    #[test]
    fn test_duplicate_vote_is_rejected() {
        let mut t = table(GameSettings::default(), true);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);
        t.vote(action_id, t.bob, VoteType::LikelyFailure);

        let result = t.game.cast_vote(
            t.bob,
            action_id,
            VoteType::LikelySuccess,
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::DuplicateVote { .. })));
    }

    #[test]
    fn test_skip_voting_auto_fills_only_missing_voters() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);
        t.vote(action_id, t.bob, VoteType::LikelySuccess);

        let outcome = t
            .game
            .skip_voting(t.host, action_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();

        assert_eq!(outcome.phase, Some(GamePhase::Resolution));
        let action = t.game.current_action.as_ref().unwrap();
        assert!(action.voting_was_skipped);
        let votes = action.tally.votes();
        assert_eq!(votes.len(), 2);
        assert!(!votes[0].was_auto_filled);
        assert_eq!(votes[1].voter_id, t.carol);
        assert!(votes[1].was_auto_filled);
        assert_eq!(votes[1].vote_type, VoteType::Uncertain);
    }

    #[test]
    fn test_skip_voting_replay_returns_already_advanced() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);
        t.game
            .skip_voting(t.host, action_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        t.game.clear_uncommitted_events();

        let result = t
            .game
            .skip_voting(t.host, action_id, Uuid::new_v4(), &fixed_clock());

        match result.unwrap_err() {
            DomainError::AlreadyAdvanced { phase, .. } => assert_eq!(phase, "resolution"),
            other => panic!("expected AlreadyAdvanced, got {other:?}"),
        }
        assert!(t.game.uncommitted_events().is_empty());
    }

    #[test]
    fn test_skip_voting_before_voting_returns_phase_violation() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);

        let result = t
            .game
            .skip_voting(t.host, action_id, Uuid::new_v4(), &fixed_clock());

        assert_phase_violation(result, "argumentation");
    }

    #[test]
    fn test_skip_by_non_host_returns_not_eligible() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);

        let result = t
            .game
            .skip_argumentation(t.bob, action_id, Uuid::new_v4(), &fixed_clock());

        assert!(matches!(result, Err(DomainError::NotEligible { .. })));
    }

    #[test]
    fn test_skip_argumentation_records_flag() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);

        let outcome = t
            .game
            .skip_argumentation(t.host, action_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();

        assert_eq!(outcome.phase, Some(GamePhase::Voting));
        assert!(
            t.game
                .current_action
                .as_ref()
                .unwrap()
                .argumentation_was_skipped
        );
    }

    // --- resolution ---

    #[test]
    fn test_draw_twice_returns_same_draw_without_events() {
        // Arrange
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);
        t.vote(action_id, t.bob, VoteType::LikelySuccess);
        t.vote(action_id, t.carol, VoteType::Uncertain);
        let first = t
            .game
            .draw_tokens(
                t.alice,
                action_id,
                Uuid::new_v4(),
                &fixed_clock(),
                &mut SequenceRng::new(vec![0, 0, 0]),
            )
            .unwrap()
            .token_draw
            .unwrap();
        t.game.clear_uncommitted_events();

        // Act
        let mut untouched = SequenceRng::new(Vec::new());
        let second = t
            .game
            .draw_tokens(t.alice, action_id, Uuid::new_v4(), &fixed_clock(), &mut untouched)
            .unwrap()
            .token_draw
            .unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(first.result_value, 3);
        assert_eq!(untouched.consumed(), 0);
        assert!(t.game.uncommitted_events().is_empty());
        assert_eq!(t.game.phase(), Some(GamePhase::Narration));
    }

    #[test]
    fn test_draw_by_non_initiator_returns_not_eligible() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);
        t.vote(action_id, t.bob, VoteType::LikelySuccess);
        t.vote(action_id, t.carol, VoteType::LikelySuccess);

        let result = t.game.draw_tokens(
            t.bob,
            action_id,
            Uuid::new_v4(),
            &fixed_clock(),
            &mut MockRng,
        );

        match result.unwrap_err() {
            DomainError::NotEligible { reason, .. } => assert!(reason.contains("initiator")),
            other => panic!("expected NotEligible, got {other:?}"),
        }
    }

    #[test]
    fn test_npc_draw_moves_momentum() {
        let mut t = table(GameSettings::default(), true);
        for player in [t.alice, t.bob, t.carol] {
            let persona = t.persona_of(player);
            t.play_through(player, persona);
        }
        assert_eq!(t.game.npc_momentum(), 0);

        let npc = t.npc_persona();
        let action_id = t.play_through(t.gm, npc);

        let action = t
            .game
            .completed_actions
            .iter()
            .find(|a| a.action_id == action_id)
            .unwrap();
        assert_eq!(action.sequence_number, 4);
        assert!(action.initiated_by_npc);
        assert_eq!(t.game.npc_momentum(), 3);
    }

    // --- narration and rounds ---

    #[test]
    fn test_narration_completes_action_and_returns_to_proposal() {
        let mut t = table(GameSettings::default(), false);
        let ada = t.persona_of(t.alice);

        let action_id = t.play_through(t.alice, ada);

        assert_eq!(t.game.phase(), Some(GamePhase::Proposal));
        assert!(t.game.current_action.is_none());
        assert_eq!(t.game.current_round.as_ref().unwrap().actions_completed, 1);
        assert_eq!(t.game.completed_actions[0].action_id, action_id);
        assert!(t.game.check_invariants().is_ok());
    }

    #[test]
    fn test_narration_by_other_player_returns_not_eligible() {
        let mut t = table(GameSettings::default(), false);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);
        t.vote(action_id, t.bob, VoteType::LikelySuccess);
        t.vote(action_id, t.carol, VoteType::LikelySuccess);
        t.draw(t.alice, action_id);

        let result = t.game.submit_narration(
            t.bob,
            action_id,
            "Actually...",
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::NotEligible { .. })));
    }

    #[test]
    fn test_last_narration_completes_round_and_summary_starts_next() {
        // Arrange
        let mut t = table(GameSettings::default(), false);
        for player in [t.alice, t.bob, t.carol] {
            let persona = t.persona_of(player);
            t.play_through(player, persona);
        }

        // Assert round completion
        assert_eq!(t.game.phase(), Some(GamePhase::RoundSummary));
        let round = t.game.current_round.as_ref().unwrap();
        assert_eq!(round.status, RoundStatus::Completed);
        assert_eq!(round.actions_completed, 3);

        // Act
        let outcome = t
            .game
            .write_round_summary(t.host, "The tower fell.", Uuid::new_v4(), &fixed_clock())
            .unwrap();

        // Assert
        assert_eq!(outcome.phase, Some(GamePhase::Proposal));
        assert_eq!(t.game.current_round.as_ref().unwrap().round_number, 2);
        assert_eq!(
            t.game.completed_rounds[0].summary.as_deref(),
            Some("The tower fell.")
        );
    }

    #[test]
    fn test_summary_outside_gate_returns_phase_violation() {
        let mut t = table(GameSettings::default(), false);

        let result = t
            .game
            .write_round_summary(t.host, "Too early", Uuid::new_v4(), &fixed_clock());

        assert_phase_violation(result, "proposal");
    }

    #[test]
    fn test_skip_proposals_requires_a_proposal() {
        let mut t = table(GameSettings::default(), false);
        let round_id = t.game.current_round_id().unwrap();

        let result = t
            .game
            .skip_proposals(t.host, round_id, Uuid::new_v4(), &fixed_clock());

        assert_phase_violation(result, "proposal");
    }

    #[test]
    fn test_skip_proposals_completes_round_and_replay_is_already_advanced() {
        let mut t = table(GameSettings::default(), false);
        let ada = t.persona_of(t.alice);
        t.play_through(t.alice, ada);
        let round_id = t.game.current_round_id().unwrap();

        let outcome = t
            .game
            .skip_proposals(t.host, round_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        let replay = t
            .game
            .skip_proposals(t.host, round_id, Uuid::new_v4(), &fixed_clock());

        assert_eq!(outcome.phase, Some(GamePhase::RoundSummary));
        assert!(t.game.current_round.as_ref().unwrap().proposals_skipped);
        match replay.unwrap_err() {
            DomainError::AlreadyAdvanced { phase, .. } => assert_eq!(phase, "round_summary"),
            other => panic!("expected AlreadyAdvanced, got {other:?}"),
        }
    }

    #[test]
    fn test_edit_narration_by_host_updates_text() {
        let mut t = table(GameSettings::default(), false);
        let ada = t.persona_of(t.alice);
        let action_id = t.play_through(t.alice, ada);

        t.game
            .edit_narration(t.host, action_id, "It went superbly.", Uuid::new_v4(), &fixed_clock())
            .unwrap();

        let narration = t.game.completed_actions[0].narration.as_ref().unwrap();
        assert_eq!(narration.content, "It went superbly.");
        assert_eq!(narration.edited_by, Some(t.host));
    }

    // --- roster ---

    #[test]
    fn test_joiner_takes_part_from_next_round() {
        let mut t = table(GameSettings::default(), false);
        let newcomer = Uuid::new_v4();
        t.game
            .join(
                newcomer,
                JoinTarget::NewPersona {
                    name: "Dara".to_owned(),
                },
                Uuid::new_v4(),
                &fixed_clock(),
            )
            .unwrap();
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, t.carol]);

        let result = t.game.cast_vote(
            newcomer,
            action_id,
            VoteType::LikelyFailure,
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::NotEligible { .. })));
        assert_eq!(t.game.roster.personas().len(), 4);
        assert_eq!(
            t.game.current_round.as_ref().unwrap().total_actions_required,
            3
        );
    }

    #[test]
    fn test_join_existing_persona_requires_shared_personas() {
        let mut t = table(GameSettings::default(), false);
        let ada = t.persona_of(t.alice);

        let result = t.game.join(
            Uuid::new_v4(),
            JoinTarget::ExistingPersona { persona_id: ada },
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    // --- shared personas ---

    /// Ada (alice), Brin (bob leading, dana) and Cato (carol).
    fn shared_table(voting_mode: VotingMode, argument_mode: ArgumentMode) -> (Table, Uuid) {
        let (host, alice, bob, carol, dana) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let spec = |name: &str, members: &[Uuid]| PersonaSpec {
            name: name.to_owned(),
            is_npc: false,
            lead_player_id: Some(members[0]),
            member_ids: members.to_vec(),
        };
        let settings = GameSettings {
            shared_personas: SharedPersonaSettings {
                allow_shared_personas: true,
                voting_mode,
                argument_mode,
            },
            ..GameSettings::default()
        };
        let mut game = Game::new(Uuid::new_v4());
        game.start(
            host,
            settings,
            vec![
                spec("Ada", &[alice]),
                spec("Brin", &[bob, dana]),
                spec("Cato", &[carol]),
            ],
            Uuid::new_v4(),
            &fixed_clock(),
        )
        .unwrap();
        game.clear_uncommitted_events();
        let table = Table {
            game,
            host,
            alice,
            bob,
            carol,
            gm: Uuid::new_v4(),
        };
        (table, dana)
    }

    #[test]
    fn test_set_persona_lead_updates_current_round() {
        // Arrange
        let (mut t, dana) = shared_table(VotingMode::OnePerPersona, ArgumentMode::Independent);
        let brin = t.persona_of(t.bob);

        // Act
        t.game
            .set_persona_lead(t.host, brin, dana, Uuid::new_v4(), &fixed_clock())
            .unwrap();

        // Assert
        assert_eq!(t.game.roster.persona(brin).unwrap().lead_player_id, dana);
        let round = t.game.current_round.as_ref().unwrap();
        assert_eq!(round.roster.persona(brin).unwrap().lead_player_id, dana);
        assert!(matches!(
            &t.game.uncommitted_events()[0].kind,
            GameEventKind::PersonaLeadChanged(_)
        ));
    }

    #[test]
    fn test_set_persona_lead_requires_host_and_member() {
        let (mut t, dana) = shared_table(VotingMode::EachMember, ArgumentMode::Independent);
        let brin = t.persona_of(t.bob);

        let by_player = t
            .game
            .set_persona_lead(t.bob, brin, dana, Uuid::new_v4(), &fixed_clock());
        let outsider = t
            .game
            .set_persona_lead(t.host, brin, t.carol, Uuid::new_v4(), &fixed_clock());

        assert!(matches!(by_player, Err(DomainError::NotEligible { .. })));
        assert!(matches!(outsider, Err(DomainError::Validation(_))));
        assert_eq!(t.game.roster.persona(brin).unwrap().lead_player_id, t.bob);
        assert!(t.game.uncommitted_events().is_empty());
    }

    #[test]
    fn test_one_per_persona_counts_only_the_lead() {
        // Arrange
        let (mut t, dana) = shared_table(VotingMode::OnePerPersona, ArgumentMode::Independent);
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, dana, t.carol]);

        // Act
        let member_vote = t.game.cast_vote(
            dana,
            action_id,
            VoteType::LikelySuccess,
            Uuid::new_v4(),
            &fixed_clock(),
        );
        let first = t.vote(action_id, t.bob, VoteType::LikelySuccess);
        let last = t.vote(action_id, t.carol, VoteType::Uncertain);

        // Assert
        match member_vote.unwrap_err() {
            DomainError::NotEligible { reason, .. } => assert!(reason.contains("lead")),
            other => panic!("expected NotEligible, got {other:?}"),
        }
        assert_eq!(
            first.waiting,
            Some(Progress {
                received: 1,
                required: 2
            })
        );
        assert_eq!(last.phase, Some(GamePhase::Resolution));
    }

    #[test]
    fn test_new_lead_votes_for_persona_after_lead_change() {
        let (mut t, dana) = shared_table(VotingMode::OnePerPersona, ArgumentMode::Independent);
        let brin = t.persona_of(t.bob);
        t.game
            .set_persona_lead(t.host, brin, dana, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        let action_id = t.propose(t.alice);
        t.finish_arguing(action_id, &[t.bob, dana, t.carol]);

        let old_lead = t.game.cast_vote(
            t.bob,
            action_id,
            VoteType::LikelySuccess,
            Uuid::new_v4(),
            &fixed_clock(),
        );
        t.vote(action_id, dana, VoteType::LikelySuccess);

        assert!(matches!(old_lead, Err(DomainError::NotEligible { .. })));
    }

    #[test]
    fn test_shared_pool_completion_by_one_member_completes_persona() {
        // Arrange
        let (mut t, dana) = shared_table(VotingMode::EachMember, ArgumentMode::SharedPool);
        let action_id = t.propose(t.alice);

        // Act
        t.finish_arguing(action_id, &[dana]);
        let teammate = t
            .game
            .complete_argumentation(t.bob, action_id, Uuid::new_v4(), &fixed_clock());
        let outcome = t
            .game
            .complete_argumentation(t.carol, action_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();

        // Assert
        assert!(matches!(teammate, Err(DomainError::AlreadyActed { .. })));
        assert_eq!(outcome.phase, Some(GamePhase::Voting));
        assert_eq!(
            outcome.waiting,
            Some(Progress {
                received: 0,
                required: 3
            })
        );
    }

    // --- arbiter ---

    fn arbiter_table(outcome: ArbiterReviewOutcome) -> (Table, Uuid, Uuid) {
        let settings = GameSettings {
            resolution_method: ResolutionMethod::Arbiter,
            arbiter_review_outcome: outcome,
            ..GameSettings::default()
        };
        let mut t = table(settings, false);
        let arbiter = Uuid::new_v4();
        t.game
            .designate_arbiter(t.host, Some(arbiter), Uuid::new_v4(), &fixed_clock())
            .unwrap();
        let action_id = t.propose(t.alice);
        t.game
            .add_argument(
                t.bob,
                action_id,
                ArgumentType::For,
                "She trained for this",
                Uuid::new_v4(),
                &fixed_clock(),
            )
            .unwrap();
        t.finish_arguing(action_id, &[t.bob, t.carol]);
        (t, arbiter, action_id)
    }

    #[test]
    fn test_arbiter_review_follows_argumentation() {
        let (t, _, _) = arbiter_table(ArbiterReviewOutcome::ProceedToVoting);
        assert_eq!(t.game.phase(), Some(GamePhase::ArbiterReview));
    }

    #[test]
    fn test_review_argument_toggles_and_rejects_initiator_for() {
        let (mut t, arbiter, action_id) = arbiter_table(ArbiterReviewOutcome::ProceedToVoting);
        let arguments = t.game.current_action.as_ref().unwrap().ledger.arguments().to_vec();

        let outcome = t
            .game
            .review_argument(arbiter, action_id, arguments[1].argument_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        let rejected = t.game.review_argument(
            arbiter,
            action_id,
            arguments[0].argument_id,
            Uuid::new_v4(),
            &fixed_clock(),
        );
        let stranger = t.game.review_argument(
            t.bob,
            action_id,
            arguments[1].argument_id,
            Uuid::new_v4(),
            &fixed_clock(),
        );

        assert_eq!(outcome.is_strong, Some(true));
        assert!(matches!(rejected, Err(DomainError::Validation(_))));
        assert!(matches!(stranger, Err(DomainError::NotEligible { .. })));
    }

    #[test]
    fn test_draw_immediately_draws_on_review_completion() {
        // Arrange
        let (mut t, arbiter, action_id) = arbiter_table(ArbiterReviewOutcome::DrawImmediately);
        let strong = t.game.current_action.as_ref().unwrap().ledger.arguments()[1].argument_id;
        t.game
            .review_argument(arbiter, action_id, strong, Uuid::new_v4(), &fixed_clock())
            .unwrap();

        // Act
        let outcome = t
            .game
            .complete_arbiter_review(arbiter, action_id, Uuid::new_v4(), &fixed_clock(), &mut MockRng)
            .unwrap();

        // Assert
        assert_eq!(outcome.phase, Some(GamePhase::Narration));
        let draw = outcome.token_draw.unwrap();
        assert_eq!(
            draw.pool,
            TokenPool {
                success_count: 3,
                failure_count: 2
            }
        );
        assert_eq!(draw.drawn_by, arbiter);
        assert_eq!(draw.result_type, ResultType::Triumph);
    }

    #[test]
    fn test_draw_immediately_without_strong_arguments_still_resolves() {
        // Arrange
        let settings = GameSettings {
            resolution_method: ResolutionMethod::Arbiter,
            arbiter_review_outcome: ArbiterReviewOutcome::DrawImmediately,
            ..GameSettings::default()
        };
        let mut t = table(settings, false);
        let arbiter = Uuid::new_v4();
        t.game
            .designate_arbiter(t.host, Some(arbiter), Uuid::new_v4(), &fixed_clock())
            .unwrap();
        let action_id = t.propose(t.alice);
        t.game
            .skip_argumentation(t.host, action_id, Uuid::new_v4(), &fixed_clock())
            .unwrap();
        assert_eq!(t.game.phase(), Some(GamePhase::ArbiterReview));

        // Act
        let outcome = t
            .game
            .complete_arbiter_review(arbiter, action_id, Uuid::new_v4(), &fixed_clock(), &mut MockRng)
            .unwrap();

        // Assert
        assert_eq!(outcome.phase, Some(GamePhase::Narration));
        let draw = outcome.token_draw.unwrap();
        assert_eq!(
            draw.pool,
            TokenPool {
                success_count: 2,
                failure_count: 2
            }
        );
        assert_eq!(draw.result_type, ResultType::SuccessBut);
    }

    #[test]
    fn test_arbiter_draws_after_voting() {
        let (mut t, arbiter, action_id) = arbiter_table(ArbiterReviewOutcome::ProceedToVoting);
        t.game
            .complete_arbiter_review(arbiter, action_id, Uuid::new_v4(), &fixed_clock(), &mut MockRng)
            .unwrap();
        t.vote(action_id, t.bob, VoteType::LikelyFailure);
        t.vote(action_id, t.carol, VoteType::LikelyFailure);

        let by_initiator = t.game.draw_tokens(
            t.alice,
            action_id,
            Uuid::new_v4(),
            &fixed_clock(),
            &mut MockRng,
        );
        let draw = t.draw(arbiter, action_id);

        match by_initiator.unwrap_err() {
            DomainError::NotEligible { reason, .. } => assert!(reason.contains("arbiter")),
            other => panic!("expected NotEligible, got {other:?}"),
        }
        assert_eq!(draw.pool.failure_count, 5);
    }

    // --- invariants ---

    #[test]
    fn test_apply_of_mismatched_event_sets_invariant_breach() {
        let mut t = table(GameSettings::default(), false);
        let event = GameEvent {
            metadata: EventMetadata::for_command(
                "game.vote_cast",
                t.game.id,
                t.game.version + 1,
                Uuid::new_v4(),
                fixed_clock().0,
            ),
            kind: GameEventKind::VoteCast(VoteCast {
                action_id: Uuid::new_v4(),
                vote: Vote {
                    voter_id: t.bob,
                    vote_type: VoteType::Uncertain,
                    was_auto_filled: false,
                },
            }),
        };

        t.game.apply(&event);

        assert!(matches!(
            t.game.check_invariants(),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
