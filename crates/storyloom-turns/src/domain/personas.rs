//! Personas, the game roster, and the coordinator that maps shared personas
//! onto the players whose input counts.

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use uuid::Uuid;

use super::arguments::ArgumentQuota;
use super::settings::{ArgumentMode, SharedPersonaSettings, VotingMode};

/// A character in the story, controlled by one or more players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub persona_id: Uuid,
    pub name: String,
    pub is_npc: bool,
    /// Proposes and narrates on the persona's behalf.
    pub lead_player_id: Uuid,
    pub member_ids: Vec<Uuid>,
}

impl Persona {
    #[must_use]
    pub fn is_member(&self, player_id: Uuid) -> bool {
        self.member_ids.contains(&player_id)
    }

    #[must_use]
    pub fn is_lead(&self, player_id: Uuid) -> bool {
        self.lead_player_id == player_id
    }
}

/// The personas taking part in a game.
///
/// Each round keeps its own copy taken when the round starts; players who
/// join mid-round appear in the game roster only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    personas: Vec<Persona>,
}

impl Roster {
    #[must_use]
    pub fn new(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    #[must_use]
    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    #[must_use]
    pub fn persona(&self, persona_id: Uuid) -> Option<&Persona> {
        self.personas.iter().find(|p| p.persona_id == persona_id)
    }

    #[must_use]
    pub fn npc_persona(&self) -> Option<&Persona> {
        self.personas.iter().find(|p| p.is_npc)
    }

    /// The non-NPC persona the player belongs to.
    #[must_use]
    pub fn player_persona(&self, player_id: Uuid) -> Option<&Persona> {
        self.personas
            .iter()
            .find(|p| !p.is_npc && p.is_member(player_id))
    }

    /// The persona a player speaks for: their own, else the NPC they control.
    #[must_use]
    pub fn voice_of(&self, player_id: Uuid) -> Option<&Persona> {
        self.player_persona(player_id)
            .or_else(|| self.npc_persona().filter(|p| p.is_member(player_id)))
    }

    #[must_use]
    pub fn is_participant(&self, player_id: Uuid) -> bool {
        self.voice_of(player_id).is_some()
    }

    /// Non-NPC personas.
    pub fn player_personas(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter().filter(|p| !p.is_npc)
    }

    pub fn add_persona(&mut self, persona: Persona) {
        self.personas.push(persona);
    }

    /// Adds a member to an existing persona. Unknown ids are ignored.
    pub fn add_member(&mut self, persona_id: Uuid, player_id: Uuid) {
        if let Some(persona) = self.personas.iter_mut().find(|p| p.persona_id == persona_id) {
            if !persona.is_member(player_id) {
                persona.member_ids.push(player_id);
            }
        }
    }

    /// Changes a persona's lead. Unknown ids are ignored.
    pub fn set_lead(&mut self, persona_id: Uuid, lead_player_id: Uuid) {
        if let Some(persona) = self.personas.iter_mut().find(|p| p.persona_id == persona_id) {
            persona.lead_player_id = lead_player_id;
        }
    }

    /// Checks the starting line-up of a game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if there are fewer than two player
    /// personas, more than one NPC persona, a persona without members or
    /// with a lead outside its members, a player in two player personas, or
    /// a shared persona while sharing is disabled.
    pub fn validate(&self, shared: &SharedPersonaSettings) -> Result<(), DomainError> {
        if self.player_personas().count() < 2 {
            return Err(DomainError::Validation(
                "a game needs at least two player personas".to_owned(),
            ));
        }
        if self.personas.iter().filter(|p| p.is_npc).count() > 1 {
            return Err(DomainError::Validation(
                "a game has at most one NPC persona".to_owned(),
            ));
        }

        let mut seen_players: Vec<Uuid> = Vec::new();
        for persona in &self.personas {
            if persona.name.trim().is_empty() {
                return Err(DomainError::Validation(
                    "persona name must not be empty".to_owned(),
                ));
            }
            if persona.member_ids.is_empty() {
                return Err(DomainError::Validation(format!(
                    "persona {} has no members",
                    persona.name
                )));
            }
            if !persona.is_member(persona.lead_player_id) {
                return Err(DomainError::Validation(format!(
                    "lead of persona {} must be one of its members",
                    persona.name
                )));
            }
            if persona.member_ids.len() > 1 && !shared.allow_shared_personas {
                return Err(DomainError::Validation(format!(
                    "persona {} has several members but shared personas are disabled",
                    persona.name
                )));
            }
            if !persona.is_npc {
                for member in &persona.member_ids {
                    if seen_players.contains(member) {
                        return Err(DomainError::Validation(format!(
                            "player {member} belongs to more than one player persona"
                        )));
                    }
                    seen_players.push(*member);
                }
            }
        }
        Ok(())
    }
}

/// A unit whose completion signal counts once toward argumentation quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// The player or, under a shared pool, the persona.
    pub key: Uuid,
    /// Players whose signal completes this voice.
    pub members: Vec<Uuid>,
}

/// Resolves who votes and argues for each persona of a round.
///
/// Holds nothing beyond the round's roster and the shared-persona settings.
#[derive(Debug, Clone, Copy)]
pub struct SharedPersonaCoordinator<'a> {
    roster: &'a Roster,
    settings: SharedPersonaSettings,
}

impl<'a> SharedPersonaCoordinator<'a> {
    #[must_use]
    pub fn new(roster: &'a Roster, settings: SharedPersonaSettings) -> Self {
        Self { roster, settings }
    }

    /// Player personas other than the initiating one.
    fn opposing_personas(&self, initiating_persona_id: Uuid) -> impl Iterator<Item = &'a Persona> {
        self.roster
            .player_personas()
            .filter(move |p| p.persona_id != initiating_persona_id)
    }

    /// Players whose votes count toward quorum on an action.
    #[must_use]
    pub fn eligible_voters(&self, initiator_id: Uuid, initiating_persona_id: Uuid) -> Vec<Uuid> {
        let mut voters = Vec::new();
        for persona in self.opposing_personas(initiating_persona_id) {
            match self.settings.voting_mode {
                VotingMode::EachMember => voters.extend(
                    persona
                        .member_ids
                        .iter()
                        .copied()
                        .filter(|m| *m != initiator_id),
                ),
                VotingMode::OnePerPersona => {
                    if persona.lead_player_id != initiator_id {
                        voters.push(persona.lead_player_id);
                    }
                }
            }
        }
        voters
    }

    /// Checks that a player may vote on an action.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotEligible` naming the reason.
    pub fn check_voter(
        &self,
        player_id: Uuid,
        initiator_id: Uuid,
        initiating_persona_id: Uuid,
    ) -> Result<(), DomainError> {
        let reason = if !self.roster.is_participant(player_id) {
            "not a participant in the current round"
        } else if player_id == initiator_id {
            "the initiator does not vote on their own action"
        } else if self
            .roster
            .persona(initiating_persona_id)
            .is_some_and(|p| p.is_member(player_id))
        {
            "members of the initiating persona do not vote"
        } else if self
            .eligible_voters(initiator_id, initiating_persona_id)
            .contains(&player_id)
        {
            return Ok(());
        } else if self.settings.voting_mode == VotingMode::OnePerPersona
            && self.roster.player_persona(player_id).is_some()
        {
            "only the persona lead votes"
        } else {
            "not a voter on this action"
        };
        Err(DomainError::NotEligible {
            actor_id: player_id,
            reason: reason.to_owned(),
        })
    }

    /// Voices that must signal completion before argumentation closes.
    #[must_use]
    pub fn arguer_voices(&self, initiator_id: Uuid, initiating_persona_id: Uuid) -> Vec<Voice> {
        let mut voices = Vec::new();
        for persona in self.opposing_personas(initiating_persona_id) {
            let members: Vec<Uuid> = persona
                .member_ids
                .iter()
                .copied()
                .filter(|m| *m != initiator_id)
                .collect();
            if members.is_empty() {
                continue;
            }
            match self.settings.argument_mode {
                ArgumentMode::Independent => voices.extend(members.into_iter().map(|m| Voice {
                    key: m,
                    members: vec![m],
                })),
                ArgumentMode::SharedPool => voices.push(Voice {
                    key: persona.persona_id,
                    members,
                }),
            }
        }
        voices
    }

    /// The quota a player's arguments are charged to, if they take part in
    /// the round.
    #[must_use]
    pub fn quota_for(&self, player_id: Uuid) -> Option<ArgumentQuota> {
        let persona = self.roster.voice_of(player_id)?;
        Some(match self.settings.argument_mode {
            ArgumentMode::Independent => ArgumentQuota::Player(player_id),
            ArgumentMode::SharedPool => ArgumentQuota::Persona(persona.persona_id),
        })
    }
}
