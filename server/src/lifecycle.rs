//! Match lifecycle: `WaitingForPlayers -> Countdown -> Playing -> GameOver`.
//!
//! The phase only moves forward; `restart` is the single way back to
//! `WaitingForPlayers`. Countdown steps run as scheduled continuations tagged
//! with the match epoch, so a restart strands any steps still queued.

use crate::config::MatchRules;
use crate::scheduler::{Scheduler, Task};
use crate::scoreboard::Scoreboard;
use log::info;
use shared::{EntityId, MatchPhase, ServerEvent, COUNTDOWN_STEPS};

#[derive(Debug)]
pub struct MatchLifecycle {
    phase: MatchPhase,
    time_remaining: f32,
    winner: Option<EntityId>,
    epoch: u32,
    rules: MatchRules,
}

impl MatchLifecycle {
    pub fn new(rules: MatchRules) -> Self {
        Self {
            phase: MatchPhase::WaitingForPlayers,
            time_remaining: rules.duration,
            winner: None,
            epoch: 0,
            rules,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn time_remaining(&self) -> f32 {
        self.time_remaining
    }

    pub fn winner(&self) -> Option<EntityId> {
        self.winner
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    pub fn controls_enabled(&self) -> bool {
        self.phase == MatchPhase::Playing
    }

    fn set_phase(&mut self, phase: MatchPhase, events: &mut Vec<ServerEvent>) {
        info!("Match phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        events.push(ServerEvent::MatchPhaseChanged { phase });
    }

    /// Per-tick driver. Returns the new phase when this call caused a transition.
    pub fn server_update(
        &mut self,
        dt: f32,
        connected_players: usize,
        scoreboard: &Scoreboard,
        now: f64,
        scheduler: &mut Scheduler,
        events: &mut Vec<ServerEvent>,
    ) -> Option<MatchPhase> {
        match self.phase {
            MatchPhase::WaitingForPlayers => {
                if connected_players >= self.rules.min_players {
                    self.start_countdown(now, scheduler, events);
                    return Some(MatchPhase::Countdown);
                }
            }
            MatchPhase::Playing => {
                if self.rules.score_limited {
                    if let Some(winner) = scoreboard.first_reaching(self.rules.score_to_win) {
                        self.end_match(Some(winner), scoreboard, now, scheduler, events);
                        return Some(MatchPhase::GameOver);
                    }
                }

                if self.rules.time_limited {
                    self.time_remaining = (self.time_remaining - dt).max(0.0);
                    if self.time_remaining <= 0.0 {
                        self.end_match(None, scoreboard, now, scheduler, events);
                        return Some(MatchPhase::GameOver);
                    }
                }
            }
            MatchPhase::Countdown | MatchPhase::GameOver => {}
        }
        None
    }

    fn start_countdown(&mut self, now: f64, scheduler: &mut Scheduler, events: &mut Vec<ServerEvent>) {
        self.set_phase(MatchPhase::Countdown, events);
        events.push(ServerEvent::CountdownStep {
            remaining: COUNTDOWN_STEPS,
        });

        for step in 1..=COUNTDOWN_STEPS {
            scheduler.schedule(
                now + step as f64,
                Task::CountdownStep {
                    epoch: self.epoch,
                    remaining: COUNTDOWN_STEPS - step,
                },
            );
        }
    }

    /// Handles one scheduled countdown step; step 0 is "Go" and starts play.
    pub fn on_countdown_step(&mut self, epoch: u32, remaining: u8, events: &mut Vec<ServerEvent>) -> Option<MatchPhase> {
        if epoch != self.epoch || self.phase != MatchPhase::Countdown {
            return None;
        }

        events.push(ServerEvent::CountdownStep { remaining });
        if remaining > 0 {
            return None;
        }

        self.time_remaining = self.rules.duration;
        self.set_phase(MatchPhase::Playing, events);
        events.push(ServerEvent::MatchControlsEnabled);
        Some(MatchPhase::Playing)
    }

    /// Ends the match. Re-entry while already over is a no-op and returns false.
    ///
    /// Without an explicit winner the highest score wins, ties going to the
    /// earlier scoreboard row.
    pub fn end_match(
        &mut self,
        winner: Option<EntityId>,
        scoreboard: &Scoreboard,
        now: f64,
        scheduler: &mut Scheduler,
        events: &mut Vec<ServerEvent>,
    ) -> bool {
        if self.phase == MatchPhase::GameOver {
            return false;
        }

        self.winner = winner.or_else(|| scoreboard.leader());
        let winner_name = self.winner.and_then(|w| scoreboard.display_name(w));
        info!("Match over, winner: {:?}", winner_name);

        self.set_phase(MatchPhase::GameOver, events);
        events.push(ServerEvent::GameOver { winner_name });

        if self.rules.restart_delay > 0.0 {
            scheduler.schedule(
                now + self.rules.restart_delay as f64,
                Task::RestartMatch { epoch: self.epoch },
            );
        }
        true
    }

    /// Whether a scheduled restart still applies to this match.
    pub fn is_restart_due(&self, epoch: u32) -> bool {
        epoch == self.epoch && self.phase == MatchPhase::GameOver
    }

    /// Returns to `WaitingForPlayers` from any phase.
    pub fn restart(&mut self, scoreboard: &mut Scoreboard, events: &mut Vec<ServerEvent>) {
        self.epoch = self.epoch.wrapping_add(1);
        self.winner = None;
        self.time_remaining = self.rules.duration;
        scoreboard.reset_for_restart();
        self.set_phase(MatchPhase::WaitingForPlayers, events);
    }
}
