use anyhow::{Context, Result, bail, ensure};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tarotjack_game::{
    ActAdvance, Coord, GameEvent, GameStorage, NodeKind, RoundOutcome, RunSession, SelectOutcome,
    TraversalPolicy,
};

/// Knobs for a randomized run.
#[derive(Debug, Clone, Copy)]
pub struct AutoplayPolicy {
    /// Chance that the player takes a blackjack round.
    pub round_win_chance: f64,
    pub damage_per_loss: f32,
    /// Stop after this many node selections.
    pub max_steps: usize,
}

impl Default for AutoplayPolicy {
    fn default() -> Self {
        Self {
            round_win_chance: 0.7,
            damage_per_loss: 6.0,
            max_steps: 400,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: usize,
    pub fights_won: usize,
    pub rounds_played: usize,
    pub acts_cleared: usize,
    pub maps_generated: usize,
    pub run_completed: bool,
    pub game_over: bool,
    pub final_health: f32,
}

/// Drives a session through maps by picking random legal nodes and
/// rolling round outcomes.
pub struct Autoplayer {
    rng: ChaCha8Rng,
    policy: AutoplayPolicy,
}

impl Autoplayer {
    #[must_use]
    pub fn new(seed: u64, policy: AutoplayPolicy) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            policy,
        }
    }

    /// Play until the run ends, `acts` acts are cleared, or the step
    /// budget runs out.
    pub fn play<S: GameStorage>(
        &mut self,
        session: &mut RunSession<S>,
        acts: usize,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        session.enter_map().context("entering first map")?;

        while summary.steps < self.policy.max_steps {
            let Some(target) = self.pick_target(session) else {
                bail!("no selectable node on the current map");
            };
            summary.steps += 1;
            let kind = session
                .map()
                .and_then(|map| map.get_node(target))
                .map(|node| node.kind)
                .context("picked node vanished")?;

            match session.select_node(target)? {
                SelectOutcome::Denied(reason) => {
                    bail!("policy allowed {target} but the session denied it: {reason}");
                }
                SelectOutcome::Resolved(_) => {}
                SelectOutcome::EncounterStarted { .. } => {
                    match self.fight(session, &mut summary)? {
                        Some(ActAdvance::RunComplete) => summary.run_completed = true,
                        Some(ActAdvance::NextAct(_)) => summary.acts_cleared += 1,
                        _ => {}
                    }
                    if summary.game_over {
                        break;
                    }
                    let entry = session.enter_map()?;
                    ensure!(
                        entry.handoff.return_to_map,
                        "finished {kind} fight without a return-to-map hand-off"
                    );
                }
            }

            if summary.run_completed || (acts > 0 && summary.acts_cleared >= acts) {
                break;
            }
        }

        summary.maps_generated = session
            .drain_events()
            .iter()
            .filter(|event| **event == GameEvent::MapRegenerated)
            .count();
        summary.final_health = session.progression().player_health();
        Ok(summary)
    }

    fn pick_target<S: GameStorage>(&mut self, session: &RunSession<S>) -> Option<Coord> {
        let map = session.map()?;
        let candidates: Vec<Coord> = map
            .graph
            .nodes()
            .filter(|node| {
                let decision = TraversalPolicy::evaluate(map, session.progression(), node.coord);
                decision == tarotjack_game::TraversalDecision::Allowed { replay: false }
            })
            .map(|node| node.coord)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let boss = candidates
            .iter()
            .copied()
            .find(|coord| map.get_node(*coord).is_some_and(|n| n.kind == NodeKind::Boss));
        boss.or_else(|| Some(candidates[self.rng.gen_range(0..candidates.len())]))
    }

    fn fight<S: GameStorage>(
        &mut self,
        session: &mut RunSession<S>,
        summary: &mut RunSummary,
    ) -> Result<Option<ActAdvance>> {
        for _ in 0..256 {
            let won = self.rng.gen_bool(self.policy.round_win_chance);
            summary.rounds_played += 1;
            match session.report_round_outcome(won, self.policy.damage_per_loss)? {
                RoundOutcome::Continue => {}
                RoundOutcome::Completed(done) => {
                    if done.won {
                        summary.fights_won += 1;
                    }
                    return Ok(done.act);
                }
                RoundOutcome::GameOver => {
                    summary.game_over = true;
                    return Ok(None);
                }
            }
        }
        bail!("fight did not resolve within 256 rounds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarotjack_game::{EncounterCatalog, EngineConfig, MemoryStorage};

    fn session(seed: u64) -> RunSession<MemoryStorage> {
        RunSession::open(
            MemoryStorage::new(),
            EncounterCatalog::load_from_static(),
            EngineConfig::default(),
            seed,
        )
        .unwrap()
    }

    #[test]
    fn flawless_player_clears_the_first_act() {
        let policy = AutoplayPolicy {
            round_win_chance: 1.0,
            ..AutoplayPolicy::default()
        };
        let mut run = session(5);
        let summary = Autoplayer::new(5, policy).play(&mut run, 1).unwrap();
        assert_eq!(summary.acts_cleared, 1);
        assert!(!summary.game_over);
        assert!(run.progression().is_boss_defeated(tarotjack_game::BossId::Dealer));
    }

    #[test]
    fn hopeless_player_reaches_game_over() {
        let policy = AutoplayPolicy {
            round_win_chance: 0.0,
            damage_per_loss: 40.0,
            ..AutoplayPolicy::default()
        };
        let mut run = session(9);
        let summary = Autoplayer::new(9, policy).play(&mut run, 1).unwrap();
        assert!(summary.game_over);
        assert!(summary.final_health.abs() < f32::EPSILON);
    }
}
