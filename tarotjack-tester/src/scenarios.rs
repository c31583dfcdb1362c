//! Scripted checks run by the tester against a live engine.
use anyhow::{Context, Result, bail, ensure};
use std::path::PathBuf;
use tarotjack_game::constants::{MAP_KEY, PROGRESSION_KEY};
use tarotjack_game::{
    BossId, Coord, EncounterCatalog, EngineConfig, FileStorage, GameEngine, GameEvent,
    GameStorage, MemoryStorage, RecoveryOutcome, RoundOutcome, RunSession, SelectOutcome,
    StaticDataLoader,
};

use crate::logic::{AutoplayPolicy, Autoplayer};

/// Per-iteration inputs handed to a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub verbose: bool,
    /// Directory for file-backed saves; a temp dir is used when unset.
    pub save_dir: Option<PathBuf>,
}

impl ScenarioCtx {
    fn save_root(&self, label: &str) -> PathBuf {
        let base = self.save_dir.clone().unwrap_or_else(std::env::temp_dir);
        base.join(format!("tarotjack-{label}-{}-{}", self.seed, std::process::id()))
    }
}

pub type ScenarioFn = fn(&ScenarioCtx) -> Result<()>;

#[derive(Debug, Clone, Copy)]
pub struct TestScenario {
    pub name: &'static str,
    pub description: &'static str,
    pub run: ScenarioFn,
}

const SCENARIOS: &[TestScenario] = &[
    TestScenario {
        name: "smoke",
        description: "Boot a run and check the map entry rules",
        run: smoke,
    },
    TestScenario {
        name: "crash-recovery",
        description: "Abandon a fight mid-round and confirm the step is retracted",
        run: crash_recovery,
    },
    TestScenario {
        name: "game-over",
        description: "Lose every round and confirm a single game over",
        run: game_over,
    },
    TestScenario {
        name: "replay",
        description: "Re-enter a defeated minion without gaining progress",
        run: replay,
    },
    TestScenario {
        name: "file-persistence",
        description: "Resume a run from file-backed saves",
        run: file_persistence,
    },
    TestScenario {
        name: "full-act",
        description: "Autoplay through the first act boss",
        run: full_act,
    },
    TestScenario {
        name: "full-run",
        description: "Autoplay until the run completes or ends",
        run: full_run,
    },
];

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.iter().map(|s| (s.name, s.description)).collect()
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    SCENARIOS.iter().copied().find(|s| s.name == name)
}

#[must_use]
pub fn all_scenario_names() -> Vec<String> {
    SCENARIOS.iter().map(|s| s.name.to_string()).collect()
}

fn boot(storage: &MemoryStorage, seed: u64) -> Result<RunSession<MemoryStorage>> {
    GameEngine::new(StaticDataLoader, storage.clone()).boot(seed)
}

fn entry_coord<S: GameStorage>(session: &RunSession<S>) -> Result<Coord> {
    session
        .map()
        .and_then(|map| map.graph.nodes_in_layer(0).next())
        .map(|node| node.coord)
        .context("map has no entry nodes")
}

fn win_fight<S: GameStorage>(session: &mut RunSession<S>) -> Result<()> {
    for _ in 0..64 {
        if let RoundOutcome::Completed(done) = session.report_round_outcome(true, 0.0)? {
            ensure!(done.won, "fight completed as a loss");
            return Ok(());
        }
    }
    bail!("fight did not complete")
}

fn smoke(ctx: &ScenarioCtx) -> Result<()> {
    let storage = MemoryStorage::new();
    let mut session = boot(&storage, ctx.seed)?;
    ensure!(storage.contains(MAP_KEY), "map document was not saved");
    ensure!(storage.contains(PROGRESSION_KEY), "progression was not saved");

    let map = session.map().context("boot produced no map")?;
    let boss = map.stage_boss_node().context("map has no stage boss")?;
    ensure!(
        boss.blueprint_name == BossId::Dealer.as_str(),
        "first map boss is {}",
        boss.blueprint_name
    );
    let deep = map
        .graph
        .nodes()
        .find(|node| node.coord.layer() > 0)
        .map(|node| node.coord)
        .context("map has a single layer")?;
    ensure!(
        matches!(session.select_node(deep)?, SelectOutcome::Denied(_)),
        "entered {deep} on an empty path"
    );
    let entry = entry_coord(&session)?;
    ensure!(
        session.select_node(entry)? == SelectOutcome::EncounterStarted { replay: false },
        "layer 0 minion did not start a fight"
    );
    Ok(())
}

fn crash_recovery(ctx: &ScenarioCtx) -> Result<()> {
    let storage = MemoryStorage::new();
    let mut session = boot(&storage, ctx.seed)?;
    let entry = entry_coord(&session)?;
    session.select_node(entry)?;
    session.report_round_outcome(false, 1.0)?;
    drop(session);

    let resumed = boot(&storage, ctx.seed)?;
    let map = resumed.map().context("resumed run has no map")?;
    ensure!(map.path().is_empty(), "interrupted step still in path");
    ensure!(
        resumed.progression().pending_node_point().is_none(),
        "pending marker survived recovery"
    );
    ensure!(
        (resumed.progression().player_health() - (resumed.progression().max_health() - 1.0)).abs()
            < f32::EPSILON,
        "damage taken before the crash was lost"
    );

    let mut direct = RunSession::open(
        storage.clone(),
        EncounterCatalog::load_from_static(),
        EngineConfig::default(),
        ctx.seed,
    )?;
    direct.select_node(entry)?;
    drop(direct);
    let mut again = RunSession::open(
        storage,
        EncounterCatalog::load_from_static(),
        EngineConfig::default(),
        ctx.seed,
    )?;
    let outcome = again.enter_map()?.recovery;
    ensure!(
        outcome == RecoveryOutcome::Retracted(entry),
        "expected retraction of {entry}, got {outcome:?}"
    );
    Ok(())
}

fn game_over(ctx: &ScenarioCtx) -> Result<()> {
    let storage = MemoryStorage::new();
    let mut session = boot(&storage, ctx.seed)?;
    let entry = entry_coord(&session)?;
    session.select_node(entry)?;
    let mut outcome = RoundOutcome::Continue;
    for _ in 0..200 {
        outcome = session.report_round_outcome(false, 9.0)?;
        if outcome == RoundOutcome::GameOver {
            break;
        }
    }
    ensure!(outcome == RoundOutcome::GameOver, "health never ran out");
    ensure!(
        session.report_round_outcome(false, 9.0).is_err(),
        "encounter stayed active after game over"
    );
    session.damage_player(10.0)?;
    let overs = session
        .drain_events()
        .iter()
        .filter(|event| **event == GameEvent::GameOver)
        .count();
    ensure!(overs == 1, "game over fired {overs} times");
    ensure!(!storage.contains(MAP_KEY), "map survived game over");
    session.reset_progression()?;
    ensure!(
        session.progression().player_health() > 0.0,
        "reset did not restore health"
    );
    Ok(())
}

fn replay(ctx: &ScenarioCtx) -> Result<()> {
    let storage = MemoryStorage::new();
    let mut session = boot(&storage, ctx.seed)?;
    let entry = entry_coord(&session)?;
    session.select_node(entry)?;
    win_fight(&mut session)?;
    session.enter_map()?;
    let cleared = session.progression().defeated_node_instances().len();
    let path = session.map().map(|m| m.path().to_vec()).unwrap_or_default();

    ensure!(
        session.select_node(entry)? == SelectOutcome::EncounterStarted { replay: true },
        "defeated minion was not offered as a replay"
    );
    win_fight(&mut session)?;
    ensure!(
        session.progression().defeated_node_instances().len() == cleared,
        "replay counted as new progress"
    );
    let after = session.map().map(|m| m.path().to_vec()).unwrap_or_default();
    ensure!(after == path, "replay changed the path");
    Ok(())
}

fn file_persistence(ctx: &ScenarioCtx) -> Result<()> {
    let root = ctx.save_root("persist");
    let engine = GameEngine::new(StaticDataLoader, FileStorage::new(&root));
    let result = (|| -> Result<()> {
        let mut session = engine.boot(ctx.seed)?;
        let entry = entry_coord(&session)?;
        session.select_node(entry)?;
        win_fight(&mut session)?;
        let health = session.progression().player_health();
        let cleared = session.progression().defeated_node_instances().clone();
        drop(session);

        let resumed = engine.boot(ctx.seed)?;
        ensure!(
            resumed.progression().defeated_node_instances() == &cleared,
            "cleared nodes were not persisted"
        );
        ensure!(
            (resumed.progression().player_health() - health).abs() < f32::EPSILON,
            "health was not persisted"
        );
        let path = resumed.map().map(|m| m.path().to_vec()).unwrap_or_default();
        ensure!(path == vec![entry], "path was not persisted: {path:?}");
        Ok(())
    })();
    if ctx.save_dir.is_none() {
        let _ = std::fs::remove_dir_all(&root);
    }
    result
}

fn full_act(ctx: &ScenarioCtx) -> Result<()> {
    let storage = MemoryStorage::new();
    let mut session = RunSession::open(
        storage,
        EncounterCatalog::load_from_static(),
        EngineConfig::default(),
        ctx.seed,
    )?;
    let policy = AutoplayPolicy {
        round_win_chance: 1.0,
        ..AutoplayPolicy::default()
    };
    let summary = Autoplayer::new(ctx.seed, policy).play(&mut session, 1)?;
    if ctx.verbose {
        println!("     ↳ {summary:?}");
    }
    ensure!(summary.acts_cleared == 1, "act not cleared: {summary:?}");
    ensure!(
        session.progression().current_act_boss() == BossId::Magician,
        "act pointer did not advance"
    );
    let map = session.map().context("no map after act clear")?;
    ensure!(
        map.stage_boss_node()
            .is_some_and(|boss| boss.blueprint_name == BossId::Magician.as_str()),
        "next map is not for the second act"
    );
    Ok(())
}

fn full_run(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = RunSession::open(
        MemoryStorage::new(),
        EncounterCatalog::load_from_static(),
        EngineConfig::default(),
        ctx.seed,
    )?;
    let summary = Autoplayer::new(ctx.seed, AutoplayPolicy::default()).play(&mut session, 0)?;
    if ctx.verbose {
        println!("     ↳ {summary:?}");
    }
    ensure!(
        summary.run_completed || summary.game_over || summary.steps > 0,
        "autoplay made no progress"
    );
    let progression = session.progression();
    ensure!(
        progression
            .defeated_bosses()
            .is_subset(progression.unlocked_bosses()),
        "a defeated boss is not unlocked"
    );
    ensure!(
        (0.0..=progression.max_health()).contains(&progression.player_health()),
        "health out of range"
    );
    if summary.game_over {
        ensure!(progression.is_game_over(), "game over not latched");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(seed: u64) -> ScenarioCtx {
        ScenarioCtx {
            seed,
            verbose: false,
            save_dir: None,
        }
    }

    #[test]
    fn every_scenario_passes_on_a_fixed_seed() {
        for scenario in SCENARIOS {
            (scenario.run)(&ctx(1337)).unwrap_or_else(|err| panic!("{}: {err:#}", scenario.name));
        }
    }

    #[test]
    fn lookup_by_name() {
        assert!(get_scenario("smoke").is_some());
        assert!(get_scenario("nope").is_none());
        assert_eq!(list_scenarios().len(), all_scenario_names().len());
    }
}
