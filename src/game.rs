use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    feedback::Feedback,
    ranking::{classify_time, RankingEntry, Rankings},
};

/// Shortest wait before the cue, inclusive
pub const MIN_DELAY_MS: u64 = 1000;
/// Longest wait before the cue, exclusive
pub const MAX_DELAY_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum GameState {
    Idle,
    Waiting,
    Ready,
    Finished,
}

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Success(u64),
    FalseStart,
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Start,
    CueElapsed { generation: u64 },
    React,
    Reset,
    ClearRankings { confirmed: bool },
}

/// Work the caller has to carry out after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ScheduleCue { delay: Duration, generation: u64 },
    CancelCue,
    PersistRankings,
    RemoveRankings,
    Feedback(Feedback),
}

/// A point in time as seen by both the monotonic and the wall clock
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    pub instant: Instant,
    pub wall: DateTime<Utc>,
}

impl Moment {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Utc::now(),
        }
    }

    pub fn after(&self, d: Duration) -> Self {
        Self {
            instant: self.instant + d,
            wall: self.wall + chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Round {
    started_at: Option<Instant>,
    outcome: Option<RoundOutcome>,
}

/// Samples the wait before the cue, uniformly in [MIN_DELAY_MS, MAX_DELAY_MS)
pub fn sample_delay<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(MIN_DELAY_MS..MAX_DELAY_MS))
}

/// Reaction game controller: owns the round state and the leaderboard
#[derive(Debug)]
pub struct Game {
    state: GameState,
    round: Round,
    generation: u64,
    rankings: Rankings,
    current_rank: Option<usize>,
    rng: StdRng,
}

impl Game {
    pub fn new(rankings: Rankings) -> Self {
        Self::with_rng(rankings, StdRng::from_entropy())
    }

    pub fn with_rng(rankings: Rankings, rng: StdRng) -> Self {
        Self {
            state: GameState::Idle,
            round: Round::default(),
            generation: 0,
            rankings,
            current_rank: None,
            rng,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.round.outcome
    }

    /// Reaction time of the latest round, if it was not a false start
    pub fn reaction_time_ms(&self) -> Option<u64> {
        match self.round.outcome {
            Some(RoundOutcome::Success(ms)) => Some(ms),
            _ => None,
        }
    }

    pub fn rankings(&self) -> &Rankings {
        &self.rankings
    }

    /// 1-based leaderboard position of the latest round, if it made the list
    pub fn current_rank(&self) -> Option<usize> {
        self.current_rank
    }

    pub fn is_new_best(&self) -> bool {
        self.current_rank == Some(1)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advances the state machine and returns the effects to perform, in order.
    pub fn apply(&mut self, event: GameEvent, now: Moment) -> Vec<Effect> {
        let before = self.state;
        let effects = match event {
            GameEvent::Start => self.on_start(),
            GameEvent::CueElapsed { generation } => self.on_cue(generation, now),
            GameEvent::React => self.on_react(now),
            GameEvent::Reset => self.on_reset(),
            GameEvent::ClearRankings { confirmed } => self.on_clear(confirmed),
        };
        if before != self.state {
            log::debug!("{:?}: {} -> {}", event, before, self.state);
        }
        effects
    }

    pub fn start_game(&mut self) -> Vec<Effect> {
        self.apply(GameEvent::Start, Moment::now())
    }

    pub fn cue_elapsed(&mut self, generation: u64) -> Vec<Effect> {
        self.apply(GameEvent::CueElapsed { generation }, Moment::now())
    }

    pub fn handle_reaction(&mut self) -> Vec<Effect> {
        self.apply(GameEvent::React, Moment::now())
    }

    pub fn reset_game(&mut self) -> Vec<Effect> {
        self.apply(GameEvent::Reset, Moment::now())
    }

    pub fn clear_rankings(&mut self, confirmed: bool) -> Vec<Effect> {
        self.apply(GameEvent::ClearRankings { confirmed }, Moment::now())
    }

    fn on_start(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.round = Round::default();
        self.current_rank = None;
        self.state = GameState::Waiting;

        let delay = sample_delay(&mut self.rng);
        log::debug!("round {} cue in {}ms", self.generation, delay.as_millis());
        vec![
            Effect::CancelCue,
            Effect::ScheduleCue {
                delay,
                generation: self.generation,
            },
            Effect::Feedback(Feedback::RoundStart),
        ]
    }

    fn on_cue(&mut self, generation: u64, now: Moment) -> Vec<Effect> {
        if self.state != GameState::Waiting || generation != self.generation {
            log::trace!("ignoring stale cue {} (current {})", generation, self.generation);
            return vec![];
        }
        self.state = GameState::Ready;
        self.round.started_at = Some(now.instant);
        vec![Effect::Feedback(Feedback::CueShown)]
    }

    fn on_react(&mut self, now: Moment) -> Vec<Effect> {
        match self.state {
            GameState::Ready => {
                let elapsed = self
                    .round
                    .started_at
                    .map(|start| now.instant.saturating_duration_since(start))
                    .unwrap_or_default();
                let time_ms = elapsed.as_millis().min(u64::MAX as u128) as u64;

                self.round.outcome = Some(RoundOutcome::Success(time_ms));
                self.state = GameState::Finished;
                self.current_rank = self.rankings.insert(RankingEntry::new(time_ms, now.wall));

                vec![
                    Effect::PersistRankings,
                    Effect::Feedback(Feedback::Reaction(classify_time(time_ms))),
                ]
            }
            GameState::Waiting => {
                self.round.outcome = Some(RoundOutcome::FalseStart);
                self.round.started_at = None;
                self.state = GameState::Idle;
                vec![Effect::CancelCue, Effect::Feedback(Feedback::FalseStart)]
            }
            GameState::Idle | GameState::Finished => vec![],
        }
    }

    fn on_reset(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.state = GameState::Idle;
        self.round = Round::default();
        self.current_rank = None;
        vec![Effect::CancelCue]
    }

    fn on_clear(&mut self, confirmed: bool) -> Vec<Effect> {
        if !confirmed {
            return vec![];
        }
        self.rankings.clear();
        self.current_rank = None;
        vec![Effect::RemoveRankings]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn game() -> Game {
        Game::with_rng(Rankings::new(), StdRng::seed_from_u64(7))
    }

    fn scheduled(effects: &[Effect]) -> (Duration, u64) {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::ScheduleCue { delay, generation } => Some((*delay, *generation)),
                _ => None,
            })
            .expect("start should schedule a cue")
    }

    /// Runs a full round and reacts `reaction` after the cue.
    fn play(game: &mut Game, t0: Moment, reaction: Duration) -> Vec<Effect> {
        let (delay, generation) = scheduled(&game.apply(GameEvent::Start, t0));
        let cue = t0.after(delay);
        game.apply(GameEvent::CueElapsed { generation }, cue);
        game.apply(GameEvent::React, cue.after(reaction))
    }

    #[test]
    fn delay_is_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let d = sample_delay(&mut rng).as_millis() as u64;
            assert!((MIN_DELAY_MS..MAX_DELAY_MS).contains(&d));
        }
    }

    #[test]
    fn starts_idle() {
        let g = game();
        assert_eq!(g.state(), GameState::Idle);
        assert_eq!(g.outcome(), None);
        assert!(g.rankings().is_empty());
    }

    #[test]
    fn start_moves_to_waiting_and_schedules_cue() {
        let mut g = game();
        let effects = g.apply(GameEvent::Start, Moment::now());
        assert_eq!(g.state(), GameState::Waiting);
        assert_eq!(effects[0], Effect::CancelCue);
        let (delay, generation) = scheduled(&effects);
        assert_eq!(generation, g.generation());
        assert!(delay >= Duration::from_millis(MIN_DELAY_MS));
        assert!(effects.contains(&Effect::Feedback(Feedback::RoundStart)));
    }

    #[test]
    fn cue_moves_to_ready() {
        let mut g = game();
        let t0 = Moment::now();
        let (delay, generation) = scheduled(&g.apply(GameEvent::Start, t0));
        let effects = g.apply(GameEvent::CueElapsed { generation }, t0.after(delay));
        assert_eq!(g.state(), GameState::Ready);
        assert_eq!(effects, vec![Effect::Feedback(Feedback::CueShown)]);
    }

    #[test]
    fn reacting_when_ready_records_time() {
        let mut g = game();
        let effects = play(&mut g, Moment::now(), Duration::from_millis(250));
        assert_eq!(g.state(), GameState::Finished);
        assert_eq!(g.outcome(), Some(RoundOutcome::Success(250)));
        assert_eq!(g.reaction_time_ms(), Some(250));
        assert_eq!(g.rankings().len(), 1);
        assert_eq!(g.rankings().entries()[0].time_ms, 250);
        assert_eq!(g.current_rank(), Some(1));
        assert!(g.is_new_best());
        assert!(effects.contains(&Effect::PersistRankings));
        assert_matches!(
            effects.last(),
            Some(Effect::Feedback(Feedback::Reaction(crate::ranking::Rating::VeryFast)))
        );
    }

    #[test]
    fn instant_reaction_is_zero() {
        let mut g = game();
        play(&mut g, Moment::now(), Duration::ZERO);
        assert_eq!(g.outcome(), Some(RoundOutcome::Success(0)));
    }

    #[test]
    fn reacting_early_is_a_false_start() {
        let mut g = game();
        let t0 = Moment::now();
        g.apply(GameEvent::Start, t0);
        let effects = g.apply(GameEvent::React, t0.after(Duration::from_millis(300)));
        assert_eq!(g.state(), GameState::Idle);
        assert_eq!(g.outcome(), Some(RoundOutcome::FalseStart));
        assert_eq!(g.reaction_time_ms(), None);
        assert!(g.rankings().is_empty());
        assert_eq!(
            effects,
            vec![Effect::CancelCue, Effect::Feedback(Feedback::FalseStart)]
        );
    }

    #[test]
    fn cue_after_false_start_is_ignored() {
        let mut g = game();
        let t0 = Moment::now();
        let (delay, generation) = scheduled(&g.apply(GameEvent::Start, t0));
        g.apply(GameEvent::React, t0);
        let effects = g.apply(GameEvent::CueElapsed { generation }, t0.after(delay));
        assert!(effects.is_empty());
        assert_eq!(g.state(), GameState::Idle);
    }

    #[test]
    fn reacting_when_idle_or_finished_is_ignored() {
        let mut g = game();
        assert!(g.apply(GameEvent::React, Moment::now()).is_empty());
        assert_eq!(g.state(), GameState::Idle);
        assert_eq!(g.outcome(), None);

        play(&mut g, Moment::now(), Duration::from_millis(180));
        let snapshot = g.rankings().clone();
        assert!(g.apply(GameEvent::React, Moment::now()).is_empty());
        assert_eq!(g.state(), GameState::Finished);
        assert_eq!(g.rankings(), &snapshot);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut g = game();
        play(&mut g, Moment::now(), Duration::from_millis(320));
        let snapshot = g.rankings().clone();

        assert_eq!(g.apply(GameEvent::Reset, Moment::now()), vec![Effect::CancelCue]);
        assert_eq!(g.state(), GameState::Idle);
        assert_eq!(g.outcome(), None);
        g.apply(GameEvent::Reset, Moment::now());
        assert_eq!(g.state(), GameState::Idle);
        assert_eq!(g.rankings(), &snapshot);
    }

    #[test]
    fn stale_cue_after_reset_is_ignored() {
        let mut g = game();
        let t0 = Moment::now();
        let (delay, generation) = scheduled(&g.apply(GameEvent::Start, t0));
        g.apply(GameEvent::Reset, t0);
        assert!(g
            .apply(GameEvent::CueElapsed { generation }, t0.after(delay))
            .is_empty());
        assert_eq!(g.state(), GameState::Idle);
    }

    #[test]
    fn restarting_while_waiting_replaces_the_cue() {
        let mut g = game();
        let t0 = Moment::now();
        let (_, first) = scheduled(&g.apply(GameEvent::Start, t0));
        let effects = g.apply(GameEvent::Start, t0);
        let (_, second) = scheduled(&effects);
        assert_eq!(effects[0], Effect::CancelCue);
        assert_ne!(first, second);

        assert!(g.apply(GameEvent::CueElapsed { generation: first }, t0).is_empty());
        assert_eq!(g.state(), GameState::Waiting);
        g.apply(GameEvent::CueElapsed { generation: second }, t0);
        assert_eq!(g.state(), GameState::Ready);
    }

    #[test]
    fn retry_from_finished_clears_previous_outcome() {
        let mut g = game();
        play(&mut g, Moment::now(), Duration::from_millis(400));
        g.apply(GameEvent::Start, Moment::now());
        assert_eq!(g.state(), GameState::Waiting);
        assert_eq!(g.outcome(), None);
        assert_eq!(g.current_rank(), None);
    }

    #[test]
    fn full_board_drops_slowest() {
        let rankings = Rankings::from_entries(
            (1..=10)
                .map(|i| RankingEntry::new(i * 100, Utc::now()))
                .collect(),
        );
        let mut g = Game::with_rng(rankings, StdRng::seed_from_u64(1));
        play(&mut g, Moment::now(), Duration::from_millis(50));
        let times: Vec<u64> = g.rankings().iter().map(|e| e.time_ms).collect();
        assert_eq!(times, vec![50, 100, 200, 300, 400, 500, 600, 700, 800, 900]);
    }

    #[test]
    fn slow_round_outside_top_ten_has_no_rank() {
        let rankings = Rankings::from_entries(
            (1..=10)
                .map(|i| RankingEntry::new(i * 10, Utc::now()))
                .collect(),
        );
        let mut g = Game::with_rng(rankings, StdRng::seed_from_u64(1));
        let effects = play(&mut g, Moment::now(), Duration::from_millis(700));
        assert_eq!(g.outcome(), Some(RoundOutcome::Success(700)));
        assert_eq!(g.current_rank(), None);
        assert_eq!(g.rankings().len(), 10);
        assert!(effects.contains(&Effect::PersistRankings));
    }

    #[test]
    fn named_operations_drive_a_round() {
        let mut g = game();
        let effects = g.start_game();
        let (_, generation) = scheduled(&effects);
        assert_eq!(g.state(), GameState::Waiting);

        assert!(g.cue_elapsed(generation + 1).is_empty());
        assert_eq!(g.cue_elapsed(generation), vec![Effect::Feedback(Feedback::CueShown)]);
        assert_eq!(g.state(), GameState::Ready);

        assert!(g.handle_reaction().contains(&Effect::PersistRankings));
        assert_eq!(g.state(), GameState::Finished);
        assert_eq!(g.rankings().len(), 1);

        assert_eq!(g.reset_game(), vec![Effect::CancelCue]);
        assert_eq!(g.state(), GameState::Idle);

        assert!(g.clear_rankings(false).is_empty());
        assert_eq!(g.clear_rankings(true), vec![Effect::RemoveRankings]);
        assert!(g.rankings().is_empty());
    }

    #[test]
    fn clear_requires_confirmation() {
        let mut g = game();
        play(&mut g, Moment::now(), Duration::from_millis(210));

        assert!(g
            .apply(GameEvent::ClearRankings { confirmed: false }, Moment::now())
            .is_empty());
        assert_eq!(g.rankings().len(), 1);

        let effects = g.apply(GameEvent::ClearRankings { confirmed: true }, Moment::now());
        assert_eq!(effects, vec![Effect::RemoveRankings]);
        assert!(g.rankings().is_empty());
        assert_eq!(g.current_rank(), None);
    }
}
