use std::sync::mpsc::Sender;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::{
    config::Config,
    feedback::FeedbackState,
    game::{Effect, Game, GameEvent, GameState, Moment},
    runtime::FlinchEvent,
    store::RankingStore,
    timer::CueTimer,
};

/// Tick rate of the event loop; also the resolution of screen flashes
pub const TICK_RATE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Playing,
    ConfirmClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    pub game: Game,
    pub state: AppState,
    pub config: Config,
    pub feedback: FeedbackState,
    store: Box<dyn RankingStore>,
    timer: CueTimer,
    events: Sender<FlinchEvent>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("game", &self.game)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn new(config: Config, store: Box<dyn RankingStore>, events: Sender<FlinchEvent>) -> Self {
        let rankings = store.load();
        log::info!("loaded {} ranking entries", rankings.len());
        Self::with_game(Game::new(rankings), config, store, events)
    }

    pub fn with_game(
        game: Game,
        config: Config,
        store: Box<dyn RankingStore>,
        events: Sender<FlinchEvent>,
    ) -> Self {
        Self {
            feedback: FeedbackState::new(config.bell),
            game,
            state: AppState::Playing,
            config,
            store,
            timer: CueTimer::new(),
            events,
        }
    }

    pub fn cue_pending(&self) -> bool {
        self.timer.is_armed()
    }

    /// Feeds one runtime event through the app
    pub fn on_event(&mut self, event: FlinchEvent) -> Control {
        match event {
            FlinchEvent::Key(key) => return self.on_key(key),
            FlinchEvent::Tick => self.feedback.on_tick(),
            FlinchEvent::Resize => {}
            FlinchEvent::Cue(generation) => {
                self.timer.fired(generation);
                self.dispatch(GameEvent::CueElapsed { generation });
            }
        }
        Control::Continue
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        match self.state {
            AppState::ConfirmClear => {
                let confirmed = matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'));
                self.dispatch(GameEvent::ClearRankings { confirmed });
                self.state = AppState::Playing;
            }
            AppState::Playing => match key.code {
                KeyCode::Esc => return Control::Quit,
                KeyCode::Char(' ') | KeyCode::Enter => match self.game.state() {
                    GameState::Idle | GameState::Finished => self.dispatch(GameEvent::Start),
                    GameState::Waiting | GameState::Ready => self.dispatch(GameEvent::React),
                },
                KeyCode::Char('r') => self.dispatch(GameEvent::Reset),
                KeyCode::Char('c') => self.request_clear(),
                _ => {}
            },
        }
        Control::Continue
    }

    fn request_clear(&mut self) {
        // leaving a round running under the modal would make the cue unanswerable
        if matches!(self.game.state(), GameState::Waiting | GameState::Ready)
            || self.game.rankings().is_empty()
        {
            return;
        }
        if self.config.confirm_clear {
            self.state = AppState::ConfirmClear;
        } else {
            self.dispatch(GameEvent::ClearRankings { confirmed: true });
        }
    }

    pub fn dispatch(&mut self, event: GameEvent) {
        let effects = self.game.apply(event, Moment::now());
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ScheduleCue { delay, generation } => {
                    self.timer.arm(delay, generation, self.events.clone())
                }
                Effect::CancelCue => self.timer.cancel(),
                Effect::PersistRankings => {
                    if let Err(e) = self.store.save(self.game.rankings()) {
                        log::error!("failed to save rankings: {}", e);
                    }
                }
                Effect::RemoveRankings => {
                    if let Err(e) = self.store.clear() {
                        log::error!("failed to remove rankings: {}", e);
                    }
                }
                Effect::Feedback(feedback) => self.feedback.trigger(feedback, TICK_RATE_MS),
            }
        }
    }

    pub fn take_bells(&mut self) -> usize {
        self.feedback.take_bells()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::RoundOutcome;
    use crate::ranking::{RankingEntry, Rankings};
    use crate::store::MemoryRankingStore;
    use chrono::Utc;
    use std::sync::mpsc;
    use std::time::Duration;

    fn key(code: KeyCode) -> FlinchEvent {
        FlinchEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn quiet() -> Config {
        Config {
            bell: false,
            ..Config::default()
        }
    }

    fn app_with(store: MemoryRankingStore) -> (App, mpsc::Receiver<FlinchEvent>) {
        let (tx, rx) = mpsc::channel();
        (App::new(quiet(), Box::new(store), tx), rx)
    }

    fn seeded_store() -> MemoryRankingStore {
        let store = MemoryRankingStore::new();
        store
            .save(&Rankings::from_entries(vec![RankingEntry::new(333, Utc::now())]))
            .unwrap();
        store
    }

    #[test]
    fn loads_rankings_from_store() {
        let (app, _rx) = app_with(seeded_store());
        assert_eq!(app.game.rankings().len(), 1);
    }

    #[test]
    fn corrupt_store_starts_empty() {
        let (app, _rx) = app_with(MemoryRankingStore::with_raw("not json"));
        assert!(app.game.rankings().is_empty());
        assert_eq!(app.game.state(), GameState::Idle);
    }

    #[test]
    fn space_starts_and_arms_cue() {
        let (mut app, _rx) = app_with(MemoryRankingStore::new());
        assert_eq!(app.on_event(key(KeyCode::Char(' '))), Control::Continue);
        assert_eq!(app.game.state(), GameState::Waiting);
        assert!(app.cue_pending());
    }

    #[test]
    fn early_key_is_false_start_and_disarms() {
        let (mut app, _rx) = app_with(MemoryRankingStore::new());
        app.on_event(key(KeyCode::Enter));
        app.on_event(key(KeyCode::Enter));
        assert_eq!(app.game.state(), GameState::Idle);
        assert_eq!(app.game.outcome(), Some(RoundOutcome::FalseStart));
        assert!(!app.cue_pending());
    }

    #[test]
    fn cue_then_key_finishes_round() {
        let (mut app, _rx) = app_with(MemoryRankingStore::new());
        app.on_event(key(KeyCode::Char(' ')));
        let generation = app.game.generation();
        app.on_event(FlinchEvent::Cue(generation));
        assert_eq!(app.game.state(), GameState::Ready);
        std::thread::sleep(Duration::from_millis(5));
        app.on_event(key(KeyCode::Char(' ')));
        assert_eq!(app.game.state(), GameState::Finished);
        assert!(app.game.reaction_time_ms().is_some());
        assert_eq!(app.game.rankings().len(), 1);
    }

    #[test]
    fn real_timer_delivers_cue() {
        let (mut app, rx) = app_with(MemoryRankingStore::new());
        app.on_event(key(KeyCode::Char(' ')));
        match rx.recv_timeout(Duration::from_secs(6)) {
            Ok(ev @ FlinchEvent::Cue(_)) => {
                app.on_event(ev);
            }
            other => panic!("expected cue, got {:?}", other),
        }
        assert_eq!(app.game.state(), GameState::Ready);
    }

    #[test]
    fn stale_cue_does_not_disarm_live_round() {
        let (mut app, rx) = app_with(MemoryRankingStore::new());
        app.on_event(key(KeyCode::Char(' ')));
        let stale = app.game.generation();
        app.on_event(key(KeyCode::Char('r')));
        app.on_event(key(KeyCode::Char(' ')));
        let live = app.game.generation();
        assert_ne!(stale, live);

        app.on_event(FlinchEvent::Cue(stale));
        assert_eq!(app.game.state(), GameState::Waiting);
        assert!(app.cue_pending());

        match rx.recv_timeout(Duration::from_secs(6)) {
            Ok(FlinchEvent::Cue(generation)) => {
                assert_eq!(generation, live);
                app.on_event(FlinchEvent::Cue(generation));
            }
            other => panic!("expected live cue, got {:?}", other),
        }
        assert_eq!(app.game.state(), GameState::Ready);
        assert!(!app.cue_pending());
    }

    #[test]
    fn clear_asks_first() {
        let (mut app, _rx) = app_with(seeded_store());
        app.on_event(key(KeyCode::Char('c')));
        assert_eq!(app.state, AppState::ConfirmClear);
        app.on_event(key(KeyCode::Char('n')));
        assert_eq!(app.state, AppState::Playing);
        assert_eq!(app.game.rankings().len(), 1);

        app.on_event(key(KeyCode::Char('c')));
        app.on_event(key(KeyCode::Char('y')));
        assert!(app.game.rankings().is_empty());
    }

    #[test]
    fn clear_without_confirmation_when_disabled() {
        let (tx, _rx) = mpsc::channel();
        let config = Config {
            confirm_clear: false,
            ..quiet()
        };
        let mut app = App::new(config, Box::new(seeded_store()), tx);
        app.on_event(key(KeyCode::Char('c')));
        assert_eq!(app.state, AppState::Playing);
        assert!(app.game.rankings().is_empty());
    }

    #[test]
    fn clear_is_ignored_mid_round() {
        let (mut app, _rx) = app_with(seeded_store());
        app.on_event(key(KeyCode::Char(' ')));
        app.on_event(key(KeyCode::Char('c')));
        assert_eq!(app.state, AppState::Playing);
        assert_eq!(app.game.rankings().len(), 1);
    }

    #[test]
    fn esc_quits_but_cancels_modal_first() {
        let (mut app, _rx) = app_with(seeded_store());
        app.on_event(key(KeyCode::Char('c')));
        assert_eq!(app.on_event(key(KeyCode::Esc)), Control::Continue);
        assert_eq!(app.state, AppState::Playing);
        assert_eq!(app.on_event(key(KeyCode::Esc)), Control::Quit);
    }

    #[test]
    fn ctrl_c_quits() {
        let (mut app, _rx) = app_with(MemoryRankingStore::new());
        let ev = FlinchEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(app.on_event(ev), Control::Quit);
    }

    #[test]
    fn bells_follow_config() {
        let (tx, _rx) = mpsc::channel();
        let mut app = App::new(Config::default(), Box::new(MemoryRankingStore::new()), tx);
        app.on_event(key(KeyCode::Char(' ')));
        assert_eq!(app.take_bells(), 1);

        let (mut quiet_app, _rx) = app_with(MemoryRankingStore::new());
        quiet_app.on_event(key(KeyCode::Char(' ')));
        assert_eq!(quiet_app.take_bells(), 0);
    }
}
