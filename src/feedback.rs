use crate::ranking::Rating;

/// Advisory feedback emitted at notable points of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    RoundStart,
    CueShown,
    Reaction(Rating),
    FalseStart,
}

impl Feedback {
    /// Alternating on/off pulse durations in milliseconds.
    pub fn pattern(&self) -> &'static [u64] {
        match self {
            Feedback::RoundStart => &[50],
            Feedback::CueShown => &[100],
            Feedback::Reaction(Rating::Superhuman) => &[100, 50, 100, 50, 100],
            Feedback::Reaction(Rating::VeryFast) => &[100, 50, 100],
            Feedback::Reaction(_) => &[100],
            Feedback::FalseStart => &[300],
        }
    }

    /// Number of pulses in the pattern
    pub fn pulses(&self) -> usize {
        self.pattern().len().div_ceil(2)
    }

    /// How many ticks the screen flash should last
    pub fn flash_ticks(&self, tick_ms: u64) -> u16 {
        let total: u64 = self.pattern().iter().sum();
        (total.div_ceil(tick_ms.max(1))).min(u16::MAX as u64) as u16
    }
}

/// Tracks feedback to be shown by the UI
#[derive(Debug, Default)]
pub struct FeedbackState {
    pub bell: bool,
    pub flash: Option<Feedback>,
    pub flash_ticks_left: u16,
    pending_bells: usize,
}

impl FeedbackState {
    pub fn new(bell: bool) -> Self {
        Self {
            bell,
            ..Default::default()
        }
    }

    pub fn trigger(&mut self, feedback: Feedback, tick_ms: u64) {
        log::trace!("feedback {:?}", feedback);
        self.flash = Some(feedback);
        self.flash_ticks_left = feedback.flash_ticks(tick_ms);
        if self.bell {
            self.pending_bells += feedback.pulses();
        }
    }

    pub fn on_tick(&mut self) {
        if self.flash_ticks_left > 0 {
            self.flash_ticks_left -= 1;
            if self.flash_ticks_left == 0 {
                self.flash = None;
            }
        }
    }

    pub fn active_flash(&self) -> Option<Feedback> {
        self.flash
    }

    /// Drains the bells the caller should ring now
    pub fn take_bells(&mut self) -> usize {
        std::mem::take(&mut self.pending_bells)
    }
}
