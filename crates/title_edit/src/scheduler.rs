/// Deferred work driven by the frame clock rather than by sleeping threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Show the "now displaying" toast if the title menu is visible by then.
    LoadToast { screen_name: String },
    /// Start hiding the title logo; `delay_ms` is the delay it was scheduled
    /// with, which decides whether the hide fades.
    HideLogo { delay_ms: u64 },
}

#[derive(Debug, Clone)]
struct Scheduled {
    due_ms: u64,
    seq: u64,
    action: DeferredAction,
}

#[derive(Debug, Default)]
pub struct DeferredScheduler {
    now_ms: u64,
    next_seq: u64,
    pending: Vec<Scheduled>,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn schedule(&mut self, delay_ms: u64, action: DeferredAction) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.pending.push(Scheduled {
            due_ms: self.now_ms.saturating_add(delay_ms),
            seq,
            action,
        });
    }

    /// Moves the clock forward and returns every action that came due, oldest
    /// deadline first, ties in scheduling order.
    pub fn advance(&mut self, dt_ms: u64) -> Vec<DeferredAction> {
        self.now_ms = self.now_ms.saturating_add(dt_ms);
        let now = self.now_ms;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|entry| entry.due_ms <= now);
        self.pending = pending;
        due.sort_by_key(|entry| (entry.due_ms, entry.seq));
        due.into_iter().map(|entry| entry.action).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_fire_once_their_deadline_passes() {
        let mut scheduler = DeferredScheduler::new();
        scheduler.schedule(2_000, DeferredAction::HideLogo { delay_ms: 2_000 });

        assert!(scheduler.advance(1_999).is_empty());
        assert_eq!(
            scheduler.advance(1),
            vec![DeferredAction::HideLogo { delay_ms: 2_000 }]
        );
        assert!(scheduler.advance(10_000).is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn due_actions_come_back_in_deadline_then_schedule_order() {
        let mut scheduler = DeferredScheduler::new();
        let toast = |name: &str| DeferredAction::LoadToast {
            screen_name: name.to_string(),
        };
        scheduler.schedule(30, toast("late"));
        scheduler.schedule(10, toast("first"));
        scheduler.schedule(10, toast("second"));

        assert_eq!(
            scheduler.advance(50),
            vec![toast("first"), toast("second"), toast("late")]
        );
        assert_eq!(scheduler.now_ms(), 50);
    }
}
