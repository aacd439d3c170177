//! Single-shot deferred actions with cancellation tokens.
//!
//! Replaces engine-style `Invoke`/`CancelInvoke`: scheduling returns a token,
//! and cancelling with that token removes the entry before the next `tick`
//! can fire it. Used for the rag-doll animator-stop hand-off.

/// Handle returned by [`DeferredActions::schedule`]. Tokens are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionToken(u64);

struct Entry<A> {
    token: ActionToken,
    remaining: f32,
    action: A,
}

/// A small queue of pending single-shot actions, ticked by its owner.
///
/// Owned per character (no cross-character sharing), so cancellation is
/// atomic with respect to that character's next tick by construction.
#[derive(Default)]
pub struct DeferredActions<A> {
    entries: Vec<Entry<A>>,
    next_token: u64,
}

impl<A> DeferredActions<A> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_token: 0,
        }
    }

    /// Schedule `action` to fire once after `delay` seconds.
    pub fn schedule(&mut self, delay: f32, action: A) -> ActionToken {
        let token = ActionToken(self.next_token);
        self.next_token += 1;
        self.entries.push(Entry {
            token,
            remaining: delay,
            action,
        });
        token
    }

    /// Remove a pending entry. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, token: ActionToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.token != token);
        self.entries.len() != before
    }

    pub fn is_pending(&self, token: ActionToken) -> bool {
        self.entries.iter().any(|e| e.token == token)
    }

    /// Advance all pending entries by `dt` and return the actions that fired,
    /// in the order they were scheduled.
    pub fn tick(&mut self, dt: f32) -> Vec<A> {
        for entry in &mut self.entries {
            entry.remaining -= dt;
        }
        let mut fired = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].remaining <= 0.0 {
                fired.push(self.entries.remove(i).action);
            } else {
                i += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_delay() {
        let mut actions = DeferredActions::new();
        actions.schedule(0.05, "stop");

        assert!(actions.tick(0.03).is_empty());
        assert_eq!(actions.tick(0.03), vec!["stop"]);
        assert!(actions.tick(1.0).is_empty());
    }

    #[test]
    fn test_cancel_removes_before_fire() {
        let mut actions = DeferredActions::new();
        let token = actions.schedule(0.05, "stop");

        assert!(actions.cancel(token));
        assert!(actions.tick(1.0).is_empty());
        // Second cancel is a no-op.
        assert!(!actions.cancel(token));
    }

    #[test]
    fn test_tokens_are_unique_across_reschedules() {
        let mut actions = DeferredActions::new();
        let first = actions.schedule(0.05, 1);
        actions.cancel(first);
        let second = actions.schedule(0.05, 2);

        assert_ne!(first, second);
        // The stale token must not cancel the new entry.
        assert!(!actions.cancel(first));
        assert!(actions.is_pending(second));
        assert_eq!(actions.tick(0.1), vec![2]);
    }

    #[test]
    fn test_multiple_entries_fire_in_schedule_order() {
        let mut actions = DeferredActions::new();
        actions.schedule(0.02, "a");
        actions.schedule(0.01, "b");

        assert_eq!(actions.tick(0.05), vec!["a", "b"]);
    }
}
