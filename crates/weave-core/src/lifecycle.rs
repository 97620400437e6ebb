use std::cell::Cell;
use std::rc::Rc;

/// Lifecycle of a component instance.
///
/// `Moved` is held between a removal and the deferred check that decides
/// whether the host came back (a move) or stayed out (a disconnection).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Unattached,
    Connecting,
    Initializing,
    Idle,
    Updating,
    Moved,
    Disconnected,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Unattached, Connecting)
                | (Connecting, Initializing)
                | (Connecting, Idle)
                | (Initializing, Idle)
                | (Idle, Updating)
                | (Updating, Idle)
                | (Idle, Moved)
                | (Updating, Moved)
                | (Initializing, Moved)
                | (Moved, Idle)
                | (Moved, Disconnected)
                | (Idle, Disconnected)
                | (Updating, Disconnected)
        )
    }

    pub fn is_live(self) -> bool {
        !matches!(self, LifecycleState::Disconnected | LifecycleState::Unattached)
    }
}

/// Cancels a deferred disconnection check.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moved_returns_to_idle_or_disconnects() {
        assert!(LifecycleState::Idle.can_transition_to(LifecycleState::Moved));
        assert!(LifecycleState::Moved.can_transition_to(LifecycleState::Idle));
        assert!(LifecycleState::Moved.can_transition_to(LifecycleState::Disconnected));
        assert!(!LifecycleState::Disconnected.can_transition_to(LifecycleState::Idle));
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let check = token.clone();
        token.cancel();
        assert!(check.is_cancelled());
    }
}
