//! Visibility-driven frame loop state.
//!
//! Two independent inputs, "surface intersects the viewport" and "tab is
//! visible", are ANDed. The loop runs only while both hold.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Never started, or disposed.
    Stopped,
    Running,
    /// Started before, currently off-screen or in a hidden tab.
    Suspended,
}

/// What the host has to do with its frame callback after an input change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    intersecting: bool,
    tab_visible: bool,
    state: LoopState,
    disposed: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            intersecting: false,
            tab_visible: true,
            state: LoopState::Stopped,
            disposed: false,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> LoopState { self.state }

    pub fn is_running(&self) -> bool { self.state == LoopState::Running }

    pub fn is_disposed(&self) -> bool { self.disposed }

    pub fn set_intersecting(&mut self, intersecting: bool) -> Transition {
        self.intersecting = intersecting;
        self.reconcile()
    }

    pub fn set_tab_visible(&mut self, visible: bool) -> Transition {
        self.tab_visible = visible;
        self.reconcile()
    }

    /// Terminal. Reports `Stop` if a loop was running.
    pub fn dispose(&mut self) -> Transition {
        let was_running = self.is_running();
        self.disposed = true;
        self.state = LoopState::Stopped;
        if was_running { Transition::Stop } else { Transition::Unchanged }
    }

    fn reconcile(&mut self) -> Transition {
        if self.disposed {
            return Transition::Unchanged;
        }
        let wanted = self.intersecting && self.tab_visible;
        match (self.state, wanted) {
            (LoopState::Running, false) => {
                self.state = LoopState::Suspended;
                Transition::Stop
            }
            (LoopState::Stopped | LoopState::Suspended, true) => {
                self.state = LoopState::Running;
                Transition::Start
            }
            _ => Transition::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_first_intersection() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.state(), LoopState::Stopped);
        assert_eq!(lc.set_intersecting(false), Transition::Unchanged);
        assert_eq!(lc.state(), LoopState::Stopped);
        assert_eq!(lc.set_intersecting(true), Transition::Start);
        assert!(lc.is_running());
    }

    #[test]
    fn leaving_viewport_suspends() {
        let mut lc = Lifecycle::new();
        lc.set_intersecting(true);
        assert_eq!(lc.set_intersecting(false), Transition::Stop);
        assert_eq!(lc.state(), LoopState::Suspended);
        assert_eq!(lc.set_intersecting(true), Transition::Start);
    }

    #[test]
    fn hidden_tab_needs_both_inputs_to_resume() {
        let mut lc = Lifecycle::new();
        lc.set_intersecting(true);
        assert_eq!(lc.set_tab_visible(false), Transition::Stop);
        assert_eq!(lc.set_intersecting(false), Transition::Unchanged);
        assert_eq!(lc.set_tab_visible(true), Transition::Unchanged);
        assert_eq!(lc.state(), LoopState::Suspended);
        assert_eq!(lc.set_intersecting(true), Transition::Start);
    }

    #[test]
    fn tab_change_before_intersection_does_not_start() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.set_tab_visible(false), Transition::Unchanged);
        assert_eq!(lc.set_tab_visible(true), Transition::Unchanged);
        assert_eq!(lc.state(), LoopState::Stopped);
    }

    #[test]
    fn dispose_is_terminal() {
        let mut lc = Lifecycle::new();
        lc.set_intersecting(true);
        assert_eq!(lc.dispose(), Transition::Stop);
        assert_eq!(lc.dispose(), Transition::Unchanged);
        assert_eq!(lc.set_intersecting(true), Transition::Unchanged);
        assert_eq!(lc.state(), LoopState::Stopped);
    }
}
