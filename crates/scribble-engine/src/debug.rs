//! Deciding where a running program suspends.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::message::ExecutionMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendReason {
    /// A debug run stops before its first instruction.
    Start,
    Step,
    Breakpoint,
}

/// Tracks the call depth and the requested [`ExecutionMode`].
///
/// The machine reports every function entry and return, and asks
/// [`check`](StepController::check) at each check point whether to suspend.
/// The check point at which a run resumes is never asked again.
#[derive(Debug, Default, Clone)]
pub struct StepController {
    mode: ExecutionMode,
    depth: usize,
    /// Depth when the current step began.
    step_depth: usize,
    returned: bool,
    pause_pending: bool,
    breakpoints: FxHashSet<usize>,
    /// Line of the last check point, per active frame.
    lines: Vec<Option<usize>>,
}

impl StepController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Suspend at the next check point regardless of mode.
    pub fn pause(&mut self) {
        self.pause_pending = true;
    }

    pub fn resume(&mut self, mode: ExecutionMode) {
        self.mode = mode;
        self.step_depth = self.depth;
        self.returned = false;
    }

    pub fn enter(&mut self) {
        self.depth += 1;
        self.lines.push(None);
    }

    pub fn leave(&mut self) {
        if self.mode == ExecutionMode::RunToReturn && self.depth <= self.step_depth {
            self.returned = true;
        }
        self.depth = self.depth.saturating_sub(1);
        self.lines.pop();
    }

    pub fn add_breakpoint(&mut self, line: usize) -> bool {
        self.breakpoints.insert(line)
    }

    pub fn remove_breakpoint(&mut self, line: usize) -> bool {
        self.breakpoints.remove(&line)
    }

    pub fn breakpoints(&self) -> Vec<usize> {
        let mut lines: Vec<_> = self.breakpoints.iter().copied().collect();
        lines.sort_unstable();
        lines
    }

    /// Called at every check point after the one a run resumed from.
    ///
    /// A breakpoint fires when execution of a frame enters its line. It does
    /// not fire again for the remaining instructions of that line, including
    /// after a call made from the line returns.
    pub fn check(&mut self, line: usize) -> Option<SuspendReason> {
        let entered_line = match self.lines.last_mut() {
            Some(last) => last.replace(line) != Some(line),
            None => true,
        };

        if std::mem::take(&mut self.pause_pending) {
            return Some(SuspendReason::Start);
        }
        let step_done = match self.mode {
            ExecutionMode::SingleStep => true,
            ExecutionMode::StepOver => self.depth <= self.step_depth,
            ExecutionMode::RunToReturn => self.returned,
            ExecutionMode::Run | ExecutionMode::Continue => false,
        };
        if step_done {
            return Some(SuspendReason::Step);
        }
        if self.mode != ExecutionMode::Run && entered_line && self.breakpoints.contains(&line) {
            return Some(SuspendReason::Breakpoint);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_over_waits_for_depth() {
        let mut controller = StepController::new();
        controller.enter();
        controller.enter();
        controller.resume(ExecutionMode::StepOver);

        controller.enter();
        assert_eq!(controller.check(5), None);
        controller.enter();
        assert_eq!(controller.check(6), None);
        controller.leave();
        controller.leave();
        assert_eq!(controller.check(2), Some(SuspendReason::Step));
    }

    #[test]
    fn test_run_to_return_ignores_nested_returns() {
        let mut controller = StepController::new();
        controller.enter();
        controller.resume(ExecutionMode::RunToReturn);
        controller.enter();
        controller.leave();
        assert_eq!(controller.check(1), None);
        controller.leave();
        assert_eq!(controller.check(1), Some(SuspendReason::Step));
    }

    #[test]
    fn test_breakpoints() {
        let mut controller = StepController::new();
        controller.enter();
        controller.add_breakpoint(3);
        controller.resume(ExecutionMode::Continue);
        assert_eq!(controller.check(2), None);
        assert_eq!(controller.check(3), Some(SuspendReason::Breakpoint));
        assert_eq!(controller.check(3), None);
        assert_eq!(controller.check(4), None);
        assert_eq!(controller.check(3), Some(SuspendReason::Breakpoint));

        controller.resume(ExecutionMode::Run);
        assert_eq!(controller.check(2), None);
        assert_eq!(controller.check(3), None);
    }

    #[test]
    fn test_breakpoint_not_repeated_after_a_call_returns() {
        let mut controller = StepController::new();
        controller.enter();
        controller.add_breakpoint(8);
        controller.resume(ExecutionMode::Continue);
        assert_eq!(controller.check(8), Some(SuspendReason::Breakpoint));
        controller.enter();
        assert_eq!(controller.check(5), None);
        controller.leave();
        assert_eq!(controller.check(8), None);
    }
}
