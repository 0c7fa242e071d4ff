use std::time::Instant;

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Display-synchronised callback source, one callback per refresh at most.
///
/// The host calls [`crate::ParallaxRenderer::frame`] with the handle when the
/// requested frame fires. A cancelled handle must never be delivered; if one
/// slips through anyway the renderer ignores it.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Run state of the render loop. A pending frame exists exactly while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running {
        started_at: Instant,
        pending: FrameHandle,
    },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        match self {
            RunState::Running { pending, .. } => Some(*pending),
            RunState::Stopped => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_state_has_no_pending_frame() {
        let state = RunState::default();
        assert!(!state.is_running());
        assert_eq!(state.pending(), None);
    }

    #[test]
    fn running_state_exposes_its_pending_frame() {
        let state = RunState::Running {
            started_at: Instant::now(),
            pending: FrameHandle::new(7),
        };
        assert!(state.is_running());
        assert_eq!(state.pending().map(FrameHandle::id), Some(7));
    }
}
