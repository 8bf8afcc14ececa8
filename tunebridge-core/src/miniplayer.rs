use crate::{
    effect::{MiniplayerHandle, WindowId},
    settings::{MiniplayerType, Sizing},
};

/// Window geometry for a miniplayer of `window_type`, given the content size
/// of the current layout.  Window chrome differs per window type.
pub fn window_sizing(window_type: MiniplayerType, layout: Sizing) -> Sizing {
    let (add_width, add_height) = match window_type {
        MiniplayerType::Normal => (16, 113),
        MiniplayerType::Popup => (16, 38),
        MiniplayerType::Panel | MiniplayerType::DetachedPanel => (-1, 37),
        MiniplayerType::Notification => (0, 0),
    };
    Sizing {
        width: layout.width + add_width,
        height: layout.height + add_height,
        ..layout
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MiniplayerState {
    #[default]
    Closed,
    /// Window creation was requested, its id is not known yet.
    Opening,
    Open(MiniplayerHandle),
}

/// Tracks the single miniplayer instance.  Reopening closes the current
/// instance first and opens a new one once it reports being closed.
#[derive(Debug, Default)]
pub struct Miniplayer {
    state: MiniplayerState,
    reopen: bool,
}

impl Miniplayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MiniplayerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != MiniplayerState::Closed
    }

    pub fn window(&self) -> Option<WindowId> {
        match self.state {
            MiniplayerState::Open(MiniplayerHandle::Window(window)) => Some(window),
            _ => None,
        }
    }

    pub fn request_reopen(&mut self) {
        self.reopen = true;
    }

    /// Whether the miniplayer about to open replaces a previous one.
    pub fn take_reopen(&mut self) -> bool {
        std::mem::take(&mut self.reopen)
    }

    pub fn opening(&mut self) {
        self.state = MiniplayerState::Opening;
    }

    pub fn opened(&mut self, handle: MiniplayerHandle) {
        self.state = MiniplayerState::Open(handle);
    }

    /// A reopen was requested while the window was still being created; it
    /// has to be closed right away.
    pub fn close_pending(&self) -> bool {
        self.reopen && matches!(self.state, MiniplayerState::Open(_))
    }

    /// The requested window could not be created.  Returns whether a window
    /// was being created at all.
    pub fn failed(&mut self) -> bool {
        if self.state != MiniplayerState::Opening {
            return false;
        }
        self.state = MiniplayerState::Closed;
        self.reopen = false;
        true
    }

    /// Handle a closed miniplayer surface.  Returns `None` if `handle` is not
    /// ours, otherwise whether a new instance should be opened.
    pub fn closed(&mut self, handle: MiniplayerHandle) -> Option<bool> {
        match self.state {
            MiniplayerState::Open(current) if current == handle => {
                self.state = MiniplayerState::Closed;
                Some(self.reopen)
            }
            _ => None,
        }
    }
}
