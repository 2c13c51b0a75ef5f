use crate::types::Heading;

/// Live azimuth plus a latched snapshot selected by the freeze flag.
#[derive(Debug, Default, Clone)]
pub struct HeadingState {
    live: f32,
    frozen_azimuth: f32,
    frozen: bool,
}

impl HeadingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest fused azimuth. Ignored for display while frozen.
    pub fn set_live(&mut self, azimuth: f32) {
        self.live = azimuth;
    }

    /// Freeze at the current live value, or release a previous freeze.
    ///
    /// Returns whether the heading is frozen afterwards.
    pub fn toggle_freeze(&mut self) -> bool {
        if self.frozen {
            self.frozen = false;
        } else {
            self.frozen_azimuth = self.live;
            self.frozen = true;
        }
        self.frozen
    }

    /// Angle the polygon should be drawn with.
    pub fn current_angle(&self) -> f32 {
        if self.frozen {
            self.frozen_azimuth
        } else {
            self.live
        }
    }

    pub fn live(&self) -> f32 {
        self.live
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn snapshot(&self) -> Heading {
        Heading {
            degrees: self.current_angle(),
            frozen: self.frozen,
        }
    }
}

/// Label for the control that toggles the freeze.
pub fn toggle_label(frozen: bool) -> &'static str {
    if frozen {
        "Release rotation"
    } else {
        "Freeze rotation"
    }
}
