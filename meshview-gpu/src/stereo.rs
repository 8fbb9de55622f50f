//! Stereo presentation modes

use std::fmt;

/// How left and right eye images are combined
///
/// Ids follow the classic VTK numbering, 1 to 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StereoMode {
    CrystalEyes = 1,
    RedBlue = 2,
    Interlaced = 3,
    Left = 4,
    Right = 5,
    Dresden = 6,
    Anaglyph = 7,
    Checkerboard = 8,
    SplitViewportHorizontal = 9,
}

impl StereoMode {
    pub const ALL: [StereoMode; 9] = [
        StereoMode::CrystalEyes,
        StereoMode::RedBlue,
        StereoMode::Interlaced,
        StereoMode::Left,
        StereoMode::Right,
        StereoMode::Dresden,
        StereoMode::Anaglyph,
        StereoMode::Checkerboard,
        StereoMode::SplitViewportHorizontal,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get((id as usize).checked_sub(1)?).copied()
    }

    /// Following mode, wrapping from the last to the first
    pub fn next(self) -> Self {
        let id = (self.id() % Self::ALL.len() as u32) + 1;
        Self::from_id(id).unwrap_or(StereoMode::CrystalEyes)
    }

    pub fn name(self) -> &'static str {
        match self {
            StereoMode::CrystalEyes => "VTK_STEREO_CRYSTAL_EYES",
            StereoMode::RedBlue => "VTK_STEREO_RED_BLUE",
            StereoMode::Interlaced => "VTK_STEREO_INTERLACED",
            StereoMode::Left => "VTK_STEREO_LEFT",
            StereoMode::Right => "VTK_STEREO_RIGHT",
            StereoMode::Dresden => "VTK_STEREO_DRESDEN",
            StereoMode::Anaglyph => "VTK_STEREO_ANAGLYPH",
            StereoMode::Checkerboard => "VTK_STEREO_CHECKERBOARD",
            StereoMode::SplitViewportHorizontal => "VTK_STEREO_SPLITVIEWPORT_HORIZONTAL",
        }
    }

    /// Whether the mode needs the right eye rendered at all
    pub fn uses_right_eye(self) -> bool {
        !matches!(self, StereoMode::Left | StereoMode::CrystalEyes)
    }

    /// Value of the composite shader's `mode` uniform
    ///
    /// Crystal eyes needs quad-buffered presentation, which the surface does
    /// not offer, so it shows the left eye.
    pub fn composite_mode(self) -> u32 {
        match self {
            StereoMode::CrystalEyes => StereoMode::Left.id(),
            other => other.id(),
        }
    }
}

impl Default for StereoMode {
    fn default() -> Self {
        StereoMode::RedBlue
    }
}

impl fmt::Display for StereoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
