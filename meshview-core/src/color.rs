//! Color transfer functions for scalar mapping

use crate::{Modified, Rgb, Rgb8, TimeStamp};
use serde::{Deserialize, Serialize};

/// Low end of the default scalar ramp (light gray)
pub const RAMP_LOW_COLOR: Rgb = [0.865, 0.865, 0.865];

/// High end of the default scalar ramp (dark red)
pub const RAMP_HIGH_COLOR: Rgb = [0.706, 0.016, 0.150];

/// Space in which colors between two stops are interpolated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Rgb,
    Lab,
}

/// A control point of a transfer function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub value: f32,
    pub color: Rgb,
}

/// Piecewise color transfer function over a scalar range
///
/// Values outside the first/last stop clamp to the end colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorTransferFunction {
    stops: Vec<ColorStop>,
    color_space: ColorSpace,
    mtime: TimeStamp,
}

impl ColorTransferFunction {
    /// Create an empty transfer function
    pub fn new(color_space: ColorSpace) -> Self {
        Self {
            stops: Vec::new(),
            color_space,
            mtime: TimeStamp::now(),
        }
    }

    /// The two-stop light-gray to dark-red ramp in Lab space
    pub fn scalar_ramp(range: [f32; 2]) -> Self {
        let mut ctf = Self::new(ColorSpace::Lab);
        ctf.add_rgb_point(range[0], RAMP_LOW_COLOR);
        ctf.add_rgb_point(range[1], RAMP_HIGH_COLOR);
        ctf
    }

    /// Add a stop, replacing any stop at the same value
    pub fn add_rgb_point(&mut self, value: f32, color: Rgb) {
        match self.stops.iter_mut().find(|s| s.value == value) {
            Some(stop) => stop.color = color,
            None => {
                self.stops.push(ColorStop { value, color });
                self.stops.sort_by(|a, b| a.value.total_cmp(&b.value));
            }
        }
        self.mtime.modified();
    }

    /// Control stops, sorted by value
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Scalar range covered by the stops
    pub fn range(&self) -> Option<[f32; 2]> {
        Some([self.stops.first()?.value, self.stops.last()?.value])
    }

    /// Map a scalar value to a color
    pub fn map(&self, value: f32) -> Rgb {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return [0.0, 0.0, 0.0],
        };
        if value.is_nan() || value <= first.value {
            return first.color;
        }
        if value >= last.value {
            return last.color;
        }

        let upper = self.stops.partition_point(|s| s.value <= value);
        let (a, b) = (&self.stops[upper - 1], &self.stops[upper]);
        let t = (value - a.value) / (b.value - a.value);

        match self.color_space {
            ColorSpace::Rgb => lerp3(a.color, b.color, t),
            ColorSpace::Lab => lab_to_rgb(lerp3(rgb_to_lab(a.color), rgb_to_lab(b.color), t)),
        }
    }

    /// Map a scalar value to an 8-bit color
    pub fn map_rgb8(&self, value: f32) -> Rgb8 {
        let [r, g, b] = self.map(value);
        [to_u8(r), to_u8(g), to_u8(b)]
    }
}

impl Modified for ColorTransferFunction {
    fn mtime(&self) -> TimeStamp {
        self.mtime
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

// D65 reference white
const WHITE: [f32; 3] = [0.9505, 1.0, 1.089];

/// Decode one display (sRGB) channel to linear light
pub fn srgb_to_linear(c: f32) -> f32 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

pub fn linear_to_srgb(c: f32) -> f32 {
    if c > 0.003_130_8 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

/// Convert display RGB to CIE L*a*b*
pub fn rgb_to_lab(rgb: Rgb) -> [f32; 3] {
    let [r, g, b] = rgb.map(srgb_to_linear);
    let x = 0.4124 * r + 0.3576 * g + 0.1805 * b;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = 0.0193 * r + 0.1192 * g + 0.9505 * b;

    let f = |t: f32| {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };
    let (fx, fy, fz) = (f(x / WHITE[0]), f(y / WHITE[1]), f(z / WHITE[2]));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Convert CIE L*a*b* back to display RGB, clamped to `[0, 1]`
pub fn lab_to_rgb(lab: [f32; 3]) -> Rgb {
    let fy = (lab[0] + 16.0) / 116.0;
    let fx = fy + lab[1] / 500.0;
    let fz = fy - lab[2] / 200.0;

    let finv = |t: f32| {
        let cube = t * t * t;
        if cube > 0.008856 {
            cube
        } else {
            (t - 16.0 / 116.0) / 7.787
        }
    };
    let (x, y, z) = (finv(fx) * WHITE[0], finv(fy) * WHITE[1], finv(fz) * WHITE[2]);

    let r = 3.2406 * x - 1.5372 * y - 0.4986 * z;
    let g = -0.9689 * x + 1.8758 * y + 0.0415 * z;
    let b = 0.0557 * x - 0.2040 * y + 1.0570 * z;
    [r, g, b].map(|c| linear_to_srgb(c.max(0.0)).clamp(0.0, 1.0))
}
