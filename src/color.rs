use nalgebra::Vector3;

/// Linear RGB colour, components nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// From a 0xRRGGBB value given in sRGB, converted to linear.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        Self { r: channel(16), g: channel(8), b: channel(0) }
    }

    pub fn lerp(&self, other: &Color, alpha: f32) -> Color {
        Color {
            r: self.r + alpha * (other.r - self.r),
            g: self.g + alpha * (other.g - self.g),
            b: self.b + alpha * (other.b - self.b),
        }
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_vector(&self) -> Vector3<f32> {
        Vector3::new(self.r, self.g, self.b)
    }
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

/// Piecewise-linear gradient over `[0, 1]` through evenly spaced stops.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<Color>,
}

impl ColorRamp {
    /// Needs at least two stops; shorter ramps are rejected.
    pub fn new(stops: Vec<Color>) -> Option<Self> {
        if stops.len() < 2 {
            return None;
        }
        Some(Self { stops })
    }

    pub fn from_hex(hex: &[u32]) -> Option<Self> {
        Self::new(hex.iter().copied().map(Color::from_hex).collect())
    }

    pub fn start(&self) -> Color {
        self.stops[0]
    }

    /// Colour at `ratio`, clamped to the ramp ends.
    pub fn color_at(&self, ratio: f32) -> Color {
        let last = self.stops.len() - 1;
        let scaled = ratio.clamp(0.0, 1.0) * last as f32;
        let idx = scaled.floor() as usize;
        if idx >= last {
            return self.stops[last];
        }
        self.stops[idx].lerp(&self.stops[idx + 1], scaled - idx as f32)
    }

    /// Colour for `slot` out of `count`, spreading the whole ramp across
    /// the slots so the first and last land on the ends.
    pub fn color_for_slot(&self, slot: usize, count: usize) -> Color {
        if count <= 1 {
            return self.start();
        }
        self.color_at(slot as f32 / (count - 1) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-4 && (a.g - b.g).abs() < 1e-4 && (a.b - b.b).abs() < 1e-4
    }

    #[test]
    fn hex_conversion() {
        assert!(close(Color::from_hex(0xff0000), Color::new(1.0, 0.0, 0.0)));
        assert_eq!(Color::from_hex(0x000000), Color::BLACK);
        let grey = Color::from_hex(0x808080);
        assert!((grey.r - 0.2158605).abs() < 1e-4);
    }

    #[test]
    fn short_ramps_rejected() {
        assert!(ColorRamp::from_hex(&[]).is_none());
        assert!(ColorRamp::from_hex(&[0xffffff]).is_none());
        assert!(ColorRamp::from_hex(&[0xffffff, 0]).is_some());
    }

    #[test]
    fn two_stop_ramp_over_eleven_slots() {
        let ramp = ColorRamp::from_hex(&[0xff0000, 0x0000ff]).unwrap();
        let red = Color::new(1.0, 0.0, 0.0);
        let blue = Color::new(0.0, 0.0, 1.0);
        assert!(close(ramp.color_for_slot(0, 11), red));
        assert!(close(ramp.color_for_slot(10, 11), blue));
        assert!(close(ramp.color_for_slot(5, 11), Color::new(0.5, 0.0, 0.5)));
    }

    #[test]
    fn three_stop_ramp_segments() {
        let ramp = ColorRamp::new(vec![Color::BLACK, Color::WHITE, Color::BLACK]).unwrap();
        assert!(close(ramp.color_at(0.25), Color::new(0.5, 0.5, 0.5)));
        assert!(close(ramp.color_at(0.5), Color::WHITE));
        assert!(close(ramp.color_at(1.0), Color::BLACK));
        assert!(close(ramp.color_at(2.0), Color::BLACK));
        assert!(close(ramp.color_at(-1.0), Color::BLACK));
    }

    #[test]
    fn single_slot_uses_start() {
        let ramp = ColorRamp::from_hex(&[0xff0000, 0x0000ff]).unwrap();
        assert_eq!(ramp.color_for_slot(0, 1), ramp.start());
    }
}
