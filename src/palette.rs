//! Distinct display colors for imported layers.

use std::fmt;

use ahash::AHashMap;

/// HSL color: h in degrees, s and l in [0.0, 1.0].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    /// Convert to 8-bit RGB.
    pub fn to_rgb(self) -> [u8; 3] {
        let h = (self.h % 360.0 + 360.0) % 360.0;
        let s = self.s.clamp(0.0, 1.0);
        let l = self.l.clamp(0.0, 1.0);

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = l - c / 2.0;
        let (r, g, b) = match h {
            h if h < 60.0 => (c, x, 0.0),
            h if h < 120.0 => (x, c, 0.0),
            h if h < 180.0 => (0.0, c, x),
            h if h < 240.0 => (0.0, x, c),
            h if h < 300.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        [r, g, b].map(|v| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8)
    }

    /// `#rrggbb`.
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl fmt::Display for Hsl {
    /// Format as CSS: `hsl({h:.1},{s:.0}%,{l:.0}%)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = (self.h % 360.0 + 360.0) % 360.0;
        let s = (self.s * 100.0).clamp(0.0, 100.0);
        let l = (self.l * 100.0).clamp(0.0, 100.0);
        write!(f, "hsl({:.1},{:.0}%,{:.0}%)", h, s, l)
    }
}

const GOLDEN_ANGLE: f64 = 137.50776405;

fn golden_angle_color(index: usize) -> Hsl {
    Hsl { h: ((index as f64) * GOLDEN_ANGLE) % 360.0, s: 0.70, l: 0.55 }
}

/// Hands out golden-angle hues in allocation order. A name keeps its color for the
/// lifetime of the allocator.
#[derive(Debug, Default)]
pub struct Palette {
    assigned: AHashMap<String, Hsl>,
    next: usize,
}

impl Palette {
    pub fn new() -> Self { Self::default() }

    /// Color for `layer`, allocating the next hue on first use.
    pub fn color(&mut self, layer: &str) -> Hsl {
        let next = &mut self.next;
        *self.assigned.entry(layer.to_string()).or_insert_with(|| {
            *next += 1;
            golden_angle_color(*next - 1)
        })
    }

    /// Forget a layer's color. Later layers still get fresh hues.
    pub fn release(&mut self, layer: &str) -> Option<Hsl> {
        self.assigned.remove(layer)
    }

    pub fn len(&self) -> usize { self.assigned.len() }

    pub fn is_empty(&self) -> bool { self.assigned.is_empty() }
}
