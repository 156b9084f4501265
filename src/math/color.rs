/// A linear RGB color with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub const WHITE: Color3 = Color3 {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// From a `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        let mut color = Self::default();
        color.set_hex(hex);
        color
    }

    pub fn set_hex(&mut self, hex: u32) -> &mut Self {
        self.r = ((hex >> 16) & 255) as f32 / 255.0;
        self.g = ((hex >> 8) & 255) as f32 / 255.0;
        self.b = (hex & 255) as f32 / 255.0;
        self
    }

    pub fn set_rgb(&mut self, r: f32, g: f32, b: f32) -> &mut Self {
        self.r = r;
        self.g = g;
        self.b = b;
        self
    }

    /// Set from hue, saturation and lightness, all in `0.0..=1.0`. Hue wraps
    /// around, saturation and lightness are clamped.
    pub fn set_hsl(&mut self, h: f32, s: f32, l: f32) -> &mut Self {
        let h = h.rem_euclid(1.0);
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);

        if s == 0.0 {
            self.r = l;
            self.g = l;
            self.b = l;
        } else {
            let p = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
            let q = 2.0 * l - p;
            self.r = hue_to_rgb(q, p, h + 1.0 / 3.0);
            self.g = hue_to_rgb(q, p, h);
            self.b = hue_to_rgb(q, p, h - 1.0 / 3.0);
        }
        self
    }

    /// Set to the interpolation between `a` and `b` at `ratio`.
    pub fn lerp_colors(&mut self, a: &Color3, b: &Color3, ratio: f32) -> &mut Self {
        self.r = ratio * (b.r - a.r) + a.r;
        self.g = ratio * (b.g - a.g) + a.g;
        self.b = ratio * (b.b - a.b) + a.b;
        self
    }

    pub fn lerp(&mut self, other: &Color3, ratio: f32) -> &mut Self {
        let from = *self;
        self.lerp_colors(&from, other, ratio)
    }

    /// Read three components starting at `offset`. Returns `None` if the
    /// slice is too short.
    pub fn from_slice(values: &[f32], offset: usize) -> Option<Self> {
        match values.get(offset..offset + 3)? {
            [r, g, b] => Some(Self::new(*r, *g, *b)),
            _ => None,
        }
    }

    /// Write the components into `values` at `offset`. Returns `false` and
    /// leaves `values` untouched if they do not fit.
    pub fn write_to_slice(&self, values: &mut [f32], offset: usize) -> bool {
        match values.get_mut(offset..offset + 3) {
            Some(slot) => {
                slot.copy_from_slice(&self.to_array());
                true
            }
            None => false,
        }
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[f32; 3]> for Color3 {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Color3> for [f32; 3] {
    fn from(color: Color3) -> Self {
        color.to_array()
    }
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * 6.0 * (2.0 / 3.0 - t);
    }
    p
}
