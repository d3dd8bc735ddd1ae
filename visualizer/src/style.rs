//! Colours and fonts shared by every figure.

use plotters::style::RGBColor;

pub const MISINFORMATION: RGBColor = RGBColor(214, 39, 40);
pub const FACTUAL: RGBColor = RGBColor(31, 119, 180);
pub const CROSSPOSTER: RGBColor = RGBColor(148, 103, 189);
pub const EDGE: RGBColor = RGBColor(160, 160, 160);

pub const FONT: &str = "sans-serif";
pub const TITLE_SIZE: u32 = 20;
pub const LABEL_SIZE: u32 = 13;

/// Qualitative palette for community colouring.
pub const PALETTE: [RGBColor; 20] = [
    RGBColor(31, 119, 180),
    RGBColor(174, 199, 232),
    RGBColor(255, 127, 14),
    RGBColor(255, 187, 120),
    RGBColor(44, 160, 44),
    RGBColor(152, 223, 138),
    RGBColor(214, 39, 40),
    RGBColor(255, 152, 150),
    RGBColor(148, 103, 189),
    RGBColor(197, 176, 213),
    RGBColor(140, 86, 75),
    RGBColor(196, 156, 148),
    RGBColor(227, 119, 194),
    RGBColor(247, 182, 210),
    RGBColor(127, 127, 127),
    RGBColor(199, 199, 199),
    RGBColor(188, 189, 34),
    RGBColor(219, 219, 141),
    RGBColor(23, 190, 207),
    RGBColor(158, 218, 229),
];

/// Blue to red through grey.
pub const COOLWARM: [RGBColor; 3] = [
    RGBColor(59, 76, 192),
    RGBColor(221, 221, 221),
    RGBColor(180, 4, 38),
];

/// Pale yellow to dark red.
pub const YLORRD: [RGBColor; 3] = [
    RGBColor(255, 255, 204),
    RGBColor(253, 141, 60),
    RGBColor(128, 0, 38),
];

pub fn community_color(community: usize) -> RGBColor {
    PALETTE[community % PALETTE.len()]
}

/// Linear interpolation through evenly spaced colour stops; `t` in `[0, 1]`.
pub fn gradient(stops: &[RGBColor], t: f64) -> RGBColor {
    match stops.len() {
        0 => RGBColor(0, 0, 0),
        1 => stops[0],
        n => {
            let scaled = t.clamp(0.0, 1.0) * (n - 1) as f64;
            let i = (scaled.floor() as usize).min(n - 2);
            let f = scaled - i as f64;
            let (a, b) = (stops[i], stops[i + 1]);
            RGBColor(mix(a.0, b.0, f), mix(a.1, b.1, f), mix(a.2, b.2, f))
        }
    }
}

fn mix(a: u8, b: u8, f: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * f).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        assert_eq!(gradient(&COOLWARM, 0.0), COOLWARM[0]);
        assert_eq!(gradient(&COOLWARM, 1.0), COOLWARM[2]);
        assert_eq!(gradient(&COOLWARM, 0.5), COOLWARM[1]);
        assert_eq!(gradient(&YLORRD, 2.0), YLORRD[2]);
    }

    #[test]
    fn test_community_colors_wrap() {
        assert_eq!(community_color(0), community_color(PALETTE.len()));
        assert_ne!(community_color(0), community_color(1));
    }
}
