use serde::{Deserialize, Serialize};

/// 归一化下限：-90 dBm 及以下视为最弱
const WEAK_SIGNAL_DBM: f64 = -90.0;

/// 归一化区间宽度：-90 ~ -40 dBm
const SIGNAL_SPAN_DB: f64 = 50.0;

/// 彩色色带的固定不透明度
const BAND_OPACITY: f64 = 0.7;

/// 信号色带
///
/// 固定的四段渐变，从弱到强依次为 黑 -> 绿 -> 黄 -> 红。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorBand {
    /// t < 0.25
    Black,
    /// 0.25 <= t < 0.5
    Green,
    /// 0.5 <= t < 0.75
    Yellow,
    /// t >= 0.75
    Red,
}

impl ColorBand {
    pub fn from_normalized(t: f64) -> Self {
        if t < 0.25 {
            ColorBand::Black
        } else if t < 0.5 {
            ColorBand::Green
        } else if t < 0.75 {
            ColorBand::Yellow
        } else {
            ColorBand::Red
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ColorBand::Black => "black",
            ColorBand::Green => "green",
            ColorBand::Yellow => "yellow",
            ColorBand::Red => "red",
        }
    }
}

/// RGBA 颜色，各分量取值 0.0 ~ 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
    pub band: ColorBand,
}

impl SignalColor {
    /// 转为 8 位 RGBA，供渲染层直接使用
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.red), q(self.green), q(self.blue), q(self.alpha)]
    }

    /// `#rrggbbaa`
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

/// 信号强度归一化到 [0, 1]（-90 -> 0，-40 -> 1）
pub fn normalize_signal(signal_strength: i32) -> f64 {
    ((signal_strength as f64 - WEAK_SIGNAL_DBM) / SIGNAL_SPAN_DB).clamp(0.0, 1.0)
}

/// 信号强度 -> 颜色
pub fn signal_color(signal_strength: i32) -> SignalColor {
    let t = normalize_signal(signal_strength);
    let band = ColorBand::from_normalized(t);

    match band {
        ColorBand::Black => SignalColor {
            red: 0.0,
            green: 0.0,
            blue: 0.0,
            // 0.2 ~ 0.7
            alpha: 0.2 + t * 2.0,
            band,
        },
        ColorBand::Green => {
            let local = (t - 0.25) / 0.25;
            SignalColor {
                red: 0.0,
                green: 0.5 + 0.5 * local,
                blue: 0.0,
                alpha: BAND_OPACITY,
                band,
            }
        }
        ColorBand::Yellow => {
            let local = (t - 0.5) / 0.25;
            SignalColor {
                red: local,
                green: 1.0,
                blue: 0.0,
                alpha: BAND_OPACITY,
                band,
            }
        }
        ColorBand::Red => {
            let local = (t - 0.75) / 0.25;
            SignalColor {
                red: 1.0,
                green: 1.0 - local,
                blue: 0.0,
                alpha: BAND_OPACITY,
                band,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_signal_clamps() {
        assert_eq!(normalize_signal(-120), 0.0);
        assert_eq!(normalize_signal(-90), 0.0);
        assert_eq!(normalize_signal(-65), 0.5);
        assert_eq!(normalize_signal(-40), 1.0);
        assert_eq!(normalize_signal(-10), 1.0);
    }

    #[test]
    fn test_band_per_signal() {
        assert_eq!(signal_color(-90).band, ColorBand::Black);
        assert_eq!(signal_color(-75).band, ColorBand::Green);
        assert_eq!(signal_color(-60).band, ColorBand::Yellow);
        assert_eq!(signal_color(-50).band, ColorBand::Red);
        assert_eq!(signal_color(-30).band, ColorBand::Red);
    }

    #[test]
    fn test_band_boundaries_are_lower_inclusive() {
        // t = 0.25 / 0.5 / 0.75
        assert_eq!(signal_color(-78).band, ColorBand::Black);
        assert_eq!(signal_color(-77).band, ColorBand::Green);
        assert_eq!(signal_color(-65).band, ColorBand::Yellow);
        assert_eq!(signal_color(-66).band, ColorBand::Green);
        assert_eq!(signal_color(-53).band, ColorBand::Yellow);
        assert_eq!(signal_color(-52).band, ColorBand::Red);
    }

    #[test]
    fn test_black_band_opacity_ramp() {
        let weakest = signal_color(-100);
        assert_eq!(weakest.alpha, 0.2);

        let near_edge = signal_color(-78);
        assert!(near_edge.alpha > 0.6 && near_edge.alpha < 0.7);
    }

    #[test]
    fn test_gradient_channels() {
        let green = signal_color(-70);
        assert_eq!(green.red, 0.0);
        assert!(green.green > 0.5 && green.green < 1.0);

        let yellow = signal_color(-60);
        assert_eq!(yellow.green, 1.0);
        assert!(yellow.red > 0.0 && yellow.red < 1.0);

        let strongest = signal_color(-40);
        assert_eq!(strongest.red, 1.0);
        assert_eq!(strongest.green, 0.0);
        assert_eq!(strongest.alpha, 0.7);
    }

    #[test]
    fn test_hex_output() {
        let hex = signal_color(-40).to_hex();
        assert_eq!(hex.len(), 9);
        assert!(hex.starts_with("#ff0000"));
        assert_eq!(signal_color(-100).to_rgba8(), [0, 0, 0, 51]);
    }
}
