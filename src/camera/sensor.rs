use serde::{Deserialize, Serialize};

/// Sensor tuning applied after the peripheral comes up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSettings {
    /// -2 to 2
    pub brightness: i8,
    /// -2 to 2
    pub contrast: i8,
    /// -2 to 2
    pub saturation: i8,
    /// 0 none, 1 negative, 2 grayscale, 3 red, 4 green, 5 blue, 6 sepia
    pub special_effect: u8,
    pub whitebal: bool,
    pub awb_gain: bool,
    /// 0 auto, 1 sunny, 2 cloudy, 3 office, 4 home
    pub wb_mode: u8,
    pub exposure_ctrl: bool,
    pub aec2: bool,
    /// -2 to 2
    pub ae_level: i8,
    /// 0 to 1200
    pub aec_value: u16,
    pub gain_ctrl: bool,
    /// 0 to 30
    pub agc_gain: u8,
    /// 0 to 6
    pub gainceiling: u8,
    pub bpc: bool,
    pub wpc: bool,
    pub raw_gma: bool,
    pub lenc: bool,
    pub hmirror: bool,
    pub vflip: bool,
    pub dcw: bool,
    pub colorbar: bool,
}

impl SensorSettings {
    /// Check every register against its documented range
    pub fn out_of_range(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let signed = [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("ae_level", self.ae_level),
        ];
        for (name, value) in signed {
            if !(-2..=2).contains(&value) {
                fields.push(name);
            }
        }
        if self.special_effect > 6 {
            fields.push("special_effect");
        }
        if self.wb_mode > 4 {
            fields.push("wb_mode");
        }
        if self.aec_value > 1200 {
            fields.push("aec_value");
        }
        if self.agc_gain > 30 {
            fields.push("agc_gain");
        }
        if self.gainceiling > 6 {
            fields.push("gainceiling");
        }
        fields
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 0,
            saturation: 0,
            special_effect: 0,
            whitebal: true,
            awb_gain: true,
            wb_mode: 0,
            exposure_ctrl: true,
            aec2: false,
            ae_level: 0,
            aec_value: 300,
            gain_ctrl: true,
            agc_gain: 0,
            gainceiling: 0,
            bpc: false,
            wpc: true,
            raw_gma: true,
            lenc: true,
            hmirror: false,
            vflip: false,
            dcw: true,
            colorbar: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_in_range() {
        assert!(SensorSettings::default().out_of_range().is_empty());
    }

    #[test]
    fn test_out_of_range_fields_reported() {
        let settings = SensorSettings {
            brightness: 3,
            aec_value: 1500,
            gainceiling: 7,
            ..SensorSettings::default()
        };
        assert_eq!(
            settings.out_of_range(),
            vec!["brightness", "aec_value", "gainceiling"]
        );
    }
}
