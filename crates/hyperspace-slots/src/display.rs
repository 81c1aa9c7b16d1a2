//! Physical displays and their shutter-glasses slots.
//!
//! A physical display shows one image per slot in time multiplex.  Each slot
//! owns a [`SlotTiming`]: the event times and shutter commands that open the
//! glasses for that slot (first half) and close them again (second half).
//! The length of a half selects the stereo mode:
//!
//! | Events per half | [`StereoMode`] |
//! |---|---|
//! | no table | `None` |
//! | 2 | `PassiveStereo` |
//! | 4 | `ActiveStereo` |
//!
//! Shutter commands are written as hexadecimal strings in configuration
//! (`"22"` is `0x22`).

use hyperspace_types::{DisplayId, HyperError, StereoMode, UserId};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Timing row of one slot as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotTimingConfig {
    pub open_times: Vec<u32>,
    pub close_times: Vec<u32>,
    pub open_values: Vec<String>,
    pub close_values: Vec<String>,
}

impl SlotTimingConfig {
    fn new(open_times: &[u32], close_times: &[u32], open_values: &[&str], close_values: &[&str]) -> Self {
        Self {
            open_times: open_times.to_vec(),
            close_times: close_times.to_vec(),
            open_values: open_values.iter().map(|v| v.to_string()).collect(),
            close_values: close_values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    /// One entry per slot.
    pub displaystrings: Vec<String>,
    /// Empty for mono displays.
    #[serde(default)]
    pub shutter_timings: Vec<SlotTimingConfig>,
}

impl DisplayConfig {
    /// Three-slot passive stereo powerwall.
    pub fn large_powerwall() -> Self {
        let values = (["22", "44"], ["88", "11"]);
        let row = |open: [u32; 2], close: [u32; 2]| SlotTimingConfig::new(&open, &close, &values.0, &values.1);
        Self {
            name: "large_powerwall".into(),
            hostname: "kerberos".into(),
            displaystrings: vec![":0.0".into(), ":0.1".into(), ":0.2".into()],
            shutter_timings: vec![
                row([0, 8175], [100, 8275]),
                row([8200, 10700], [8300, 10800]),
                row([11400, 12900], [11500, 13000]),
                row([14000, 15800], [14100, 15900]),
            ],
        }
    }

    /// Two-slot active stereo powerwall.
    pub fn small_powerwall() -> Self {
        Self {
            name: "small_powerwall".into(),
            hostname: "pandora".into(),
            displaystrings: vec![":0.0".into(), ":0.1".into()],
            shutter_timings: active_rows(),
        }
    }

    /// Three-slot active stereo table.
    pub fn touch_table_3d() -> Self {
        Self {
            name: "touch_table_3D".into(),
            hostname: "medusa".into(),
            displaystrings: vec![":0.0".into(), ":0.1".into(), ":0.2".into()],
            shutter_timings: active_rows(),
        }
    }

    /// Single-user mono desktop.
    pub fn desktop(hostname: &str) -> Self {
        Self {
            name: format!("{hostname}_display"),
            hostname: hostname.into(),
            displaystrings: vec![":0.0".into()],
            shutter_timings: Vec::new(),
        }
    }
}

fn active_rows() -> Vec<SlotTimingConfig> {
    let open = ["20", "80", "40", "10"];
    let close = ["2", "8", "4", "1"];
    vec![
        SlotTimingConfig::new(&[100, 200, 2900, 3000], &[8400, 8500, 11400, 11500], &open, &close),
        SlotTimingConfig::new(&[2600, 2700, 5700, 5800], &[11000, 11100, 14600, 14700], &open, &close),
        SlotTimingConfig::new(&[6000, 6100, 8200, 8300], &[14300, 14400, 15900, 16000], &open, &close),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Runtime types
// ────────────────────────────────────────────────────────────────────────────

/// Events of one half of a slot: `times[i]` pairs with `values[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutterHalf {
    pub times: Vec<u32>,
    pub values: Vec<u8>,
}

impl ShutterHalf {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTiming {
    pub open: ShutterHalf,
    pub close: ShutterHalf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub index: usize,
    pub displaystring: String,
    /// `None` on mono displays.
    pub timing: Option<SlotTiming>,
    pub assigned_user: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalDisplay {
    id: DisplayId,
    name: String,
    hostname: String,
    stereo_mode: StereoMode,
    slots: Vec<Slot>,
}

fn parse_hex(display: &str, value: &str) -> Result<u8, HyperError> {
    u8::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| HyperError::config(format!("{display}: shutter value {value:?} is not a hex byte: {e}")))
}

fn parse_half(display: &str, times: &[u32], values: &[String]) -> Result<ShutterHalf, HyperError> {
    if times.len() != values.len() {
        return Err(HyperError::config(format!(
            "{display}: {} shutter times but {} shutter values",
            times.len(),
            values.len()
        )));
    }
    let values = values
        .iter()
        .map(|v| parse_hex(display, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ShutterHalf {
        times: times.to_vec(),
        values,
    })
}

impl PhysicalDisplay {
    /// Build a display and validate its shutter table.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::Config`] when the display has no displaystrings,
    /// a value is not a hex byte, the halves disagree in length, a half has
    /// neither 2 nor 4 events, or there are fewer timing rows than slots.
    pub fn from_config(id: DisplayId, config: &DisplayConfig) -> Result<Self, HyperError> {
        let name = config.name.as_str();
        if config.displaystrings.is_empty() {
            return Err(HyperError::config(format!("{name}: display has no displaystrings")));
        }

        let mut rows = Vec::with_capacity(config.shutter_timings.len());
        for row in &config.shutter_timings {
            let timing = SlotTiming {
                open: parse_half(name, &row.open_times, &row.open_values)?,
                close: parse_half(name, &row.close_times, &row.close_values)?,
            };
            rows.push(timing);
        }

        let stereo_mode = match rows.first().map(|r| r.open.len()) {
            None => StereoMode::None,
            Some(2) => StereoMode::PassiveStereo,
            Some(4) => StereoMode::ActiveStereo,
            Some(n) => {
                return Err(HyperError::config(format!(
                    "{name}: {n} events per shutter half, expected 2 or 4"
                )));
            }
        };
        if let Some(first) = rows.first() {
            let events = first.open.len();
            if rows.iter().any(|r| r.open.len() != events || r.close.len() != events) {
                return Err(HyperError::config(format!(
                    "{name}: every shutter half must have {events} events"
                )));
            }
            if rows.len() < config.displaystrings.len() {
                return Err(HyperError::config(format!(
                    "{name}: {} timing rows for {} displaystrings",
                    rows.len(),
                    config.displaystrings.len()
                )));
            }
        }

        let mut rows = rows.into_iter();
        let slots = config
            .displaystrings
            .iter()
            .enumerate()
            .map(|(index, displaystring)| Slot {
                index,
                displaystring: displaystring.clone(),
                timing: rows.next(),
                assigned_user: None,
            })
            .collect();

        Ok(Self {
            id,
            name: config.name.clone(),
            hostname: config.hostname.clone(),
            stereo_mode,
            slots,
        })
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn stereo_mode(&self) -> StereoMode {
        self.stereo_mode
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo_mode != StereoMode::None
    }

    /// Number of slots, i.e. maximum concurrent users.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub(crate) fn clear_assignments(&mut self) {
        for slot in &mut self.slots {
            slot.assigned_user = None;
        }
    }

    pub(crate) fn assign(&mut self, range: std::ops::Range<usize>, user: UserId) {
        for slot in &mut self.slots[range] {
            slot.assigned_user = Some(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passive_powerwall() {
        let d = PhysicalDisplay::from_config(DisplayId(0), &DisplayConfig::large_powerwall()).unwrap();
        assert_eq!(d.stereo_mode(), StereoMode::PassiveStereo);
        assert_eq!(d.capacity(), 3);
        let timing = d.slot(1).unwrap().timing.as_ref().unwrap();
        assert_eq!(timing.open.times, vec![8200, 10700]);
        assert_eq!(timing.open.values, vec![0x22, 0x44]);
        assert_eq!(timing.close.values, vec![0x88, 0x11]);
    }

    #[test]
    fn active_and_mono_modes() {
        let active = PhysicalDisplay::from_config(DisplayId(1), &DisplayConfig::small_powerwall()).unwrap();
        assert_eq!(active.stereo_mode(), StereoMode::ActiveStereo);
        assert_eq!(active.capacity(), 2);
        assert_eq!(active.slot(0).unwrap().timing.as_ref().unwrap().close.values, vec![0x02, 0x08, 0x04, 0x01]);

        let mono = PhysicalDisplay::from_config(DisplayId(2), &DisplayConfig::desktop("daedalos")).unwrap();
        assert_eq!(mono.stereo_mode(), StereoMode::None);
        assert_eq!(mono.name(), "daedalos_display");
        assert!(mono.slot(0).unwrap().timing.is_none());
    }

    #[test]
    fn rejects_bad_hex() {
        let mut cfg = DisplayConfig::large_powerwall();
        cfg.shutter_timings[0].open_values[0] = "zz".into();
        assert!(matches!(
            PhysicalDisplay::from_config(DisplayId(0), &cfg),
            Err(HyperError::Config { .. })
        ));
    }

    #[test]
    fn rejects_mixed_half_lengths() {
        let mut cfg = DisplayConfig::large_powerwall();
        cfg.shutter_timings[2] = DisplayConfig::small_powerwall().shutter_timings[0].clone();
        assert!(PhysicalDisplay::from_config(DisplayId(0), &cfg).is_err());
    }

    #[test]
    fn rejects_three_events_per_half() {
        let mut cfg = DisplayConfig::desktop("x");
        cfg.shutter_timings.push(SlotTimingConfig::new(&[1, 2, 3], &[4, 5, 6], &["1", "2", "3"], &["4", "5", "6"]));
        assert!(PhysicalDisplay::from_config(DisplayId(0), &cfg).is_err());
    }

    #[test]
    fn rejects_too_few_rows() {
        let mut cfg = DisplayConfig::large_powerwall();
        cfg.shutter_timings.truncate(2);
        assert!(PhysicalDisplay::from_config(DisplayId(0), &cfg).is_err());
    }

    #[test]
    fn config_parses_from_toml() {
        let text = r#"
            name = "wall"
            displaystrings = [":0.0"]
            [[shutter_timings]]
            open_times = [0, 8175]
            close_times = [100, 8275]
            open_values = ["22", "44"]
            close_values = ["88", "11"]
        "#;
        let cfg: DisplayConfig = toml::from_str(text).unwrap();
        let d = PhysicalDisplay::from_config(DisplayId(3), &cfg).unwrap();
        assert_eq!(d.stereo_mode(), StereoMode::PassiveStereo);
        assert_eq!(d.hostname(), "");
    }
}
