use log::warn;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "stopwatch.json";

/// The shortest period any thread waits for, whatever the config says.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Stopwatch settings, stored as JSON. Missing fields take their default values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Tick period of each counter, tenths first.
    pub periods_ms: [u64; 4],
    /// Takes a lap automatically every this many milliseconds. When not set, laps are taken by
    /// pressing Enter.
    pub lap_period_ms: Option<u64>,
    /// Stops after this many laps.
    pub max_laps: Option<u32>,
    /// Wait between a lap trigger and reading the counters.
    pub debounce_ms: u64,
    /// Wait after updating the display before accepting another lap.
    pub settle_ms: u64,
}

impl Config {
    /// Gets the path of the config file, from the `CONFIG_FILE` environment variable.
    pub fn path() -> PathBuf {
        var_os("CONFIG_FILE")
            .unwrap_or_else(|| OsString::from(DEFAULT_CONFIG_FILE))
            .into()
    }

    pub fn try_load() -> Option<Self> {
        Self::try_load_from(&Self::path())
    }

    pub fn try_load_from(config_path: &Path) -> Option<Self> {
        if !config_path.exists() {
            return None;
        }
        let file = std::fs::File::open(config_path).ok()?;
        let reader = std::io::BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(config) => Some(Self::validated(config)),
            Err(e) => {
                warn!("Failed to parse {}: {}", config_path.display(), e);
                None
            }
        }
    }

    /// Replaces zero periods, which would make the threads busy-loop, with the defaults.
    pub fn validated(mut self) -> Self {
        let defaults = Config::default();
        for (unit, (period, default)) in self
            .periods_ms
            .iter_mut()
            .zip(defaults.periods_ms)
            .enumerate()
        {
            if *period == 0 {
                warn!("Counter {} period is 0, using {} ms", unit, default);
                *period = default;
            }
        }
        if self.lap_period_ms == Some(0) {
            warn!("Lap period is 0, taking laps from stdin instead");
            self.lap_period_ms = defaults.lap_period_ms;
        }
        self
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, config_path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn periods(&self) -> [Duration; 4] {
        self.periods_ms.map(Duration::from_millis)
    }

    pub fn lap_period(&self) -> Option<Duration> {
        self.lap_period_ms.map(Duration::from_millis)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            periods_ms: [100, 1_000, 60_000, 3_600_000],
            lap_period_ms: None,
            max_laps: None,
            debounce_ms: 100,
            settle_ms: 20,
        }
    }
}
