//! Streaming analytics over device updates
//!
//! The accumulator is a plain value folded over the update stream. It is owned by
//! a single task (the analytics actor), so it needs no locking. Two accumulators
//! can be merged, which lets partial folds be combined in any grouping.

use serde::{Deserialize, Serialize};

use crate::actors::messages::UpdateEvent;
use crate::alerts;
use crate::devices::DeviceState;

/// Running statistics over every update seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsAccumulator {
    pub total_updates: u64,
    pub temp_sum: f64,
    pub temp_count: u64,
    pub brightness_sum: u64,
    pub battery_sum: f64,
    pub battery_count: u64,
    pub critical_event_count: u64,
}

/// Final statistics of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_updates: u64,

    /// Mean thermostat temperature (0 without thermostat updates)
    pub average_temp: f64,

    /// Sum of brightness over all updates of bulbs that were on
    pub total_brightness: u64,

    /// Mean camera battery level (0 without camera updates)
    pub average_battery: f64,

    pub critical_event_count: u64,
}

impl AnalyticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one update into the accumulator
    pub fn fold(mut self, event: &UpdateEvent) -> Self {
        self.record(event);
        self
    }

    /// In-place variant of [`fold`](Self::fold)
    pub fn record(&mut self, event: &UpdateEvent) {
        self.total_updates += 1;

        match &event.state {
            DeviceState::Thermostat(thermostat) => {
                self.temp_sum += thermostat.current_temp;
                self.temp_count += 1;
            }
            DeviceState::Bulb(bulb) => {
                if bulb.is_on {
                    self.brightness_sum += u64::from(bulb.brightness);
                }
            }
            DeviceState::Camera(camera) => {
                self.battery_sum += camera.battery_level;
                self.battery_count += 1;
            }
        }

        if alerts::is_critical(event) {
            self.critical_event_count += 1;
        }
    }

    /// Combine two partial folds
    pub fn merge(self, other: Self) -> Self {
        Self {
            total_updates: self.total_updates + other.total_updates,
            temp_sum: self.temp_sum + other.temp_sum,
            temp_count: self.temp_count + other.temp_count,
            brightness_sum: self.brightness_sum + other.brightness_sum,
            battery_sum: self.battery_sum + other.battery_sum,
            battery_count: self.battery_count + other.battery_count,
            critical_event_count: self.critical_event_count + other.critical_event_count,
        }
    }

    /// Compute the summary; does not modify the accumulator
    pub fn summary(&self) -> AnalyticsSummary {
        AnalyticsSummary {
            total_updates: self.total_updates,
            average_temp: average(self.temp_sum, self.temp_count),
            total_brightness: self.brightness_sum,
            average_battery: average(self.battery_sum, self.battery_count),
            critical_event_count: self.critical_event_count,
        }
    }
}

impl<'a> FromIterator<&'a UpdateEvent> for AnalyticsAccumulator {
    fn from_iter<I: IntoIterator<Item = &'a UpdateEvent>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::fold)
    }
}

fn average(sum: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}
