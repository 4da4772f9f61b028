//! Historical delay aggregates keyed on raw category values
//!
//! Tables are snapshots of the training corpus and never update afterwards.

use crate::features::HistoricalStats;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Value used when a key has no history
pub const MISSING_STATISTIC: f64 = 0.0;

/// Directed (origin, destination) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub origin: String,
    pub destination: String,
}

impl RouteKey {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.origin, self.destination)
    }
}

/// Running arithmetic mean
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAccumulator {
    sum: f64,
    count: u64,
}

impl MeanAccumulator {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Frozen lookup tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsTables {
    /// airline -> mean delay minutes
    pub airline_avg_delay: BTreeMap<String, f64>,
    /// (origin, destination) -> mean delay minutes
    #[serde(with = "route_entries")]
    pub route_avg_delay: HashMap<RouteKey, f64>,
    /// hour of day -> fraction of late departures
    pub hour_delay_rate: BTreeMap<u32, f64>,
}

impl StatisticsTables {
    pub fn airline_avg_delay(&self, airline: &str) -> Option<f64> {
        self.airline_avg_delay.get(airline).copied()
    }

    pub fn route_avg_delay(&self, route: &RouteKey) -> Option<f64> {
        self.route_avg_delay.get(route).copied()
    }

    pub fn hour_delay_rate(&self, hour: u32) -> Option<f64> {
        self.hour_delay_rate.get(&hour).copied()
    }

    /// All three lookups with the missing-statistic policy applied
    pub fn lookup_all(
        &self,
        airline: &str,
        origin: &str,
        destination: &str,
        hour: u32,
    ) -> HistoricalStats {
        let route = RouteKey::new(origin, destination);
        HistoricalStats {
            airline_avg_delay: self
                .airline_avg_delay(airline)
                .unwrap_or(MISSING_STATISTIC),
            route_avg_delay: self.route_avg_delay(&route).unwrap_or(MISSING_STATISTIC),
            hour_delay_rate: self.hour_delay_rate(hour).unwrap_or(MISSING_STATISTIC),
        }
    }
}

/// Accumulates training rows into [`StatisticsTables`]
#[derive(Debug, Default)]
pub struct StatisticsBuilder {
    airline: BTreeMap<String, MeanAccumulator>,
    route: HashMap<RouteKey, MeanAccumulator>,
    hour: BTreeMap<u32, MeanAccumulator>,
}

impl StatisticsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(
        &mut self,
        airline: &str,
        origin: &str,
        destination: &str,
        hour: u32,
        delay_minutes: f64,
        is_late: bool,
    ) {
        self.airline
            .entry(airline.to_string())
            .or_default()
            .push(delay_minutes);
        self.route
            .entry(RouteKey::new(origin, destination))
            .or_default()
            .push(delay_minutes);
        self.hour
            .entry(hour)
            .or_default()
            .push(if is_late { 1.0 } else { 0.0 });
    }

    pub fn build(self) -> StatisticsTables {
        fn means<K: Ord + std::hash::Hash + Eq, C: FromIterator<(K, f64)>>(
            acc: impl IntoIterator<Item = (K, MeanAccumulator)>,
        ) -> C {
            acc.into_iter()
                .filter_map(|(k, m)| m.mean().map(|mean| (k, mean)))
                .collect()
        }

        StatisticsTables {
            airline_avg_delay: means(self.airline),
            route_avg_delay: means(self.route),
            hour_delay_rate: means(self.hour),
        }
    }
}

/// Routes persist as a list: JSON object keys must be strings
mod route_entries {
    use super::RouteKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize)]
    struct RouteEntry {
        origin: String,
        destination: String,
        mean_delay: f64,
    }

    pub fn serialize<S: Serializer>(
        routes: &HashMap<RouteKey, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<RouteEntry> = routes
            .iter()
            .map(|(key, mean)| RouteEntry {
                origin: key.origin.clone(),
                destination: key.destination.clone(),
                mean_delay: *mean,
            })
            .collect();
        // stable output for identical tables
        entries.sort_by(|a, b| (&a.origin, &a.destination).cmp(&(&b.origin, &b.destination)));
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<RouteKey, f64>, D::Error> {
        let entries = Vec::<RouteEntry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|e| (RouteKey::new(e.origin, e.destination), e.mean_delay))
            .collect())
    }
}
