use std::path::PathBuf;
use std::str::FromStr;

/// Rooms the inn rents out when `INNKEEP_ROOMS` is not set.
pub fn default_rooms() -> Vec<String> {
    let mut rooms: Vec<String> = ["105", "107", "109"].iter().map(|r| r.to_string()).collect();
    rooms.extend((110..=120).map(|n| n.to_string()));
    rooms.extend((205..=220).map(|n| n.to_string()));
    rooms
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

/// Runtime settings, read from `INNKEEP_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub rooms: Vec<String>,
    /// Skip the WAL entirely; nothing survives a restart.
    pub in_memory: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5001,
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            rooms: default_rooms(),
            in_memory: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let rooms = lookup("INNKEEP_ROOMS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|rooms| !rooms.is_empty())
            .unwrap_or(defaults.rooms);

        Self {
            bind: lookup("INNKEEP_BIND").unwrap_or(defaults.bind),
            port: parsed(&lookup, "INNKEEP_PORT").unwrap_or(defaults.port),
            data_dir: lookup("INNKEEP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: parsed(&lookup, "INNKEEP_METRICS_PORT"),
            compact_threshold: parsed(&lookup, "INNKEEP_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            rooms,
            in_memory: lookup("INNKEEP_IN_MEMORY")
                .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_catalogue_has_thirty_rooms() {
        let rooms = default_rooms();
        assert_eq!(rooms.len(), 30);
        assert_eq!(rooms.first().map(String::as_str), Some("105"));
        assert_eq!(rooms.last().map(String::as_str), Some("220"));
        assert!(!rooms.contains(&"108".to_string()));
    }

    #[test]
    fn empty_env_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
        assert_eq!(Config::default().addr(), "0.0.0.0:5001");
    }

    #[test]
    fn env_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("INNKEEP_BIND", "127.0.0.1"),
            ("INNKEEP_PORT", "8080"),
            ("INNKEEP_DATA_DIR", "/var/lib/innkeep"),
            ("INNKEEP_METRICS_PORT", "9100"),
            ("INNKEEP_COMPACT_THRESHOLD", "50"),
            ("INNKEEP_ROOMS", " 101, 102 ,,103"),
            ("INNKEEP_IN_MEMORY", "1"),
        ]));
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.wal_path(), PathBuf::from("/var/lib/innkeep/innkeep.wal"));
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 50);
        assert_eq!(cfg.rooms, vec!["101", "102", "103"]);
        assert!(cfg.in_memory);
    }

    #[test]
    fn numeric_fields_parse_to_their_own_types() {
        // 70000 overflows a port but is a fine threshold.
        let cfg = Config::from_lookup(lookup(&[
            ("INNKEEP_PORT", "70000"),
            ("INNKEEP_COMPACT_THRESHOLD", "70000"),
        ]));
        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.compact_threshold, 70_000);
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = Config::from_lookup(lookup(&[
            ("INNKEEP_PORT", "not-a-port"),
            ("INNKEEP_COMPACT_THRESHOLD", "-5"),
            ("INNKEEP_ROOMS", " , "),
            ("INNKEEP_IN_MEMORY", "0"),
        ]));
        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.compact_threshold, 1000);
        assert_eq!(cfg.rooms.len(), 30);
        assert!(!cfg.in_memory);
    }
}
