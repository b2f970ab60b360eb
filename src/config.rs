use std::env;

/// Keywords that mark a packing slip as hazardous material.
pub const DEFAULT_HAZMAT_KEYWORDS: &[&str] = &[
    "deo",
    "deodorant",
    "perfume",
    "parfum",
    "freshener",
    "edp",
    "edt",
    "extrait",
];

/// Knobs that change how a batch is read and routed.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub hazmat_keywords: Vec<String>,
    pub hazmat_sticker: bool,
    pub thresholds: SortThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortThresholds {
    /// Single-item occurrences a SKU needs before it is picked in the warehouse.
    pub warehouse_min_occurrences: usize,
    /// Single-item occurrences that split a SKU into its own output file.
    pub high_volume_threshold: usize,
    /// Warehouse orders a SKU needs before its slips carry an "n of m" count.
    pub label_count_min: usize,
}

impl Default for SortThresholds {
    fn default() -> Self {
        Self {
            warehouse_min_occurrences: 5,
            high_volume_threshold: 100,
            label_count_min: 5,
        }
    }
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            hazmat_keywords: DEFAULT_HAZMAT_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
            hazmat_sticker: true,
            thresholds: SortThresholds::default(),
        }
    }
}

impl SorterConfig {
    pub fn from_env() -> Self {
        let defaults = SortThresholds::default();
        let hazmat_keywords = env::var("HAZMAT_KEYWORDS")
            .ok()
            .map(|raw| parse_keywords(&raw))
            .filter(|keywords| !keywords.is_empty())
            .unwrap_or_else(|| Self::default().hazmat_keywords);
        let hazmat_sticker = env::var("HAZMAT_STICKER")
            .ok()
            .and_then(|value| parse_bool(&value))
            .unwrap_or(true);
        Self {
            hazmat_keywords,
            hazmat_sticker,
            thresholds: SortThresholds {
                warehouse_min_occurrences: positive_from_env(
                    "WAREHOUSE_MIN_OCCURRENCES",
                    defaults.warehouse_min_occurrences,
                ),
                high_volume_threshold: positive_from_env(
                    "HIGH_VOLUME_THRESHOLD",
                    defaults.high_volume_threshold,
                ),
                label_count_min: positive_from_env("LABEL_COUNT_MIN", defaults.label_count_min),
            },
        }
    }
}

/// Splits a comma separated keyword list, dropping blanks.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn positive_from_env(key: &str, fallback: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_trimmed_and_blank_entries_dropped() {
        let parsed = parse_keywords(" deo, perfume ,, ,edt");
        assert_eq!(parsed, vec!["deo", "perfume", "edt"]);
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_match_documented_thresholds() {
        let cfg = SorterConfig::default();
        assert_eq!(cfg.thresholds.warehouse_min_occurrences, 5);
        assert_eq!(cfg.thresholds.high_volume_threshold, 100);
        assert_eq!(cfg.hazmat_keywords.len(), DEFAULT_HAZMAT_KEYWORDS.len());
        assert!(cfg.hazmat_sticker);
    }
}
