//! Built-in plant care knowledge.
//!
//! A small static reference used to ground the agent's answers: species care
//! tables, seasonal adjustments, pest treatments and a fertilizer guide.

use serde::Serialize;

use crate::season::Season;

/// Care table for one species.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CareTable {
    pub light: &'static str,
    pub water: &'static str,
    pub humidity: &'static str,
    pub temperature: &'static str,
    pub soil: &'static str,
    pub fertilizer: &'static str,
}

/// Reference entry for a species.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SpeciesInfo {
    /// Lookup key (`monstera_deliciosa`).
    #[serde(skip)]
    pub key: &'static str,
    pub common_name: &'static str,
    pub scientific_name: &'static str,
    pub family: &'static str,
    pub origin: &'static str,
    pub care: CareTable,
    pub common_issues: &'static [&'static str],
}

/// Seasonal adjustments as `(aspect, advice)` pairs.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SeasonalCare {
    pub season: Season,
    pub tips: &'static [(&'static str, &'static str)],
}

impl SeasonalCare {
    /// Advice for one aspect (`watering`, `fertilizing`, ...).
    pub fn get(&self, aspect: &str) -> Option<&'static str> {
        self.tips
            .iter()
            .find(|(key, _)| *key == aspect)
            .map(|(_, advice)| *advice)
    }

    /// All tips as `"aspect: advice"` lines.
    pub fn lines(&self) -> Vec<String> {
        self.tips
            .iter()
            .map(|(aspect, advice)| format!("{}: {}", aspect, advice))
            .collect()
    }
}

/// One way to get rid of a pest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PestTreatment {
    pub method: &'static str,
    pub description: &'static str,
    pub frequency: &'static str,
}

/// Fertilizing guidance for a season.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FertilizerGuide {
    /// Fall and winter.
    Dormant {
        frequency: &'static str,
        reason: &'static str,
        exceptions: &'static [&'static str],
    },
    /// Spring and summer.
    Growing {
        frequency: &'static str,
        #[serde(rename = "type")]
        kind: &'static str,
        dilution: &'static str,
        application: &'static str,
        signs_needed: &'static [&'static str],
        signs_excess: &'static [&'static str],
    },
}

impl FertilizerGuide {
    /// How often to fertilize.
    pub fn frequency(&self) -> &'static str {
        match self {
            Self::Dormant { frequency, .. } | Self::Growing { frequency, .. } => frequency,
        }
    }
}

static SPECIES: [SpeciesInfo; 2] = [
    SpeciesInfo {
        key: "monstera_deliciosa",
        common_name: "Swiss Cheese Plant",
        scientific_name: "Monstera deliciosa",
        family: "Araceae",
        origin: "Central America",
        care: CareTable {
            light: "Bright, indirect light",
            water: "Water when top 2-3 inches of soil are dry",
            humidity: "Prefers 60% or higher",
            temperature: "65-85°F (18-29°C)",
            soil: "Well-draining potting mix",
            fertilizer: "Monthly during growing season",
        },
        common_issues: &[
            "Yellow leaves: Overwatering or nutrient deficiency",
            "Brown tips: Low humidity or fluoride in water",
            "No fenestrations: Needs more light or maturity",
        ],
    },
    SpeciesInfo {
        key: "ficus_lyrata",
        common_name: "Fiddle Leaf Fig",
        scientific_name: "Ficus lyrata",
        family: "Moraceae",
        origin: "West Africa",
        care: CareTable {
            light: "Bright, indirect to direct light",
            water: "Water when top inch is dry",
            humidity: "40-60%",
            temperature: "60-75°F (15-24°C)",
            soil: "Well-draining, slightly acidic",
            fertilizer: "Every 2-4 weeks in growing season",
        },
        common_issues: &[
            "Brown spots: Root rot or bacterial infection",
            "Dropping leaves: Stress from environmental changes",
            "Yellowing: Overwatering or poor drainage",
        ],
    },
];

static SEASONAL: [SeasonalCare; 4] = [
    SeasonalCare {
        season: Season::Spring,
        tips: &[
            ("general", "Active growing season begins"),
            ("watering", "Increase frequency as growth accelerates"),
            ("fertilizing", "Resume regular feeding schedule"),
            ("repotting", "Best time for repotting if needed"),
            ("pruning", "Good time for pruning and propagation"),
        ],
    },
    SeasonalCare {
        season: Season::Summer,
        tips: &[
            ("general", "Peak growing season"),
            ("watering", "Monitor closely, may need daily watering"),
            ("fertilizing", "Regular feeding every 2-4 weeks"),
            ("humidity", "Increase humidity for tropical plants"),
            ("pests", "Watch for pest infestations"),
        ],
    },
    SeasonalCare {
        season: Season::Fall,
        tips: &[
            ("general", "Growth slows down"),
            ("watering", "Gradually reduce frequency"),
            ("fertilizing", "Reduce or stop feeding"),
            ("light", "Consider grow lights as days shorten"),
            ("preparation", "Prepare for dormancy"),
        ],
    },
    SeasonalCare {
        season: Season::Winter,
        tips: &[
            ("general", "Dormant season for most plants"),
            ("watering", "Minimal watering, let soil dry more"),
            ("fertilizing", "Stop fertilizing most plants"),
            ("temperature", "Keep away from cold drafts"),
            ("humidity", "Combat dry indoor air"),
        ],
    },
];

static APHIDS: [PestTreatment; 2] = [
    PestTreatment {
        method: "Neem oil spray",
        description: "Mix 2 tsp neem oil with 1 quart water and spray",
        frequency: "Every 3-4 days until gone",
    },
    PestTreatment {
        method: "Insecticidal soap",
        description: "Spray directly on aphids",
        frequency: "Daily until eliminated",
    },
];

static SPIDER_MITES: [PestTreatment; 2] = [
    PestTreatment {
        method: "Increase humidity",
        description: "Mist regularly or use humidifier",
        frequency: "Daily",
    },
    PestTreatment {
        method: "Rubbing alcohol",
        description: "70% isopropyl alcohol on cotton swab",
        frequency: "Spot treat affected areas",
    },
];

static FUNGUS_GNATS: [PestTreatment; 2] = [
    PestTreatment {
        method: "Let soil dry",
        description: "Allow top 2 inches to dry between watering",
        frequency: "Adjust watering schedule",
    },
    PestTreatment {
        method: "Sticky traps",
        description: "Yellow sticky traps near soil",
        frequency: "Replace when full",
    },
];

fn normalize(identifier: &str) -> String {
    identifier.trim().to_lowercase().replace(' ', "_")
}

/// Look up a species by key, scientific or common name.
///
/// Tries an exact key match first, then a partial match of either the
/// normalized or the plain lowercase identifier against keys and common names.
pub fn plant_info(identifier: &str) -> Option<&'static SpeciesInfo> {
    let normalized = normalize(identifier);
    if normalized.is_empty() {
        return None;
    }
    if let Some(info) = SPECIES.iter().find(|s| s.key == normalized) {
        return Some(info);
    }

    let plain = identifier.trim().to_lowercase();
    SPECIES.iter().find(|s| {
        let common = s.common_name.to_lowercase();
        s.key.contains(&normalized) || common.contains(&normalized) || common.contains(&plain)
    })
}

/// All known species.
pub fn all_species() -> &'static [SpeciesInfo] {
    &SPECIES
}

/// Seasonal care adjustments.
pub fn seasonal_care(season: Season) -> &'static SeasonalCare {
    match season {
        Season::Spring => &SEASONAL[0],
        Season::Summer => &SEASONAL[1],
        Season::Fall => &SEASONAL[2],
        Season::Winter => &SEASONAL[3],
    }
}

/// Treatments for a pest; empty when the pest is unknown.
///
/// Accepts `spider mites` as well as `spider_mites`.
pub fn pest_solutions(pest: &str) -> &'static [PestTreatment] {
    match normalize(pest).as_str() {
        "aphids" | "aphid" => &APHIDS,
        "spider_mites" | "spider_mite" => &SPIDER_MITES,
        "fungus_gnats" | "fungus_gnat" => &FUNGUS_GNATS,
        _ => &[],
    }
}

/// Names of pests with known treatments.
pub fn known_pests() -> [&'static str; 3] {
    ["aphids", "spider_mites", "fungus_gnats"]
}

/// Fertilizer guidance for the season.
pub fn fertilizer_guide(season: Season) -> FertilizerGuide {
    if season.is_dormant() {
        FertilizerGuide::Dormant {
            frequency: "Reduce or stop fertilizing",
            reason: "Most plants are dormant",
            exceptions: &["Winter-blooming plants", "Actively growing tropicals"],
        }
    } else {
        FertilizerGuide::Growing {
            frequency: "Every 2-4 weeks",
            kind: "Balanced liquid fertilizer (10-10-10)",
            dilution: "Half strength recommended on package",
            application: "Water first, then apply fertilizer",
            signs_needed: &["Slow growth", "Pale leaves", "Small new leaves"],
            signs_excess: &["Salt buildup", "Brown leaf tips", "Rapid weak growth"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        let info = plant_info("Monstera Deliciosa").unwrap();
        assert_eq!(info.family, "Araceae");
    }

    #[test]
    fn test_partial_lookup() {
        assert_eq!(plant_info("ficus").unwrap().common_name, "Fiddle Leaf Fig");
        assert_eq!(plant_info("swiss cheese").unwrap().key, "monstera_deliciosa");
        assert_eq!(plant_info("Fiddle Leaf").unwrap().key, "ficus_lyrata");
        assert!(plant_info("cactus").is_none());
        assert!(plant_info("  ").is_none());
    }

    #[test]
    fn test_seasonal_care() {
        let winter = seasonal_care(Season::Winter);
        assert_eq!(winter.get("fertilizing"), Some("Stop fertilizing most plants"));
        assert_eq!(winter.lines().len(), 5);
        assert!(seasonal_care(Season::Spring).get("repotting").is_some());
    }

    #[test]
    fn test_pests() {
        assert_eq!(pest_solutions("Aphids").len(), 2);
        assert_eq!(pest_solutions("spider mites")[0].method, "Increase humidity");
        assert!(pest_solutions("locusts").is_empty());
    }

    #[test]
    fn test_fertilizer_guide() {
        assert_eq!(fertilizer_guide(Season::Fall).frequency(), "Reduce or stop fertilizing");
        assert_eq!(fertilizer_guide(Season::Summer).frequency(), "Every 2-4 weeks");

        let json = serde_json::to_value(fertilizer_guide(Season::Spring)).unwrap();
        assert_eq!(json["type"], "Balanced liquid fertilizer (10-10-10)");
    }
}
