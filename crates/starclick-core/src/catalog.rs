//! The effect catalog: static definitions of items and achievements.
//!
//! The catalog is built once at startup, validated, and then shared
//! read-only by every command (no locking). It is never mutated at
//! runtime; a new catalog version means a new value.
//!
//! # Design
//!
//! - Items and achievements are keyed maps, so lookups and "already
//!   owned" checks are O(log n) instead of list scans.
//! - Achievements are indexed by [`AchievementFamily`] and sorted by
//!   threshold, so a mutation only evaluates the family it can affect.
//! - [`EffectCatalog::standard`] is the live game's table. Operators can
//!   load an alternative table from YAML with [`EffectCatalog::from_yaml`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use starclick_types::{AchievementFamily, AchievementId, BoosterKind, ItemCategory, ItemId, Stat};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Failed to read the catalog file.
    #[error("failed to read catalog file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse catalog YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Two definitions share an id.
    #[error("duplicate catalog id: {0}")]
    DuplicateId(String),

    /// A definition references an id that does not exist or has the
    /// wrong category.
    #[error("{owner} references {target}, which is not a valid {expected}")]
    BadReference {
        /// The referencing definition.
        owner: String,
        /// The referenced id.
        target: String,
        /// Expected category of the target.
        expected: &'static str,
    },

    /// Upgrade prerequisites form a cycle.
    #[error("upgrade prerequisites form a cycle through {0}")]
    PrerequisiteCycle(String),

    /// A numeric field is out of range.
    #[error("{id}: {reason}")]
    OutOfRange {
        /// The offending definition.
        id: String,
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for CatalogError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// A purchasable item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemDef {
    /// Catalog key.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Price per unit in stars.
    pub cost: u64,
    /// What buying it does.
    pub effect: ItemEffect,
}

impl ItemDef {
    /// The item's broad category.
    pub const fn category(&self) -> ItemCategory {
        match self.effect {
            ItemEffect::Upgrade { .. } => ItemCategory::Upgrade,
            ItemEffect::EnergyPack { .. } => ItemCategory::EnergyPack,
            ItemEffect::Booster { .. } => ItemCategory::Booster,
            ItemEffect::Artifact { .. } => ItemCategory::Artifact,
            ItemEffect::Bundle { .. } => ItemCategory::Bundle,
        }
    }

    /// Whether more than one unit may be bought at once.
    pub const fn is_stackable(&self) -> bool {
        matches!(
            self.effect,
            ItemEffect::EnergyPack { .. } | ItemEffect::Booster { .. } | ItemEffect::Artifact { .. }
        )
    }
}

/// The effect of buying an item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ItemEffect {
    /// Permanent upgrade, owned at most once.
    Upgrade {
        /// Upgrades that must be owned first.
        #[serde(default)]
        requires: Vec<ItemId>,
        /// Stat change.
        boost: UpgradeBoost,
    },
    /// Immediate energy refill.
    EnergyPack {
        /// Energy per unit. `None` refills to capacity.
        #[serde(default)]
        amount: Option<u32>,
    },
    /// Time-limited multiplier. Extra units are stocked for later use.
    Booster {
        /// Income stream affected.
        kind: BoosterKind,
        /// Multiplier (at least 1).
        multiplier: Decimal,
        /// Lifetime in seconds.
        duration_secs: u64,
    },
    /// Repeatable permanent multiplier: `stat = floor(stat * (1 + bonus))`.
    Artifact {
        /// Stat affected.
        stat: Stat,
        /// Fractional bonus per unit.
        bonus: Decimal,
    },
    /// Package of stars, boosters and artifacts.
    Bundle {
        /// Stars granted.
        #[serde(default)]
        stars: u64,
        /// Boosters activated, at most one per kind.
        #[serde(default)]
        boosters: Vec<ItemId>,
        /// Artifacts applied.
        #[serde(default)]
        artifacts: Vec<ItemId>,
        /// Whether the bundle can only be bought once.
        #[serde(default)]
        limited: bool,
    },
}

/// Stat change applied by a permanent upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeBoost {
    /// `click_power = (click_power + add) * multiplier`.
    Click {
        /// Additive part, applied first.
        #[serde(default)]
        add: u64,
        /// Multiplicative part, applied after the additive part.
        #[serde(default)]
        multiplier: Option<u64>,
    },
    /// `max_energy += add`.
    Energy {
        /// Capacity added.
        add: u32,
    },
    /// `passive_income += add`.
    Passive {
        /// Income added.
        add: u64,
    },
    /// `critical_chance += chance; critical_multiplier = multiplier`.
    Critical {
        /// Probability added.
        chance: Decimal,
        /// New critical multiplier (replaces the old one).
        multiplier: u32,
    },
}

/// An achievement: a threshold predicate over one stat family.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AchievementDef {
    /// Catalog key.
    pub id: AchievementId,
    /// Display name.
    pub name: String,
    /// Stat family the predicate reads.
    pub family: AchievementFamily,
    /// Unlocks when the family's value is at least this.
    pub threshold: u64,
    /// Stars granted once on unlock.
    pub reward: u64,
}

/// On-disk catalog layout.
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    version: u32,
    #[serde(default)]
    items: Vec<ItemDef>,
    #[serde(default)]
    achievements: Vec<AchievementDef>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable, versioned lookup table of items and achievements.
#[derive(Debug, Clone)]
pub struct EffectCatalog {
    version: u32,
    items: BTreeMap<ItemId, ItemDef>,
    achievements: BTreeMap<AchievementId, AchievementDef>,
    /// Achievement ids per family, in ascending threshold order.
    by_family: BTreeMap<AchievementFamily, Vec<AchievementId>>,
    upgrade_count: usize,
}

impl EffectCatalog {
    /// Build and validate a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for duplicate ids, dangling or mistyped
    /// references, prerequisite cycles, or out-of-range values.
    pub fn new(
        version: u32,
        items: Vec<ItemDef>,
        achievements: Vec<AchievementDef>,
    ) -> Result<Self, CatalogError> {
        let mut item_map = BTreeMap::new();
        for item in items {
            let key = item.id.clone();
            if let Some(previous) = item_map.insert(key, item) {
                return Err(CatalogError::DuplicateId(previous.id.to_string()));
            }
        }

        let mut achievement_map = BTreeMap::new();
        for achievement in achievements {
            let key = achievement.id.clone();
            if let Some(previous) = achievement_map.insert(key, achievement) {
                return Err(CatalogError::DuplicateId(previous.id.to_string()));
            }
        }

        let catalog = Self::assemble(version, item_map, achievement_map);
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a catalog from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Yaml`] for malformed documents and any
    /// validation error from [`EffectCatalog::new`].
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_yml::from_str(yaml)?;
        Self::new(doc.version, doc.items, doc.achievements)
    }

    /// Read, parse and validate a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the file cannot be read, plus any
    /// error from [`EffectCatalog::from_yaml`].
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn assemble(
        version: u32,
        items: BTreeMap<ItemId, ItemDef>,
        achievements: BTreeMap<AchievementId, AchievementDef>,
    ) -> Self {
        let mut by_family: BTreeMap<AchievementFamily, Vec<&AchievementDef>> = BTreeMap::new();
        for def in achievements.values() {
            by_family.entry(def.family).or_default().push(def);
        }
        let by_family = by_family
            .into_iter()
            .map(|(family, mut defs)| {
                defs.sort_by(|a, b| a.threshold.cmp(&b.threshold).then(a.id.cmp(&b.id)));
                (family, defs.into_iter().map(|d| d.id.clone()).collect())
            })
            .collect();
        let upgrade_count = items
            .values()
            .filter(|i| i.category() == ItemCategory::Upgrade)
            .count();

        Self {
            version,
            items,
            achievements,
            by_family,
            upgrade_count,
        }
    }

    /// Catalog version number.
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Look up an item.
    pub fn item(&self, id: &ItemId) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// All items, ordered by id.
    pub fn items(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.values()
    }

    /// Look up an achievement.
    pub fn achievement(&self, id: &AchievementId) -> Option<&AchievementDef> {
        self.achievements.get(id)
    }

    /// Achievements of one family in ascending threshold order.
    pub fn achievements_in(
        &self,
        family: AchievementFamily,
    ) -> impl Iterator<Item = &AchievementDef> {
        self.by_family
            .get(&family)
            .into_iter()
            .flatten()
            .filter_map(|id| self.achievements.get(id))
    }

    /// Number of permanent upgrades defined.
    pub const fn upgrade_count(&self) -> usize {
        self.upgrade_count
    }

    /// Check every cross-reference and numeric range.
    fn validate(&self) -> Result<(), CatalogError> {
        for item in self.items.values() {
            self.validate_item(item)?;
        }
        self.check_prerequisite_cycles()?;
        for def in self.achievements.values() {
            if def.threshold == 0 {
                return Err(CatalogError::OutOfRange {
                    id: def.id.to_string(),
                    reason: "threshold must be positive".to_owned(),
                });
            }
        }
        Ok(())
    }

    fn validate_item(&self, item: &ItemDef) -> Result<(), CatalogError> {
        let out_of_range = |reason: &str| CatalogError::OutOfRange {
            id: item.id.to_string(),
            reason: reason.to_owned(),
        };
        match &item.effect {
            ItemEffect::Upgrade { requires, boost } => {
                for req in requires {
                    self.expect_category(item, req, ItemCategory::Upgrade, "upgrade")?;
                }
                match *boost {
                    UpgradeBoost::Click { multiplier, .. } if multiplier == Some(0) => {
                        return Err(out_of_range("click multiplier must be at least 1"));
                    }
                    UpgradeBoost::Critical { chance, multiplier } => {
                        if chance.is_sign_negative() || chance > Decimal::ONE {
                            return Err(out_of_range("critical chance must be within [0, 1]"));
                        }
                        if multiplier == 0 {
                            return Err(out_of_range("critical multiplier must be at least 1"));
                        }
                    }
                    UpgradeBoost::Click { .. }
                    | UpgradeBoost::Energy { .. }
                    | UpgradeBoost::Passive { .. } => {}
                }
            }
            ItemEffect::EnergyPack { amount } => {
                if *amount == Some(0) {
                    return Err(out_of_range("energy amount must be positive"));
                }
            }
            ItemEffect::Booster {
                multiplier,
                duration_secs,
                ..
            } => {
                if *multiplier < Decimal::ONE {
                    return Err(out_of_range("booster multiplier must be at least 1"));
                }
                if *duration_secs == 0 {
                    return Err(out_of_range("booster duration must be positive"));
                }
            }
            ItemEffect::Artifact { bonus, .. } => {
                if bonus.is_sign_negative() {
                    return Err(out_of_range("artifact bonus must not be negative"));
                }
            }
            ItemEffect::Bundle {
                boosters,
                artifacts,
                ..
            } => {
                let mut kinds = BTreeSet::new();
                for booster in boosters {
                    self.expect_category(item, booster, ItemCategory::Booster, "booster")?;
                    if let Some(ItemEffect::Booster { kind, .. }) =
                        self.items.get(booster).map(|b| &b.effect)
                    {
                        if !kinds.insert(*kind) {
                            return Err(out_of_range("bundle boosters must differ in kind"));
                        }
                    }
                }
                for artifact in artifacts {
                    self.expect_category(item, artifact, ItemCategory::Artifact, "artifact")?;
                }
            }
        }
        Ok(())
    }

    fn expect_category(
        &self,
        owner: &ItemDef,
        target: &ItemId,
        category: ItemCategory,
        expected: &'static str,
    ) -> Result<(), CatalogError> {
        match self.items.get(target) {
            Some(def) if def.category() == category => Ok(()),
            _ => Err(CatalogError::BadReference {
                owner: owner.id.to_string(),
                target: target.to_string(),
                expected,
            }),
        }
    }

    /// Depth-first search over prerequisite edges.
    fn check_prerequisite_cycles(&self) -> Result<(), CatalogError> {
        let mut done: BTreeSet<&ItemId> = BTreeSet::new();
        for root in self.items.keys() {
            let mut on_path: BTreeSet<&ItemId> = BTreeSet::new();
            self.visit(root, &mut on_path, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        id: &'a ItemId,
        on_path: &mut BTreeSet<&'a ItemId>,
        done: &mut BTreeSet<&'a ItemId>,
    ) -> Result<(), CatalogError> {
        if done.contains(id) {
            return Ok(());
        }
        if !on_path.insert(id) {
            return Err(CatalogError::PrerequisiteCycle(id.to_string()));
        }
        if let Some(ItemEffect::Upgrade { requires, .. }) = self.items.get(id).map(|i| &i.effect) {
            for req in requires {
                self.visit(req, on_path, done)?;
            }
        }
        on_path.remove(id);
        done.insert(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Standard catalog
// ---------------------------------------------------------------------------

impl EffectCatalog {
    /// The live game's catalog.
    pub fn standard() -> Self {
        let items = standard_items()
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        let achievements = standard_achievements()
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect();
        Self::assemble(1, items, achievements)
    }
}

impl Default for EffectCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn upgrade(id: &str, name: &str, cost: u64, requires: &[&str], boost: UpgradeBoost) -> ItemDef {
    ItemDef {
        id: ItemId::from(id),
        name: name.to_owned(),
        cost,
        effect: ItemEffect::Upgrade {
            requires: requires.iter().copied().map(ItemId::from).collect(),
            boost,
        },
    }
}

fn item(id: &str, name: &str, cost: u64, effect: ItemEffect) -> ItemDef {
    ItemDef {
        id: ItemId::from(id),
        name: name.to_owned(),
        cost,
        effect,
    }
}

const fn click(add: u64, multiplier: Option<u64>) -> UpgradeBoost {
    UpgradeBoost::Click { add, multiplier }
}

const fn booster(kind: BoosterKind, multiplier: u32, duration_secs: u64) -> ItemEffect {
    ItemEffect::Booster {
        kind,
        multiplier: Decimal::from_parts(multiplier, 0, 0, false, 0),
        duration_secs,
    }
}

fn standard_items() -> Vec<ItemDef> {
    vec![
        // Click upgrades
        upgrade("basic_click", "Basic Click", 100, &[], click(1, None)),
        upgrade("double_click", "Double Click", 500, &["basic_click"], click(0, Some(2))),
        upgrade("triple_click", "Triple Click", 2000, &["double_click"], click(0, Some(3))),
        upgrade(
            "galactic_click",
            "Galactic Click",
            100_000,
            &["triple_click", "critical_strike"],
            click(0, Some(10)),
        ),
        // Energy upgrades
        upgrade("energy_1", "Energy I", 300, &[], UpgradeBoost::Energy { add: 20 }),
        upgrade("energy_2", "Energy II", 1000, &["energy_1"], UpgradeBoost::Energy { add: 50 }),
        upgrade("energy_3", "Energy III", 5000, &["energy_2"], UpgradeBoost::Energy { add: 100 }),
        upgrade(
            "super_charge",
            "Super Charge",
            15_000,
            &["energy_3"],
            UpgradeBoost::Energy { add: 200 },
        ),
        // Passive upgrades
        upgrade("passive_1", "Passive Income I", 1000, &[], UpgradeBoost::Passive { add: 5 }),
        upgrade(
            "passive_2",
            "Passive Income II",
            5000,
            &["passive_1"],
            UpgradeBoost::Passive { add: 15 },
        ),
        upgrade(
            "passive_3",
            "Passive Income III",
            20_000,
            &["passive_2"],
            UpgradeBoost::Passive { add: 30 },
        ),
        upgrade(
            "star_generator",
            "Star Generator",
            50_000,
            &["passive_3"],
            UpgradeBoost::Passive { add: 50 },
        ),
        // Critical upgrades
        upgrade(
            "critical_strike",
            "Critical Strike",
            10_000,
            &["triple_click"],
            UpgradeBoost::Critical {
                chance: Decimal::from_parts(1, 0, 0, false, 1),
                multiplier: 5,
            },
        ),
        upgrade(
            "quantum_accelerator",
            "Quantum Accelerator",
            200_000,
            &["galactic_click"],
            UpgradeBoost::Critical {
                chance: Decimal::from_parts(2, 0, 0, false, 1),
                multiplier: 10,
            },
        ),
        // Energy packs
        item("energy_small", "Small Energy Pack", 50, ItemEffect::EnergyPack { amount: Some(25) }),
        item("energy_medium", "Medium Energy Pack", 90, ItemEffect::EnergyPack { amount: Some(50) }),
        item("energy_large", "Large Energy Pack", 160, ItemEffect::EnergyPack { amount: Some(100) }),
        item("energy_full", "Full Recharge", 250, ItemEffect::EnergyPack { amount: None }),
        // Boosters
        item("booster_2x_1h", "x2 Clicks (1h)", 200, booster(BoosterKind::Click, 2, 3600)),
        item("booster_3x_30m", "x3 Clicks (30m)", 300, booster(BoosterKind::Click, 3, 1800)),
        item("booster_5x_15m", "x5 Clicks (15m)", 500, booster(BoosterKind::Click, 5, 900)),
        item(
            "booster_passive_2x_2h",
            "x2 Passive Income (2h)",
            400,
            booster(BoosterKind::Passive, 2, 7200),
        ),
        // Artifacts
        item(
            "artifact_star",
            "Star Artifact",
            1000,
            ItemEffect::Artifact {
                stat: Stat::PassiveIncome,
                bonus: Decimal::from_parts(1, 0, 0, false, 1),
            },
        ),
        item(
            "artifact_energy",
            "Energy Artifact",
            2000,
            ItemEffect::Artifact {
                stat: Stat::MaxEnergy,
                bonus: Decimal::from_parts(2, 0, 0, false, 1),
            },
        ),
        item(
            "artifact_click",
            "Click Artifact",
            5000,
            ItemEffect::Artifact {
                stat: Stat::ClickPower,
                bonus: Decimal::from_parts(5, 0, 0, false, 1),
            },
        ),
        // Bundles
        item(
            "special_starter",
            "Starter Pack",
            1,
            ItemEffect::Bundle {
                stars: 5000,
                boosters: vec![ItemId::from("booster_2x_1h")],
                artifacts: Vec::new(),
                limited: true,
            },
        ),
        item(
            "special_weekly",
            "Weekly Pack",
            5000,
            ItemEffect::Bundle {
                stars: 10_000,
                boosters: vec![
                    ItemId::from("booster_3x_30m"),
                    ItemId::from("booster_passive_2x_2h"),
                ],
                artifacts: vec![ItemId::from("artifact_star")],
                limited: false,
            },
        ),
    ]
}

fn achievement(
    id: &str,
    name: &str,
    family: AchievementFamily,
    threshold: u64,
    reward: u64,
) -> AchievementDef {
    AchievementDef {
        id: AchievementId::from(id),
        name: name.to_owned(),
        family,
        threshold,
        reward,
    }
}

fn standard_achievements() -> Vec<AchievementDef> {
    use AchievementFamily::{Ads, Clicks, Levels, Referrals, Stars, Upgrades};
    vec![
        achievement("first_click", "First Click", Clicks, 1, 100),
        achievement("clicks_100", "Clicker", Clicks, 100, 500),
        achievement("clicks_1000", "Dedicated Clicker", Clicks, 1000, 1000),
        achievement("clicks_10000", "Click Master", Clicks, 10_000, 5000),
        achievement("clicks_100000", "Click Legend", Clicks, 100_000, 25_000),
        achievement("stars_1000", "Stargazer", Stars, 1000, 100),
        achievement("stars_10000", "Star Collector", Stars, 10_000, 1000),
        achievement("stars_100000", "Star Hoarder", Stars, 100_000, 10_000),
        achievement("stars_1000000", "Star Magnate", Stars, 1_000_000, 50_000),
        achievement("level_10", "Rising Star", Levels, 10, 1000),
        achievement("level_50", "Veteran", Levels, 50, 5000),
        achievement("level_100", "Legend", Levels, 100, 10_000),
        achievement("first_upgrade", "First Upgrade", Upgrades, 1, 500),
        achievement("upgrades_5", "Collector", Upgrades, 5, 1000),
        achievement("upgrades_10", "Engineer", Upgrades, 10, 5000),
        achievement("upgrades_all", "Inventor", Upgrades, 14, 10_000),
        achievement("first_ad", "First Ad", Ads, 1, 500),
        achievement("ads_10", "Ad Fan", Ads, 10, 1000),
        achievement("ads_100", "Ad Enthusiast", Ads, 100, 10_000),
        achievement("referral_1", "Friendly", Referrals, 1, 1000),
        achievement("referral_5", "Popular", Referrals, 5, 5000),
        achievement("referral_10", "Influencer", Referrals, 10, 10_000),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_validates() {
        let catalog = EffectCatalog::standard();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.upgrade_count(), 14);
        assert_eq!(catalog.version(), 1);
    }

    #[test]
    fn families_are_sorted_by_threshold() {
        let catalog = EffectCatalog::standard();
        let thresholds: Vec<u64> = catalog
            .achievements_in(AchievementFamily::Clicks)
            .map(|a| a.threshold)
            .collect();
        assert_eq!(thresholds, vec![1, 100, 1000, 10_000, 100_000]);
        assert_eq!(catalog.achievements_in(AchievementFamily::Referrals).count(), 3);
    }

    #[test]
    fn item_categories() {
        let catalog = EffectCatalog::standard();
        let get = |id: &str| catalog.item(&ItemId::from(id)).unwrap();
        assert_eq!(get("double_click").category(), ItemCategory::Upgrade);
        assert_eq!(get("energy_full").category(), ItemCategory::EnergyPack);
        assert_eq!(get("booster_5x_15m").category(), ItemCategory::Booster);
        assert_eq!(get("artifact_click").category(), ItemCategory::Artifact);
        assert_eq!(get("special_weekly").category(), ItemCategory::Bundle);
        assert!(get("artifact_click").is_stackable());
        assert!(get("booster_5x_15m").is_stackable());
        assert!(!get("basic_click").is_stackable());
    }

    #[test]
    fn booster_helper_builds_integral_multipliers() {
        let ItemEffect::Booster { multiplier, .. } = booster(BoosterKind::Click, 3, 10) else {
            return;
        };
        assert_eq!(multiplier, Decimal::from(3));
    }

    #[test]
    fn yaml_catalog_loads() {
        let yaml = r"
version: 7
items:
  - id: tap
    name: Tap
    cost: 10
    effect:
      category: upgrade
      boost: { type: click, add: 2 }
  - id: tap_x2
    name: Tap x2
    cost: 40
    effect:
      category: upgrade
      requires: [tap]
      boost: { type: click, multiplier: 2 }
  - id: rush
    name: Rush
    cost: 5
    effect:
      category: booster
      kind: click
      multiplier: '1.5'
      duration_secs: 60
achievements:
  - id: tapper
    name: Tapper
    family: clicks
    threshold: 10
    reward: 50
";
        let catalog = EffectCatalog::from_yaml(yaml).unwrap();
        assert_eq!(catalog.version(), 7);
        assert_eq!(catalog.upgrade_count(), 2);
        assert!(catalog.achievement(&AchievementId::from("tapper")).is_some());
    }

    #[test]
    fn dangling_prerequisite_rejected() {
        let items = vec![upgrade("a", "A", 1, &["missing"], click(1, None))];
        let err = EffectCatalog::new(1, items, Vec::new()).err();
        assert!(matches!(err, Some(CatalogError::BadReference { .. })));
    }

    #[test]
    fn prerequisite_cycle_rejected() {
        let items = vec![
            upgrade("a", "A", 1, &["b"], click(1, None)),
            upgrade("b", "B", 1, &["a"], click(1, None)),
        ];
        let err = EffectCatalog::new(1, items, Vec::new()).err();
        assert!(matches!(err, Some(CatalogError::PrerequisiteCycle(_))));
    }

    #[test]
    fn duplicate_achievement_rejected() {
        let defs = vec![
            achievement("x", "X", AchievementFamily::Ads, 1, 1),
            achievement("x", "X again", AchievementFamily::Ads, 2, 1),
        ];
        let err = EffectCatalog::new(1, Vec::new(), defs).err();
        assert!(matches!(err, Some(CatalogError::DuplicateId(id)) if id == "x"));
    }

    #[test]
    fn bundle_with_two_click_boosters_rejected() {
        let mut items = standard_items();
        items.push(item(
            "greedy",
            "Greedy",
            1,
            ItemEffect::Bundle {
                stars: 0,
                boosters: vec![ItemId::from("booster_2x_1h"), ItemId::from("booster_3x_30m")],
                artifacts: Vec::new(),
                limited: false,
            },
        ));
        let err = EffectCatalog::new(1, items, standard_achievements()).err();
        assert!(matches!(err, Some(CatalogError::OutOfRange { .. })));
    }
}
