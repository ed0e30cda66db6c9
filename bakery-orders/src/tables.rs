//! Static price tables.
//!
//! Tables are plain configuration: they are read once (from the built-in
//! YAML or a user file), checked for internal consistency, and then shared
//! read-only by every [`Configurator`](crate::configurator::Configurator).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::availability::SlotKind;
use crate::error::TableError;
use crate::models::Category;

/// Whole Rand. Deltas may be negative.
pub type Amount = i64;

const BUILTIN_TABLES: &str = include_str!("../config/price_tables.yml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    pub delta: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    #[default]
    Option,
    /// Itemized only when it costs something; collection is free.
    Delivery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionGroup {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_label: Option<String>,
    #[serde(default)]
    pub role: GroupRole,
    pub default: String,
    /// When false the customer has to pick explicitly before the group counts
    /// towards form completion.
    #[serde(default = "default_true")]
    pub default_ok: bool,
    pub choices: Vec<Choice>,
}

fn default_true() -> bool {
    true
}

impl OptionGroup {
    pub fn choice(&self, key: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.key == key)
    }

    /// Breakdown label for `choice` in this group.
    pub fn line_label(&self, choice: &Choice) -> String {
        if let Some(label) = &self.line_label {
            return label.clone();
        }
        match &choice.label {
            Some(label) => label.clone(),
            None => format!("{} {}", title_case(&choice.key), self.label),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extra {
    pub id: String,
    pub delta: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Extra {
    pub fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| title_case(&self.id))
    }
}

/// Where a product's base price comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BasePricing {
    Flat { label: String, price: Amount },
    /// The active choice of `group` is a quantity tier whose delta is the
    /// whole base price.
    Tier { group: String },
    /// The active choice of `group` is a unit price, billed for at least
    /// `minimum` units.
    PerUnit { group: String, minimum: u32 },
}

impl BasePricing {
    /// Group whose choice is consumed as the base rather than a delta.
    pub fn group(&self) -> Option<&str> {
        match self {
            BasePricing::Flat { .. } => None,
            BasePricing::Tier { group } | BasePricing::PerUnit { group, .. } => Some(group),
        }
    }
}

/// Option groups, extras and base pricing of one product, shared by
/// categories and bolt-ons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductTable {
    pub base: BasePricing,
    #[serde(default)]
    pub groups: Vec<OptionGroup>,
    #[serde(default)]
    pub extras: Vec<Extra>,
}

impl ProductTable {
    pub fn group(&self, id: &str) -> Option<&OptionGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn extra(&self, id: &str) -> Option<&Extra> {
        self.extras.iter().find(|e| e.id == id)
    }

    /// Active choice key of every group before the customer touches anything.
    pub fn defaults(&self) -> BTreeMap<String, String> {
        self.groups
            .iter()
            .map(|g| (g.id.clone(), g.default.clone()))
            .collect()
    }

    fn validate(&self, scope: &str) -> Result<(), TableError> {
        let mut seen = BTreeSet::new();
        for group in &self.groups {
            if !seen.insert(group.id.as_str()) {
                return Err(TableError::invalid(scope, format!("duplicate group '{}'", group.id)));
            }
            let mut keys = BTreeSet::new();
            for choice in &group.choices {
                if !keys.insert(choice.key.as_str()) {
                    return Err(TableError::invalid(
                        scope,
                        format!("duplicate choice '{}' in group '{}'", choice.key, group.id),
                    ));
                }
            }
            if group.choice(&group.default).is_none() {
                return Err(TableError::invalid(
                    scope,
                    format!("default '{}' is not a choice of group '{}'", group.default, group.id),
                ));
            }
        }

        if let Some(base_group) = self.base.group() {
            if self.group(base_group).is_none() {
                return Err(TableError::invalid(
                    scope,
                    format!("base pricing refers to unknown group '{}'", base_group),
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for extra in &self.extras {
            if !seen.insert(extra.id.as_str()) {
                return Err(TableError::invalid(scope, format!("duplicate extra '{}'", extra.id)));
            }
            if extra.delta < 0 {
                return Err(TableError::invalid(
                    scope,
                    format!("extra '{}' has a negative price", extra.id),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub label: String,
    pub price: Amount,
    #[serde(default)]
    pub slot: SlotKind,
    /// Choices pre-set when the package is picked.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    /// Choices included in the package price, per group. Groups not listed
    /// here carry no bundle restriction.
    #[serde(default)]
    pub basic: BTreeMap<String, Vec<String>>,
}

impl Package {
    pub fn includes(&self, group: &str, choice: &str) -> bool {
        match self.basic.get(group) {
            Some(allowed) => allowed.iter().any(|c| c == choice),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoltOnTable {
    /// Summary label, prefixed with the chosen tier ("12 Additional Cupcakes").
    pub label: String,
    #[serde(flatten)]
    pub product: ProductTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTable {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_endpoint: Option<String>,
    #[serde(flatten)]
    pub product: ProductTable,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub bolt_ons: BTreeMap<Category, BoltOnTable>,
    /// Free-text fields the order form marks as required.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

impl CategoryTable {
    pub fn package(&self, id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }

    fn validate(&self, category: Category) -> Result<(), TableError> {
        let scope = category.as_str();
        self.product.validate(scope)?;

        let mut seen = BTreeSet::new();
        for package in &self.packages {
            if !seen.insert(package.id.as_str()) {
                return Err(TableError::invalid(scope, format!("duplicate package '{}'", package.id)));
            }
            let referenced = package
                .defaults
                .iter()
                .map(|(g, c)| (g, std::slice::from_ref(c)))
                .chain(package.basic.iter().map(|(g, cs)| (g, cs.as_slice())));
            for (group_id, choices) in referenced {
                let group = self.product.group(group_id).ok_or_else(|| {
                    TableError::invalid(
                        scope,
                        format!("package '{}' refers to unknown group '{}'", package.id, group_id),
                    )
                })?;
                if let Some(missing) = choices.iter().find(|c| group.choice(c).is_none()) {
                    return Err(TableError::invalid(
                        scope,
                        format!(
                            "package '{}' refers to unknown choice '{}' in group '{}'",
                            package.id, missing, group_id
                        ),
                    ));
                }
            }
        }

        for (bolt_on, table) in &self.bolt_ons {
            if *bolt_on == category {
                return Err(TableError::invalid(scope, "a category cannot be its own bolt-on"));
            }
            table
                .product
                .validate(&format!("{} bolt-on {}", scope, bolt_on.as_str()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTables {
    categories: BTreeMap<Category, CategoryTable>,
}

impl PriceTables {
    /// The bakery's own prices, compiled into the binary.
    pub fn builtin() -> Result<Self, TableError> {
        Self::from_yaml(BUILTIN_TABLES)
    }

    pub fn from_yaml(input: &str) -> Result<Self, TableError> {
        let tables: PriceTables = serde_yaml::from_str(input)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn load(path: &Path) -> Result<Self, TableError> {
        info!("Loading price tables from {}", path.display());
        let input = fs::read_to_string(path)?;
        Self::from_yaml(&input)
    }

    /// `<config dir>/bakery-orders/price_tables.yml`, the override location
    /// checked when no explicit path is given.
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("bakery-orders");
        path.push("price_tables.yml");
        Some(path)
    }

    /// Explicit file, else the user override if present, else built-in.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, TableError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("Using built-in price tables");
                Self::builtin()
            }
        }
    }

    pub fn category(&self, category: Category) -> Option<&CategoryTable> {
        self.categories.get(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &CategoryTable)> {
        self.categories.iter().map(|(c, t)| (*c, t))
    }

    fn validate(&self) -> Result<(), TableError> {
        for (category, table) in &self.categories {
            table.validate(*category)?;
        }
        debug!("Validated price tables for {} categories", self.categories.len());
        Ok(())
    }
}

/// "edible-glitter" -> "Edible Glitter"
pub fn title_case(id: &str) -> String {
    id.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
