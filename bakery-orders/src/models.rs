use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::configurator::Configurator;
use crate::error::ConfigError;

/// Product line an order belongs to. Serialized with the site's form names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "cakes", alias = "cake")]
    Cake,
    #[serde(rename = "cupcakes", alias = "cupcake")]
    Cupcake,
    #[serde(rename = "cookies", alias = "cookie")]
    Cookie,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Cake, Category::Cupcake, Category::Cookie];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cake => "cakes",
            Category::Cupcake => "cupcakes",
            Category::Cookie => "cookies",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Cake => "Cakes",
            Category::Cupcake => "Cupcakes",
            Category::Cookie => "Cookies",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cake" | "cakes" => Ok(Category::Cake),
            "cupcake" | "cupcakes" => Ok(Category::Cupcake),
            "cookie" | "cookies" => Ok(Category::Cookie),
            other => Err(ConfigError::InvalidCategory(other.to_string())),
        }
    }
}

// Order request read from YAML input
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub category: Category,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default, deserialize_with = "scalar_map")]
    pub choices: BTreeMap<String, String>,
    #[serde(default)]
    pub extras: BTreeSet<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub bolt_ons: BTreeMap<Category, BoltOnRequest>,
    #[serde(default, deserialize_with = "scalar_map")]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BoltOnRequest {
    #[serde(default, deserialize_with = "scalar_map")]
    pub choices: BTreeMap<String, String>,
    #[serde(default)]
    pub extras: BTreeSet<String>,
}

impl OrderRequest {
    /// Replays the request as a sequence of configurator operations. The
    /// first rejected operation is returned and `configurator` is left as it
    /// was.
    pub fn apply(&self, configurator: &mut Configurator) -> Result<(), ConfigError> {
        let mut scratch = configurator.clone();
        self.replay(&mut scratch)?;
        *configurator = scratch;
        Ok(())
    }

    fn replay(&self, configurator: &mut Configurator) -> Result<(), ConfigError> {
        configurator.select_category(self.category)?;

        if let Some(package) = &self.package {
            configurator.select_package(package)?;
        }
        for (group, choice) in &self.choices {
            configurator.set_choice(group, choice)?;
        }
        for extra in &self.extras {
            configurator.toggle_extra(extra)?;
        }
        if let Some(quantity) = self.quantity {
            configurator.set_quantity(quantity)?;
        }

        for (category, bolt_on) in &self.bolt_ons {
            configurator.add_bolt_on(*category)?;
            for (group, choice) in &bolt_on.choices {
                configurator.set_bolt_on_choice(*category, group, choice)?;
            }
            for extra in &bolt_on.extras {
                configurator.toggle_bolt_on_extra(*category, extra)?;
            }
        }

        for (name, value) in &self.fields {
            configurator.set_field(name, value);
        }
        if let Some(date) = self.event_date {
            configurator.set_event_date(date);
        }

        Ok(())
    }
}

/// Accepts bare YAML numbers and booleans (`layers: 4`) as choice keys.
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| match value {
            serde_yaml::Value::String(s) => Ok((key, s)),
            serde_yaml::Value::Number(n) => Ok((key, n.to_string())),
            serde_yaml::Value::Bool(b) => Ok((key, b.to_string())),
            other => Err(de::Error::custom(format!(
                "value for '{}' must be a scalar, got {:?}",
                key, other
            ))),
        })
        .collect()
}
