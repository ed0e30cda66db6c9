//! Selection state for one in-progress order and the operations that mutate
//! it. Every operation either applies completely or returns an error without
//! touching the order.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::availability::AvailabilitySource;
use crate::error::{ConfigError, Result};
use crate::models::Category;
use crate::pricing::{self, PriceBreakdown};
use crate::submission::Payload;
use crate::tables::{BasePricing, CategoryTable, Package, PriceTables, ProductTable};
use crate::validation::{self, ValidationState};

/// Active choices of one product (the main order or a bolt-on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    choices: BTreeMap<String, String>,
    explicit: BTreeSet<String>,
    extras: BTreeSet<String>,
    quantity: Option<u32>,
}

impl Selection {
    pub fn new(table: &ProductTable) -> Self {
        Self {
            choices: table.defaults(),
            explicit: BTreeSet::new(),
            extras: BTreeSet::new(),
            quantity: None,
        }
    }

    pub fn choice(&self, group: &str) -> Option<&str> {
        self.choices.get(group).map(String::as_str)
    }

    pub fn choices(&self) -> impl Iterator<Item = (&str, &str)> {
        self.choices.iter().map(|(g, c)| (g.as_str(), c.as_str()))
    }

    /// Whether the customer picked this group themselves.
    pub fn is_explicit(&self, group: &str) -> bool {
        self.explicit.contains(group)
    }

    pub fn has_extra(&self, id: &str) -> bool {
        self.extras.contains(id)
    }

    pub fn extras(&self) -> impl Iterator<Item = &str> {
        self.extras.iter().map(String::as_str)
    }

    /// Quantity as entered, before any minimum is applied.
    pub fn quantity(&self) -> Option<u32> {
        self.quantity
    }

    fn set_choice(&mut self, table: &ProductTable, group_id: &str, key: &str) -> Result<()> {
        let group = table
            .group(group_id)
            .ok_or_else(|| ConfigError::UnknownGroup(group_id.to_string()))?;
        if group.choice(key).is_none() {
            return Err(ConfigError::UnknownChoice {
                group: group_id.to_string(),
                choice: key.to_string(),
            });
        }

        if self.choice(group_id) == Some(key) && self.is_explicit(group_id) {
            return Ok(());
        }
        self.choices.insert(group_id.to_string(), key.to_string());
        self.explicit.insert(group_id.to_string());
        Ok(())
    }

    fn toggle_extra(&mut self, table: &ProductTable, id: &str) -> Result<()> {
        if table.extra(id).is_none() {
            return Err(ConfigError::UnknownExtra(id.to_string()));
        }
        if !self.extras.remove(id) {
            self.extras.insert(id.to_string());
        }
        Ok(())
    }

    /// Resets every group the customer has not touched to the package's
    /// implied choice, or the group default when the package says nothing.
    fn apply_package(&mut self, table: &ProductTable, package: &Package) {
        for group in &table.groups {
            if self.is_explicit(&group.id) {
                continue;
            }
            let key = package.defaults.get(&group.id).unwrap_or(&group.default);
            self.choices.insert(group.id.clone(), key.clone());
        }
    }
}

/// Everything the customer has entered for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderState {
    category: Category,
    package: Option<String>,
    selection: Selection,
    bolt_ons: BTreeMap<Category, Selection>,
    fields: BTreeMap<String, String>,
    event_date: Option<NaiveDate>,
}

impl OrderState {
    fn new(category: Category, table: &CategoryTable) -> Self {
        Self {
            category,
            package: None,
            selection: Selection::new(&table.product),
            bolt_ons: BTreeMap::new(),
            fields: BTreeMap::new(),
            event_date: None,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn bolt_on(&self, category: Category) -> Option<&Selection> {
        self.bolt_ons.get(&category)
    }

    pub fn bolt_ons(&self) -> impl Iterator<Item = (Category, &Selection)> {
        self.bolt_ons.iter().map(|(c, s)| (*c, s))
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn event_date(&self) -> Option<NaiveDate> {
        self.event_date
    }
}

/// Owns one order and derives its price and validation state from the
/// injected price tables.
#[derive(Debug, Clone)]
pub struct Configurator {
    tables: Arc<PriceTables>,
    state: OrderState,
}

impl Configurator {
    pub fn new(tables: impl Into<Arc<PriceTables>>, category: Category) -> Result<Self> {
        let tables = tables.into();
        let table = tables
            .category(category)
            .ok_or_else(|| ConfigError::InvalidCategory(category.as_str().to_string()))?;
        let state = OrderState::new(category, table);
        Ok(Self { tables, state })
    }

    pub fn tables(&self) -> &PriceTables {
        &self.tables
    }

    pub fn state(&self) -> &OrderState {
        &self.state
    }

    pub fn category(&self) -> Category {
        self.state.category
    }

    pub fn table(&self) -> &CategoryTable {
        category_table(&self.tables, self.state.category)
    }

    /// Starts a fresh order for `category`. Nothing carries over.
    pub fn select_category(&mut self, category: Category) -> Result<()> {
        let table = self
            .tables
            .category(category)
            .ok_or_else(|| ConfigError::InvalidCategory(category.as_str().to_string()))?;
        self.state = OrderState::new(category, table);
        Ok(())
    }

    pub fn select_category_named(&mut self, name: &str) -> Result<()> {
        let category = name.parse::<Category>()?;
        self.select_category(category)
    }

    /// Back to the defaults of the current category, e.g. after the order
    /// has been submitted.
    pub fn reset(&mut self) {
        let table = category_table(&self.tables, self.state.category);
        self.state = OrderState::new(self.state.category, table);
    }

    pub fn select_package(&mut self, package_id: &str) -> Result<()> {
        if self.state.package.as_deref() == Some(package_id) {
            return Ok(());
        }
        let table = category_table(&self.tables, self.state.category);
        let package = table.package(package_id).ok_or_else(|| ConfigError::UnknownPackage {
            category: self.state.category,
            package: package_id.to_string(),
        })?;

        self.state.selection.apply_package(&table.product, package);
        self.state.package = Some(package.id.clone());
        Ok(())
    }

    pub fn set_choice(&mut self, group_id: &str, key: &str) -> Result<()> {
        let table = category_table(&self.tables, self.state.category);
        self.state.selection.set_choice(&table.product, group_id, key)
    }

    pub fn toggle_extra(&mut self, extra_id: &str) -> Result<()> {
        let table = category_table(&self.tables, self.state.category);
        self.state.selection.toggle_extra(&table.product, extra_id)
    }

    /// Requested quantity for per-unit products. Anything is accepted; the
    /// minimum is applied when billing.
    pub fn set_quantity(&mut self, quantity: u32) -> Result<()> {
        let per_unit = matches!(self.table().product.base, BasePricing::PerUnit { .. });
        if !per_unit {
            return Err(ConfigError::QuantityNotApplicable(self.state.category));
        }
        self.state.selection.quantity = Some(quantity);
        Ok(())
    }

    pub fn add_bolt_on(&mut self, category: Category) -> Result<()> {
        let not_allowed = ConfigError::BoltOnNotAllowed {
            root: self.state.category,
            bolt_on: category,
        };
        if self.state.category != Category::Cake {
            return Err(not_allowed);
        }
        let table = category_table(&self.tables, self.state.category);
        let bolt_on = table.bolt_ons.get(&category).ok_or(not_allowed)?;
        if self.state.bolt_ons.contains_key(&category) {
            return Err(ConfigError::BoltOnAlreadyExists(category));
        }

        self.state
            .bolt_ons
            .insert(category, Selection::new(&bolt_on.product));
        Ok(())
    }

    pub fn remove_bolt_on(&mut self, category: Category) {
        self.state.bolt_ons.remove(&category);
    }

    pub fn set_bolt_on_choice(&mut self, category: Category, group_id: &str, key: &str) -> Result<()> {
        let (table, selection) = bolt_on_parts(&self.tables, &mut self.state, category)?;
        selection.set_choice(table, group_id, key)
    }

    pub fn toggle_bolt_on_extra(&mut self, category: Category, extra_id: &str) -> Result<()> {
        let (table, selection) = bolt_on_parts(&self.tables, &mut self.state, category)?;
        selection.toggle_extra(table, extra_id)
    }

    /// Free-text field such as notes or contact details. A blank value
    /// clears the field. Never affects the price.
    pub fn set_field(&mut self, name: &str, value: &str) {
        if value.trim().is_empty() {
            self.state.fields.remove(name);
        } else {
            self.state.fields.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_event_date(&mut self, date: NaiveDate) {
        self.state.event_date = Some(date);
    }

    pub fn clear_event_date(&mut self) {
        self.state.event_date = None;
    }

    pub fn price_breakdown(&self) -> PriceBreakdown {
        pricing::price_order(self.table(), &self.state)
    }

    pub fn validation_state(&self) -> ValidationState {
        validation::validate(self.table(), &self.state, None)
    }

    /// Validation including warnings for the chosen event date.
    pub fn validation_state_with(&self, availability: &dyn AvailabilitySource) -> ValidationState {
        validation::validate(self.table(), &self.state, Some(availability))
    }

    /// True when `key` costs nothing extra under the active package.
    pub fn is_bundle_compatible(&self, group_id: &str, key: &str) -> bool {
        match self.active_package() {
            Some(package) => package.includes(group_id, key),
            None => true,
        }
    }

    pub fn active_package(&self) -> Option<&Package> {
        self.state
            .package
            .as_deref()
            .and_then(|id| self.table().package(id))
    }

    /// Flat field map handed to the submission gateway.
    pub fn payload(&self) -> Payload {
        Payload::from_order(self.table(), &self.state, &self.price_breakdown())
    }
}

fn category_table(tables: &PriceTables, category: Category) -> &CategoryTable {
    match tables.category(category) {
        Some(table) => table,
        None => unreachable!("category {} is checked when selected", category),
    }
}

fn bolt_on_parts<'a>(
    tables: &'a PriceTables,
    state: &'a mut OrderState,
    category: Category,
) -> Result<(&'a ProductTable, &'a mut Selection)> {
    let table = category_table(tables, state.category)
        .bolt_ons
        .get(&category)
        .map(|b| &b.product)
        .ok_or(ConfigError::BoltOnMissing(category))?;
    let selection = state
        .bolt_ons
        .get_mut(&category)
        .ok_or(ConfigError::BoltOnMissing(category))?;
    Ok((table, selection))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cake() -> Configurator {
        Configurator::new(PriceTables::builtin().unwrap(), Category::Cake).unwrap()
    }

    #[test]
    fn test_new_order_uses_defaults() {
        let order = cake();
        let selection = order.state().selection();
        assert_eq!(selection.choice("size"), Some("4-inch"));
        assert_eq!(selection.choice("layers"), Some("3"));
        assert_eq!(selection.choice("delivery"), Some("collection"));
        assert!(!selection.is_explicit("size"));
        assert_eq!(selection.extras().count(), 0);
        assert!(order.state().package().is_none());
    }

    #[test]
    fn test_unknown_category_in_tables() {
        let tables = PriceTables::from_yaml(
            "cupcakes:\n  title: Cupcakes\n  base: { kind: flat, label: Dozen, price: 300 }\n",
        )
        .unwrap();
        let err = Configurator::new(tables, Category::Cake).unwrap_err();
        assert_eq!(err, ConfigError::InvalidCategory("cakes".to_string()));
    }

    #[test]
    fn test_select_category_named() {
        let mut order = cake();
        order.select_category_named("cookies").unwrap();
        assert_eq!(order.category(), Category::Cookie);

        let before = order.state().clone();
        assert!(matches!(
            order.select_category_named("pies"),
            Err(ConfigError::InvalidCategory(_))
        ));
        assert_eq!(order.state(), &before);
    }

    #[test]
    fn test_set_choice_marks_group_explicit() {
        let mut order = cake();
        order.set_choice("size", "9-inch").unwrap();
        assert_eq!(order.state().selection().choice("size"), Some("9-inch"));
        assert!(order.state().selection().is_explicit("size"));

        // re-picking the default counts as an explicit pick
        order.set_choice("flavor", "vanilla").unwrap();
        assert!(order.state().selection().is_explicit("flavor"));
    }

    #[test]
    fn test_repeated_choice_keeps_price() {
        let mut order = cake();
        order.set_choice("size", "12-inch").unwrap();
        order.set_choice("layers", "2").unwrap();
        let state = order.state().clone();
        let breakdown = order.price_breakdown();

        order.set_choice("size", "12-inch").unwrap();
        order.set_choice("layers", "2").unwrap();
        assert_eq!(order.state(), &state);
        assert_eq!(order.price_breakdown(), breakdown);
        assert_eq!(breakdown.total, 250 + 700 - 50);
    }

    #[test]
    fn test_rejected_operations_leave_state_unchanged() {
        let mut order = cake();
        order.set_choice("size", "7-inch").unwrap();
        let before = order.state().clone();

        assert_eq!(
            order.set_choice("size", "10-inch"),
            Err(ConfigError::UnknownChoice {
                group: "size".into(),
                choice: "10-inch".into()
            })
        );
        assert_eq!(
            order.set_choice("icing", "1"),
            Err(ConfigError::UnknownGroup("icing".into()))
        );
        assert_eq!(
            order.toggle_extra("confetti"),
            Err(ConfigError::UnknownExtra("confetti".into()))
        );
        assert!(matches!(
            order.select_package("wedding"),
            Err(ConfigError::UnknownPackage { .. })
        ));
        assert_eq!(
            order.set_quantity(3),
            Err(ConfigError::QuantityNotApplicable(Category::Cake))
        );
        assert_eq!(order.state(), &before);
    }

    #[test]
    fn test_toggle_extra_flips_membership() {
        let mut order = cake();
        order.toggle_extra("sprinkles").unwrap();
        assert!(order.state().selection().has_extra("sprinkles"));
        order.toggle_extra("sprinkles").unwrap();
        assert!(!order.state().selection().has_extra("sprinkles"));
    }

    #[test]
    fn test_package_defaults_do_not_override_explicit_choice() {
        let mut order = cake();
        order.set_choice("size", "9-inch").unwrap();
        order.select_package("bento-2-cupcakes").unwrap();
        assert_eq!(order.state().selection().choice("size"), Some("9-inch"));

        let mut order = cake();
        order.set_choice("shape", "heart").unwrap();
        order.select_package("bento-2-cupcakes").unwrap();
        assert_eq!(order.state().selection().choice("size"), Some("4-inch"));
        assert_eq!(order.state().selection().choice("shape"), Some("heart"));
    }

    #[test]
    fn test_reselecting_package_is_noop() {
        let mut order = cake();
        order.select_package("bento-5-cupcakes").unwrap();
        let before = order.state().clone();
        order.select_package("bento-5-cupcakes").unwrap();
        assert_eq!(order.state(), &before);
    }

    #[test]
    fn test_bolt_on_rules() {
        let mut order = cake();
        order.add_bolt_on(Category::Cupcake).unwrap();
        assert_eq!(
            order.add_bolt_on(Category::Cupcake),
            Err(ConfigError::BoltOnAlreadyExists(Category::Cupcake))
        );
        assert_eq!(
            order.add_bolt_on(Category::Cake),
            Err(ConfigError::BoltOnNotAllowed {
                root: Category::Cake,
                bolt_on: Category::Cake
            })
        );
        assert_eq!(order.state().bolt_on(Category::Cupcake).unwrap().choice("quantity"), Some("6"));

        order.remove_bolt_on(Category::Cupcake);
        order.remove_bolt_on(Category::Cupcake);
        assert!(order.state().bolt_on(Category::Cupcake).is_none());

        order.select_category(Category::Cupcake).unwrap();
        assert_eq!(
            order.add_bolt_on(Category::Cookie),
            Err(ConfigError::BoltOnNotAllowed {
                root: Category::Cupcake,
                bolt_on: Category::Cookie
            })
        );
    }

    #[test]
    fn test_bolt_on_choice_requires_bolt_on() {
        let mut order = cake();
        assert_eq!(
            order.set_bolt_on_choice(Category::Cookie, "quantity", "18"),
            Err(ConfigError::BoltOnMissing(Category::Cookie))
        );
        order.add_bolt_on(Category::Cookie).unwrap();
        order.set_bolt_on_choice(Category::Cookie, "quantity", "18").unwrap();
        assert!(matches!(
            order.set_bolt_on_choice(Category::Cookie, "quantity", "30"),
            Err(ConfigError::UnknownChoice { .. })
        ));
        assert_eq!(order.state().bolt_on(Category::Cookie).unwrap().choice("quantity"), Some("18"));
        let before = order.state().clone();
        assert_eq!(
            order.set_bolt_on_choice(Category::Cookie, "size", "9-inch"),
            Err(ConfigError::UnknownGroup("size".into()))
        );
        assert_eq!(order.state(), &before);

        assert_eq!(
            order.toggle_bolt_on_extra(Category::Cupcake, "sprinkles"),
            Err(ConfigError::BoltOnMissing(Category::Cupcake))
        );
        assert_eq!(
            order.toggle_bolt_on_extra(Category::Cookie, "gold-leaf"),
            Err(ConfigError::UnknownExtra("gold-leaf".into()))
        );
    }

    #[test]
    fn test_switching_category_discards_everything() {
        let mut order = cake();
        order.select_package("bento-2-cupcakes").unwrap();
        order.toggle_extra("gold-leaf").unwrap();
        order.add_bolt_on(Category::Cookie).unwrap();
        order.set_field("notes", "Unicorn theme");

        order.select_category(Category::Cake).unwrap();
        let fresh = cake();
        assert_eq!(order.state(), fresh.state());
    }

    #[test]
    fn test_fields_and_reset() {
        let mut order = cake();
        order.set_field("name", "Thandi");
        order.set_field("notes", "   ");
        assert_eq!(order.state().field("name"), Some("Thandi"));
        assert_eq!(order.state().field("notes"), None);

        order.set_field("name", "");
        assert_eq!(order.state().field("name"), None);

        order.set_event_date(NaiveDate::from_ymd_opt(2026, 12, 24).unwrap());
        order.reset();
        assert_eq!(order.state().event_date(), None);
        assert_eq!(order.category(), Category::Cake);
    }

    #[test]
    fn test_is_bundle_compatible() {
        let mut order = cake();
        assert!(order.is_bundle_compatible("flavor", "carrot"));

        order.select_package("bento-2-cupcakes").unwrap();
        assert!(order.is_bundle_compatible("flavor", "vanilla"));
        assert!(!order.is_bundle_compatible("flavor", "carrot"));
        assert!(!order.is_bundle_compatible("frosting", "fondant"));
        assert!(order.is_bundle_compatible("shape", "heart"));
    }
}
