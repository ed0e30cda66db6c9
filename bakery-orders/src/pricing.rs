//! Price computation. One evaluator runs over any [`ProductTable`], so cakes,
//! cupcakes, cookies and bolt-ons all price the same way.

use serde::Serialize;
use std::fmt;

use crate::configurator::{OrderState, Selection};
use crate::tables::{
    Amount, BasePricing, BoltOnTable, CategoryTable, Choice, GroupRole, OptionGroup, Package,
    ProductTable,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub label: String,
    pub amount: Amount,
}

impl LineItem {
    fn new(label: impl Into<String>, amount: Amount) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, format_rand(self.amount))
    }
}

/// Itemized price of an order. The first line is always the base price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub lines: Vec<LineItem>,
    pub total: Amount,
}

impl PriceBreakdown {
    pub fn base(&self) -> Amount {
        self.lines.first().map(|l| l.amount).unwrap_or(0)
    }

    /// Everything on top of the base price.
    pub fn additional(&self) -> Amount {
        self.total - self.base()
    }
}

/// "R650", "-R50"
pub fn format_rand(amount: Amount) -> String {
    if amount < 0 {
        format!("-R{}", -amount)
    } else {
        format!("R{}", amount)
    }
}

/// Contributions of one product, grouped the way the summary lists them.
#[derive(Debug, Clone)]
struct ProductPrice {
    base: LineItem,
    options: Vec<LineItem>,
    extras: Vec<LineItem>,
    delivery: Vec<LineItem>,
    total: Amount,
}

pub(crate) fn price_order(table: &CategoryTable, state: &OrderState) -> PriceBreakdown {
    let package = state.package().and_then(|id| table.package(id));
    let main = price_product(&table.product, state.selection(), package);

    let mut total = main.total;
    let mut lines = Vec::with_capacity(1 + main.options.len() + main.extras.len());
    lines.push(main.base);
    lines.extend(main.options);
    lines.extend(main.extras);

    for (category, selection) in state.bolt_ons() {
        let Some(bolt_on) = table.bolt_ons.get(&category) else {
            continue;
        };
        let price = price_product(&bolt_on.product, selection, None);
        total += price.total;
        lines.push(LineItem::new(bolt_on_label(bolt_on, selection), price.total));
    }

    lines.extend(main.delivery);
    PriceBreakdown { lines, total }
}

fn price_product(table: &ProductTable, selection: &Selection, package: Option<&Package>) -> ProductPrice {
    let base_group = table.base.group();
    let base = match package {
        Some(package) => LineItem::new(package.label.clone(), package.price),
        None => base_line(table, selection),
    };

    let mut total = base.amount;
    let mut options = Vec::new();
    let mut delivery = Vec::new();
    for group in &table.groups {
        if Some(group.id.as_str()) == base_group {
            continue;
        }
        let Some(choice) = active_choice(group, selection) else {
            continue;
        };
        total += choice.delta;
        match group.role {
            GroupRole::Option if choice.delta != 0 => {
                options.push(LineItem::new(group.line_label(choice), choice.delta));
            }
            GroupRole::Delivery if choice.delta > 0 => {
                delivery.push(LineItem::new(group.line_label(choice), choice.delta));
            }
            _ => {}
        }
    }

    let mut extras = Vec::new();
    for extra in table.extras.iter().filter(|e| selection.has_extra(&e.id)) {
        total += extra.delta;
        extras.push(LineItem::new(extra.label(), extra.delta));
    }

    ProductPrice {
        base,
        options,
        extras,
        delivery,
        total,
    }
}

fn base_line(table: &ProductTable, selection: &Selection) -> LineItem {
    match &table.base {
        BasePricing::Flat { label, price } => LineItem::new(label.clone(), *price),
        BasePricing::Tier { group } => match active_in(table, group, selection) {
            Some((group, choice)) => LineItem::new(group.line_label(choice), choice.delta),
            None => LineItem::new(group.clone(), 0),
        },
        BasePricing::PerUnit { group, minimum } => {
            let billed = billed_quantity(selection.quantity(), *minimum);
            match active_in(table, group, selection) {
                Some((group, choice)) => LineItem::new(
                    format!("{} x {}", billed, group.line_label(choice)),
                    choice.delta * Amount::from(billed),
                ),
                None => LineItem::new(group.clone(), 0),
            }
        }
    }
}

/// Quantity actually charged: never below `minimum`. A missing request is
/// billed at the minimum.
pub fn billed_quantity(requested: Option<u32>, minimum: u32) -> u32 {
    requested.unwrap_or(minimum).max(minimum)
}

/// "12 Additional Cupcakes"
fn bolt_on_label(bolt_on: &BoltOnTable, selection: &Selection) -> String {
    match &bolt_on.product.base {
        BasePricing::Tier { group } => match selection.choice(group) {
            Some(tier) => format!("{} {}", tier, bolt_on.label),
            None => bolt_on.label.clone(),
        },
        BasePricing::PerUnit { minimum, .. } => {
            format!("{} {}", billed_quantity(selection.quantity(), *minimum), bolt_on.label)
        }
        BasePricing::Flat { .. } => bolt_on.label.clone(),
    }
}

fn active_choice<'t>(group: &'t OptionGroup, selection: &Selection) -> Option<&'t Choice> {
    selection.choice(&group.id).and_then(|key| group.choice(key))
}

fn active_in<'t>(
    table: &'t ProductTable,
    group_id: &str,
    selection: &Selection,
) -> Option<(&'t OptionGroup, &'t Choice)> {
    let group = table.group(group_id)?;
    Some((group, active_choice(group, selection)?))
}
