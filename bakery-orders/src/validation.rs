use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use crate::availability::{AvailabilitySource, SlotKind, SlotStatus};
use crate::configurator::{OrderState, Selection};
use crate::tables::{BasePricing, CategoryTable, ProductTable};

// local@domain.tld, any non-space characters in each part
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

// South African numbers: 0XXXXXXXXX or +27XXXXXXXXX
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+?27-?[0-9]{9}|0[0-9]{9})$").expect("phone pattern"));

/// The free-text field completed by setting an event date.
pub const EVENT_DATE_FIELD: &str = "event-date";

/// Advisory problem with an order. Warnings never block a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    NotInBundle {
        package: String,
        group: String,
        choice: String,
    },
    BelowMinimumQuantity {
        requested: u32,
        minimum: u32,
    },
    InvalidEmail {
        value: String,
    },
    InvalidPhone {
        value: String,
    },
    DateInPast {
        date: NaiveDate,
    },
    DateFullyBooked {
        date: NaiveDate,
    },
    DateLimited {
        date: NaiveDate,
        remaining: u32,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NotInBundle { package, group, choice } => write!(
                f,
                "{} '{}' is not included in the {} package and will incur extra cost",
                group, choice, package
            ),
            Warning::BelowMinimumQuantity { requested, minimum } => write!(
                f,
                "Minimum order is {}; {} requested, billed as {}",
                minimum, requested, minimum
            ),
            Warning::InvalidEmail { value } => {
                write!(f, "'{}' is not a valid email address", value)
            }
            Warning::InvalidPhone { value } => {
                write!(f, "'{}' is not a valid South African phone number", value)
            }
            Warning::DateInPast { date } => write!(f, "{} is in the past", date),
            Warning::DateFullyBooked { date } => write!(f, "{} is fully booked", date),
            Warning::DateLimited { date, remaining } => {
                write!(f, "Only {} slot(s) left on {}", remaining, date)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationState {
    pub warnings: Vec<Warning>,
    pub completed: usize,
    pub required: usize,
    /// Required items still open, e.g. "email" or "cupcakes: quantity".
    pub missing: Vec<String>,
}

impl ValidationState {
    /// Completed share of the required items, 0.0 when nothing is required.
    pub fn completeness(&self) -> f64 {
        if self.required == 0 {
            return 0.0;
        }
        self.completed as f64 / self.required as f64
    }

    pub fn percent(&self) -> u32 {
        (self.completeness() * 100.0).round() as u32
    }

    /// Nothing left open. An order with nothing required is complete.
    pub fn is_complete(&self) -> bool {
        self.completed == self.required
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

pub fn is_valid_phone(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    PHONE.is_match(&compact)
}

pub(crate) fn validate(
    table: &CategoryTable,
    state: &OrderState,
    availability: Option<&dyn AvailabilitySource>,
) -> ValidationState {
    let mut warnings = Vec::new();

    if let Some(package) = state.package().and_then(|id| table.package(id)) {
        for group in &table.product.groups {
            let Some(choice) = state.selection().choice(&group.id) else {
                continue;
            };
            if !package.includes(&group.id, choice) {
                warnings.push(Warning::NotInBundle {
                    package: package.label.clone(),
                    group: group.id.clone(),
                    choice: choice.to_string(),
                });
            }
        }
    }

    if let BasePricing::PerUnit { minimum, .. } = table.product.base {
        if let Some(requested) = state.selection().quantity() {
            if requested < minimum {
                warnings.push(Warning::BelowMinimumQuantity { requested, minimum });
            }
        }
    }

    if let Some(email) = state.field("email") {
        if !is_valid_email(email) {
            warnings.push(Warning::InvalidEmail {
                value: email.to_string(),
            });
        }
    }
    if let Some(phone) = state.field("phone") {
        if !is_valid_phone(phone) {
            warnings.push(Warning::InvalidPhone {
                value: phone.to_string(),
            });
        }
    }

    if let (Some(source), Some(date)) = (availability, state.event_date()) {
        let slot = state
            .package()
            .and_then(|id| table.package(id))
            .map(|p| p.slot)
            .unwrap_or(SlotKind::Custom);
        if let Some(warning) = date_warning(source, date, slot) {
            warnings.push(warning);
        }
    }

    let mut progress = Progress::default();
    required_groups(&table.product, state.selection(), None, &mut progress);
    for field in &table.required_fields {
        let done = if field == EVENT_DATE_FIELD {
            state.event_date().is_some() || state.field(field).is_some()
        } else {
            state.field(field).is_some()
        };
        progress.record(field.clone(), done);
    }
    for (category, selection) in state.bolt_ons() {
        if let Some(bolt_on) = table.bolt_ons.get(&category) {
            required_groups(&bolt_on.product, selection, Some(category.as_str()), &mut progress);
        }
    }

    ValidationState {
        warnings,
        completed: progress.completed,
        required: progress.required,
        missing: progress.missing,
    }
}

fn date_warning(source: &dyn AvailabilitySource, date: NaiveDate, slot: SlotKind) -> Option<Warning> {
    if date < source.today() {
        return Some(Warning::DateInPast { date });
    }
    let Some(day) = source.day(date) else {
        return Some(Warning::DateFullyBooked { date });
    };
    let remaining = day.remaining(slot);
    match day.status {
        SlotStatus::Unavailable => Some(Warning::DateFullyBooked { date }),
        _ if remaining == 0 => Some(Warning::DateFullyBooked { date }),
        SlotStatus::Limited => Some(Warning::DateLimited { date, remaining }),
        SlotStatus::Available => None,
    }
}

#[derive(Default)]
struct Progress {
    completed: usize,
    required: usize,
    missing: Vec<String>,
}

impl Progress {
    fn record(&mut self, name: String, done: bool) {
        self.required += 1;
        if done {
            self.completed += 1;
        } else {
            self.missing.push(name);
        }
    }
}

fn required_groups(table: &ProductTable, selection: &Selection, scope: Option<&str>, progress: &mut Progress) {
    for group in table.groups.iter().filter(|g| !g.default_ok) {
        let name = match scope {
            Some(scope) => format!("{}: {}", scope, group.id),
            None => group.id.clone(),
        };
        progress.record(name, selection.is_explicit(&group.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::SampleAvailability;
    use crate::configurator::Configurator;
    use crate::models::Category;
    use crate::tables::PriceTables;
    use chrono::Duration;

    fn order(category: Category) -> Configurator {
        Configurator::new(PriceTables::builtin().unwrap(), category).unwrap()
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("orders@taysgourmet.co.za"));
        assert!(is_valid_email("a@b.c"));
        assert!(is_valid_email("zoë@example.co.za"));
        assert!(!is_valid_email("orders@taysgourmet"));
        assert!(!is_valid_email("not an email"));
        assert!(!is_valid_email("two@@example.com"));
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("082 123 4567"));
        assert!(is_valid_phone("+27 82 123 4567"));
        assert!(is_valid_phone("27821234567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("0821234567890"));
    }

    #[test]
    fn test_bundle_warnings_are_advisory() {
        let mut cake = order(Category::Cake);
        cake.set_choice("flavor", "red-velvet").unwrap();
        assert!(cake.validation_state().warnings.is_empty());

        cake.select_package("bento-2-cupcakes").unwrap();
        cake.set_choice("frosting", "ganache").unwrap();
        let state = cake.validation_state();
        assert_eq!(state.warnings.len(), 2);
        assert!(state.warnings.contains(&Warning::NotInBundle {
            package: "Bento + 2 Cupcakes".into(),
            group: "flavor".into(),
            choice: "red-velvet".into(),
        }));
        assert_eq!(cake.state().selection().choice("frosting"), Some("ganache"));
    }

    #[test]
    fn test_cookie_minimum_warning() {
        let mut cookies = order(Category::Cookie);
        cookies.set_quantity(5).unwrap();
        assert_eq!(
            cookies.validation_state().warnings,
            vec![Warning::BelowMinimumQuantity { requested: 5, minimum: 12 }]
        );
        cookies.set_quantity(12).unwrap();
        assert!(cookies.validation_state().warnings.is_empty());
    }

    #[test]
    fn test_contact_field_warnings() {
        let mut cupcakes = order(Category::Cupcake);
        cupcakes.set_field("email", "thandi@");
        cupcakes.set_field("phone", "0821234567");
        let warnings = cupcakes.validation_state().warnings;
        assert_eq!(warnings, vec![Warning::InvalidEmail { value: "thandi@".into() }]);
    }

    #[test]
    fn test_completeness_ratio() {
        let mut cake = order(Category::Cake);
        // flavor, frosting, name, email, phone, event-date, design
        let state = cake.validation_state();
        assert_eq!(state.required, 7);
        assert_eq!(state.completed, 0);
        assert_eq!(state.completeness(), 0.0);

        cake.set_choice("flavor", "chocolate").unwrap();
        cake.set_field("name", "Thandi");
        cake.set_event_date(NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        let state = cake.validation_state();
        assert_eq!(state.completed, 3);
        assert!(state.missing.contains(&"frosting".to_string()));
        assert!(!state.missing.contains(&EVENT_DATE_FIELD.to_string()));

        cake.add_bolt_on(Category::Cupcake).unwrap();
        let state = cake.validation_state();
        assert_eq!(state.required, 8);
        assert!(state.missing.contains(&"cupcakes: quantity".to_string()));

        cake.set_bolt_on_choice(Category::Cupcake, "quantity", "6").unwrap();
        assert_eq!(cake.validation_state().completed, 4);
    }

    #[test]
    fn test_fully_completed_order() {
        let mut cookies = order(Category::Cookie);
        cookies.set_field("name", "Thandi");
        cookies.set_field("email", "thandi@example.com");
        cookies.set_field("phone", "082 123 4567");
        cookies.set_event_date(NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        let state = cookies.validation_state();
        assert!(state.is_complete());
        assert_eq!(state.percent(), 100);
    }

    #[test]
    fn test_date_warnings() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let calendar = SampleAvailability::new(today);
        let mut cake = order(Category::Cake);

        cake.set_event_date(today - Duration::days(1));
        assert_eq!(
            cake.validation_state_with(&calendar).warnings,
            vec![Warning::DateInPast { date: today - Duration::days(1) }]
        );

        cake.set_event_date(today);
        assert_eq!(
            cake.validation_state_with(&calendar).warnings,
            vec![Warning::DateLimited { date: today, remaining: 1 }]
        );

        // bento slots run out before custom ones
        cake.select_package("bento-2-cupcakes").unwrap();
        cake.set_event_date(today + Duration::days(2));
        assert_eq!(
            cake.validation_state_with(&calendar).warnings,
            vec![Warning::DateFullyBooked { date: today + Duration::days(2) }]
        );

        cake.set_event_date(today + Duration::days(5));
        assert_eq!(
            cake.validation_state_with(&calendar).warnings,
            vec![Warning::DateFullyBooked { date: today + Duration::days(5) }]
        );

        cake.set_event_date(today + Duration::days(9));
        assert!(cake.validation_state_with(&calendar).warnings.is_empty());

        // plain validation ignores availability
        cake.set_event_date(today - Duration::days(30));
        assert!(cake.validation_state().warnings.is_empty());
    }

    #[test]
    fn test_nothing_required_is_complete() {
        let yaml = r#"
cupcakes:
  title: Cupcakes
  base: { kind: flat, label: Cupcakes, price: 100 }
"#;
        let tables = PriceTables::from_yaml(yaml).unwrap();
        let cupcakes = Configurator::new(tables, Category::Cupcake).unwrap();
        let state = cupcakes.validation_state();
        assert_eq!(state.required, 0);
        assert!(state.missing.is_empty());
        assert!(state.is_complete());
        assert_eq!(state.completeness(), 0.0);
    }
}
