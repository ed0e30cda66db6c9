use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::configurator::OrderState;
use crate::error::SubmitError;
use crate::models::Category;
use crate::pricing::{billed_quantity, PriceBreakdown};
use crate::tables::{Amount, BasePricing, CategoryTable, PriceTables};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(Amount),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Amount> for FieldValue {
    fn from(value: Amount) -> Self {
        FieldValue::Number(value)
    }
}

/// Flat field map posted to the order form endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    #[serde(skip)]
    category: Category,
    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
}

impl Payload {
    pub(crate) fn from_order(table: &CategoryTable, state: &OrderState, breakdown: &PriceBreakdown) -> Self {
        let mut fields: BTreeMap<String, FieldValue> = state
            .fields()
            .map(|(name, value)| (name.to_string(), value.into()))
            .collect();

        fields.insert("category".into(), state.category().as_str().into());
        if let Some(package) = state.package() {
            fields.insert("package".into(), package.into());
        }
        for (group, choice) in state.selection().choices() {
            fields.insert(group.to_string(), choice.into());
        }
        let extras: Vec<&str> = state.selection().extras().collect();
        if !extras.is_empty() {
            fields.insert("extras".into(), extras.join(", ").into());
        }
        if let BasePricing::PerUnit { minimum, .. } = table.product.base {
            let requested = state.selection().quantity();
            fields.insert("quantity".into(), Amount::from(requested.unwrap_or(minimum)).into());
            fields.insert(
                "billed-quantity".into(),
                Amount::from(billed_quantity(requested, minimum)).into(),
            );
        }

        for (category, selection) in state.bolt_ons() {
            let prefix = format!("additional-{}", category.as_str());
            fields.insert(prefix.clone(), "yes".into());
            for (group, choice) in selection.choices() {
                fields.insert(format!("{}-{}", prefix, group), choice.into());
            }
            let extras: Vec<&str> = selection.extras().collect();
            if !extras.is_empty() {
                fields.insert(format!("{}-extras", prefix), extras.join(", ").into());
            }
        }

        if let Some(date) = state.event_date() {
            fields.insert("event-date".into(), date.to_string().into());
        }
        let summary: Vec<String> = breakdown.lines.iter().map(|l| l.to_string()).collect();
        fields.insert("summary".into(), summary.join("; ").into());
        fields.insert("total".into(), breakdown.total.into());

        Self {
            category: state.category(),
            fields,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub endpoint: String,
    pub status: u16,
}

/// Hands a finished order to whoever takes it from here.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, payload: &Payload) -> Result<Receipt, SubmitError>;
}

/// Posts orders to Formspree-style form endpoints, one per category.
pub struct FormspreeGateway {
    client: Client,
    endpoints: BTreeMap<Category, String>,
}

impl FormspreeGateway {
    pub fn new(endpoints: BTreeMap<Category, String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("bakery-orders/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            endpoints,
        }
    }

    /// Endpoints from the price tables; `override_url` replaces all of them.
    pub fn from_tables(tables: &PriceTables, override_url: Option<&str>) -> Self {
        let endpoints = tables
            .categories()
            .filter_map(|(category, table)| {
                let url = override_url.or(table.form_endpoint.as_deref())?;
                Some((category, url.to_string()))
            })
            .collect();
        Self::new(endpoints)
    }

    pub fn endpoint(&self, category: Category) -> Option<&str> {
        self.endpoints.get(&category).map(String::as_str)
    }
}

#[async_trait]
impl SubmissionGateway for FormspreeGateway {
    async fn submit(&self, payload: &Payload) -> Result<Receipt, SubmitError> {
        let endpoint = self
            .endpoint(payload.category())
            .ok_or(SubmitError::NoEndpoint(payload.category()))?;

        info!("Submitting {} order to {}", payload.category(), endpoint);
        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Form endpoint returned {}", status);
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Order accepted with status {}", status);
        Ok(Receipt {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Accepts every order without sending it anywhere.
#[derive(Default)]
pub struct DryRunGateway {
    submitted: Mutex<Vec<Payload>>,
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<Payload> {
        match self.submitted.lock() {
            Ok(submitted) => submitted.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SubmissionGateway for DryRunGateway {
    async fn submit(&self, payload: &Payload) -> Result<Receipt, SubmitError> {
        let json = serde_json::to_string_pretty(payload)?;
        info!("Dry run, not submitting {} order", payload.category());
        debug!("Payload: {}", json);

        match self.submitted.lock() {
            Ok(mut submitted) => submitted.push(payload.clone()),
            Err(poisoned) => poisoned.into_inner().push(payload.clone()),
        }
        Ok(Receipt {
            endpoint: "dry-run".to_string(),
            status: 200,
        })
    }
}
