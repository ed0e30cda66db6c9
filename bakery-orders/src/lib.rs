pub mod availability;
pub mod configurator;
pub mod error;
pub mod models;
pub mod pricing;
pub mod submission;
pub mod tables;
pub mod validation;

pub use configurator::{Configurator, OrderState, Selection};
pub use error::{ConfigError, Result, SubmitError, TableError};
pub use models::{Category, OrderRequest};
pub use pricing::{LineItem, PriceBreakdown};
pub use tables::PriceTables;
pub use validation::{ValidationState, Warning};
