//! Lead Capture Collaborator
//!
//! The engine's only obligation is to hand over `{ entity_id,
//! selected_variant_id, selected_color_id }` when the configuration is
//! submitted. Contact details and their validation belong to the collaborator;
//! `ContactFormCapture` is the stock one, forwarding complete deal requests
//! over a channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::types::{ColorId, EntityId, VariantId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeadError {
    #[error("Please fill all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Lead receiver is gone")]
    Closed,
}

/// Current configuration handed to lead capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmission {
    pub entity_id: EntityId,
    pub selected_variant_id: Option<VariantId>,
    pub selected_color_id: Option<ColorId>,
}

#[async_trait]
pub trait LeadCapture: Send + Sync {
    async fn submit(&self, submission: LeadSubmission) -> Result<(), LeadError>;
}

/// Contact fields entered alongside a configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub message: String,
}

impl ContactForm {
    /// Set a field by its form key. Returns false for unknown keys.
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "message" => &mut self.message,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    /// Name, email and phone are required
    pub fn validate(&self) -> Result<(), LeadError> {
        let missing: Vec<&'static str> = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LeadError::MissingFields(missing))
        }
    }
}

/// A validated contact form together with the configuration it is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRequest {
    #[serde(flatten)]
    pub configuration: LeadSubmission,
    #[serde(flatten)]
    pub contact: ContactForm,
}

/// Validates the shared contact form and forwards deal requests
pub struct ContactFormCapture {
    form: Mutex<ContactForm>,
    deals: mpsc::UnboundedSender<DealRequest>,
}

impl ContactFormCapture {
    pub fn new(deals: mpsc::UnboundedSender<DealRequest>) -> Self {
        Self {
            form: Mutex::new(ContactForm::default()),
            deals,
        }
    }

    pub async fn set_field(&self, field: &str, value: impl Into<String>) -> bool {
        self.form.lock().await.set_field(field, value)
    }
}

#[async_trait]
impl LeadCapture for ContactFormCapture {
    async fn submit(&self, submission: LeadSubmission) -> Result<(), LeadError> {
        let contact = {
            let form = self.form.lock().await;
            form.validate()?;
            form.clone()
        };
        info!(entity_id = %submission.entity_id, "Submitting deal request");
        self.deals
            .send(DealRequest {
                configuration: submission,
                contact,
            })
            .map_err(|_| LeadError::Closed)
    }
}
