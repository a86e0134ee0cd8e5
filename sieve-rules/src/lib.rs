//! Actions that alert rules trigger through installed apps.
//!
//! Every concrete action implements [`AppEventAction`]. The trait provides the action's type for
//! dispatch, the custom actions it offers to a project, and validation of its own configuration
//! before a rule is saved.

#![warn(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sieve_base_schema::project::ProjectId;

/// Length of a hyphenated installation UUID.
const UUID_LENGTH: usize = 36;

/// An action offered to a project, as rendered in rule forms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAction {
    /// Stable identifier of the action.
    pub id: String,
    /// The type of the action that provides it.
    pub action_type: &'static str,
    /// Human readable description.
    pub label: String,
    /// The project the action is offered to.
    pub project_id: ProjectId,
    /// Preset settings of the action.
    pub settings: BTreeMap<String, String>,
}

/// A misconfigured action.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionValidationError {
    /// The app slug is empty.
    #[error("missing app slug")]
    MissingSlug,
    /// The installation is not a hyphenated UUID.
    #[error("invalid installation uuid {0:?}")]
    InvalidInstallation(String),
    /// A required setting is missing or empty.
    #[error("missing required setting {0:?}")]
    MissingSetting(String),
}

/// An action that an alert rule can trigger through an installed app.
pub trait AppEventAction {
    /// The type of the action, used to dispatch rule configurations to their action.
    fn action_type(&self) -> &'static str;

    /// Returns the actions this app offers to the given project.
    fn custom_actions(&self, project: ProjectId) -> Vec<CustomAction>;

    /// Validates the configuration of the action.
    fn self_validate(&self) -> Result<(), ActionValidationError>;
}

/// The app an action runs through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInstallation {
    /// Slug of the app.
    pub slug: String,
    /// Hyphenated UUID of the installation in the organization.
    pub uuid: String,
}

impl AppInstallation {
    fn validate(&self) -> Result<(), ActionValidationError> {
        if self.slug.is_empty() {
            return Err(ActionValidationError::MissingSlug);
        }

        let valid = self.uuid.len() == UUID_LENGTH
            && self.uuid.char_indices().all(|(i, c)| match i {
                8 | 13 | 18 | 23 => c == '-',
                _ => c.is_ascii_hexdigit(),
            });

        if !valid {
            return Err(ActionValidationError::InvalidInstallation(
                self.uuid.clone(),
            ));
        }

        Ok(())
    }
}

/// Sends a notification through an app without further settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyAppAction {
    /// The app to notify.
    pub installation: AppInstallation,
}

impl AppEventAction for NotifyAppAction {
    fn action_type(&self) -> &'static str {
        "notify_app"
    }

    fn custom_actions(&self, project: ProjectId) -> Vec<CustomAction> {
        vec![CustomAction {
            id: format!("{}:notify", self.installation.slug),
            action_type: self.action_type(),
            label: format!("Send a notification via {}", self.installation.slug),
            project_id: project,
            settings: BTreeMap::new(),
        }]
    }

    fn self_validate(&self) -> Result<(), ActionValidationError> {
        self.installation.validate()
    }
}

/// Creates an alert in an app, configured with app-specific settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRuleAppAction {
    /// The app receiving the alert.
    pub installation: AppInstallation,
    /// Settings configured for the alert.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    /// Settings the app requires to be present.
    #[serde(default)]
    pub required_settings: Vec<String>,
}

impl AppEventAction for AlertRuleAppAction {
    fn action_type(&self) -> &'static str {
        "alert_rule_app"
    }

    fn custom_actions(&self, project: ProjectId) -> Vec<CustomAction> {
        vec![CustomAction {
            id: format!("{}:alert-rule", self.installation.slug),
            action_type: self.action_type(),
            label: format!("Create an alert in {}", self.installation.slug),
            project_id: project,
            settings: self.settings.clone(),
        }]
    }

    fn self_validate(&self) -> Result<(), ActionValidationError> {
        self.installation.validate()?;

        for name in &self.required_settings {
            match self.settings.get(name) {
                Some(value) if !value.is_empty() => (),
                _ => return Err(ActionValidationError::MissingSetting(name.clone())),
            }
        }

        Ok(())
    }
}
