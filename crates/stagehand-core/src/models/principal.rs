//! Principal domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The authenticated identity making a request.
///
/// Created once at successful authentication and immutable within a
/// request. The raw claim set is carried as received from the identity
/// provider — normalization happens in `stagehand-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject id. Opaque, immutable.
    pub subject: String,
    pub email: Option<String>,
    /// Raw identity-provider attributes, possibly containing multiple
    /// historical aliases for the same logical field.
    pub claims: BTreeMap<String, String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            claims: BTreeMap::new(),
        }
    }
}
