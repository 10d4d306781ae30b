//! Identifier Source
//!
//! The detail page is addressed by a page reference whose state carries the
//! entity id (`c__carId` by default). The publisher side turns page references
//! into identifier changes, the source side is observed by the session.

use std::collections::BTreeMap;

use tokio::sync::watch;
use url::Url;

use crate::config::ConfiguratorConfig;
use crate::types::EntityId;

/// Page addressing state (path plus query/state parameters)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReference {
    pub path: String,
    pub state: BTreeMap<String, String>,
}

impl PageReference {
    /// Parse an absolute URL or a site-relative link such as `/car-detail?c__carId=X`
    pub fn parse(link: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse("http://localhost/")?;
        let url = base.join(link)?;
        Ok(Self {
            path: url.path().to_string(),
            state: url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        })
    }

    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    /// Entity id carried in `param`, ignoring blank values
    pub fn entity_id(&self, param: &str) -> Option<EntityId> {
        self.state
            .get(param)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(EntityId::from)
    }
}

/// Link from the browse listing to an entity's detail page
pub fn detail_link(config: &ConfiguratorConfig, id: &EntityId) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(&config.identifier_param, id.as_str())
        .finish();
    format!("{}?{}", config.detail_path, query)
}

/// Create a connected publisher/source pair with no identifier set
pub fn identifier_channel(param: impl Into<String>) -> (IdentifierPublisher, IdentifierSource) {
    let (tx, rx) = watch::channel(None);
    (
        IdentifierPublisher {
            param: param.into(),
            tx,
        },
        IdentifierSource { rx },
    )
}

/// Writes the current identifier. Unchanged ids are not re-emitted.
#[derive(Debug)]
pub struct IdentifierPublisher {
    param: String,
    tx: watch::Sender<Option<EntityId>>,
}

impl IdentifierPublisher {
    /// Publish the id carried by a page reference.
    ///
    /// Returns true if observers were notified. A reference without the
    /// parameter leaves the current id in place.
    pub fn publish(&self, page: &PageReference) -> bool {
        match page.entity_id(&self.param) {
            Some(id) => self.set(id),
            None => false,
        }
    }

    pub fn set(&self, id: EntityId) -> bool {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&id) {
                false
            } else {
                *current = Some(id);
                true
            }
        })
    }
}

/// Observed side of the identifier channel
#[derive(Debug, Clone)]
pub struct IdentifierSource {
    rx: watch::Receiver<Option<EntityId>>,
}

impl IdentifierSource {
    pub fn current(&self) -> Option<EntityId> {
        self.rx.borrow().clone()
    }

    /// Wait for the next emitted id. Returns None once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Option<EntityId>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
