//! Message-type → viewer dispatch.
//!
//! Viewers are looked up by the ROS message type string. Both spellings in
//! circulation, `pkg/Type` (ROS 1) and `pkg/msg/Type` (ROS 2), resolve to the
//! same entry.

use std::collections::HashMap;

use tfboard_types::BoardError;
use tracing::debug;

use crate::pointcloud_viewer::PointCloudViewer;
use crate::viewer::{TopicViewer, ViewerSettings};

/// Builds a fresh viewer for a newly subscribed topic.
pub type ViewerFactory = Box<dyn Fn(&ViewerSettings) -> Box<dyn TopicViewer> + Send + Sync>;

/// Reduce `pkg/msg/Type` to `pkg/Type`.
pub fn canonical_type(topic_type: &str) -> String {
    topic_type.trim().replacen("/msg/", "/", 1)
}

/// Registry of viewer factories keyed by canonical message type.
pub struct ViewerRegistry {
    factories: HashMap<String, ViewerFactory>,
}

impl std::fmt::Debug for ViewerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl Default for ViewerRegistry {
    /// A registry with every built-in viewer registered.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("sensor_msgs/PointCloud2", |settings| {
            Box::new(PointCloudViewer::new(settings.clone()))
        });
        registry
    }
}

impl ViewerRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the viewer for `topic_type`.
    pub fn register<F>(&mut self, topic_type: &str, factory: F)
    where
        F: Fn(&ViewerSettings) -> Box<dyn TopicViewer> + Send + Sync + 'static,
    {
        let key = canonical_type(topic_type);
        debug!(topic_type = %key, "registering viewer");
        self.factories.insert(key, Box::new(factory));
    }

    pub fn supports(&self, topic_type: &str) -> bool {
        self.factories.contains_key(&canonical_type(topic_type))
    }

    /// Sorted list of registered message types.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Instantiate the viewer registered for `topic_type`.
    pub fn create(&self, topic_type: &str, settings: &ViewerSettings) -> Result<Box<dyn TopicViewer>, BoardError> {
        self.factories
            .get(&canonical_type(topic_type))
            .map(|factory| factory(settings))
            .ok_or_else(|| BoardError::UnknownMessageType(topic_type.to_string()))
    }
}
