//! One dashboard session: a frame graph, the subscribed viewers and the
//! render scheduler that paces them.
//!
//! Everything runs on the caller's thread. Messages are routed synchronously
//! by [`Dashboard::handle_message`], so a TF update handled before a
//! [`Dashboard::tick`] is always visible to the render it triggers.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tfboard_middleware::Dashboard;
//!
//! let mut dash = Dashboard::default();
//! dash.handle_json(json!({
//!     "_topic_name": "/tf_static",
//!     "_topic_type": "tf2_msgs/msg/TFMessage",
//!     "transforms": [{
//!         "child_frame_id": "base_link",
//!         "header": { "frame_id": "map" },
//!         "transform": {
//!             "translation": { "x": 1.0, "y": 0.0, "z": 0.0 },
//!             "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
//!         }
//!     }]
//! }))
//! .unwrap();
//!
//! assert_eq!(dash.graph().frames(), vec!["base_link", "map"]);
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tfboard_perception::FrameGraph;
use tfboard_types::{BoardError, InboundMessage, TfMessage};
use tracing::{debug, info};

use crate::registry::ViewerRegistry;
use crate::scheduler::RenderScheduler;
use crate::viewer::{DrawObject, TopicViewer, ViewerSettings};

/// Topic carrying dynamic transforms.
pub const TF_TOPIC: &str = "/tf";
/// Topic carrying latched transforms.
pub const TF_STATIC_TOPIC: &str = "/tf_static";

/// Whether a message belongs in the frame graph.
pub fn is_tf_message(topic_name: &str, topic_type: &str) -> bool {
    topic_name == TF_TOPIC
        || topic_name == TF_STATIC_TOPIC
        || (topic_type.contains("tf2_msgs") && topic_type.contains("TFMessage"))
}

/// Where [`Dashboard::handle_message`] sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Fed to the frame graph; `changed` is true when any edge moved.
    Transforms { changed: bool },
    /// Accepted by the topic's viewer.
    Viewer,
    /// No subscription for this topic.
    Ignored,
}

/// Draw objects produced by one topic in one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub topic: String,
    pub objects: Vec<DrawObject>,
}

struct Subscription {
    topic_type: String,
    viewer: Box<dyn TopicViewer>,
}

/// A dashboard session.
pub struct Dashboard {
    graph: FrameGraph,
    registry: ViewerRegistry,
    /// `subscriptions[topic_name]`
    subscriptions: BTreeMap<String, Subscription>,
    scheduler: RenderScheduler,
    settings: ViewerSettings,
    seen_tf_version: u64,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("frames", &self.graph.len())
            .field("subscriptions", &self.subscriptions.keys().collect::<Vec<_>>())
            .field("render_pending", &self.scheduler.is_pending())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(FrameGraph::new(), ViewerRegistry::default(), ViewerSettings::default())
    }
}

impl Dashboard {
    pub fn new(graph: FrameGraph, registry: ViewerRegistry, settings: ViewerSettings) -> Self {
        let seen_tf_version = graph.version();
        Self {
            graph,
            registry,
            subscriptions: BTreeMap::new(),
            scheduler: RenderScheduler::new(),
            settings,
            seen_tf_version,
        }
    }

    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    pub fn registry(&self) -> &ViewerRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    /// Change the operator settings for every viewer and schedule a redraw.
    pub fn set_settings(&mut self, settings: ViewerSettings) {
        for sub in self.subscriptions.values_mut() {
            sub.viewer.configure(&settings);
        }
        self.settings = settings;
        self.scheduler.request();
    }

    /// Attach a viewer for `topic_name`, chosen by `topic_type`.
    ///
    /// Re-subscribing an already subscribed topic keeps the existing viewer.
    pub fn subscribe(&mut self, topic_name: &str, topic_type: &str) -> Result<(), BoardError> {
        if self.subscriptions.contains_key(topic_name) {
            return Ok(());
        }
        let viewer = self.registry.create(topic_type, &self.settings)?;
        info!(topic = topic_name, topic_type = topic_type, "subscribed");
        self.subscriptions.insert(
            topic_name.to_string(),
            Subscription {
                topic_type: topic_type.to_string(),
                viewer,
            },
        );
        Ok(())
    }

    pub fn unsubscribe(&mut self, topic_name: &str) -> bool {
        self.subscriptions.remove(topic_name).is_some()
    }

    pub fn is_subscribed(&self, topic_name: &str) -> bool {
        self.subscriptions.contains_key(topic_name)
    }

    /// `(topic_name, topic_type)` of every subscription, sorted by topic.
    pub fn subscriptions(&self) -> Vec<(&str, &str)> {
        self.subscriptions
            .iter()
            .map(|(name, sub)| (name.as_str(), sub.topic_type.as_str()))
            .collect()
    }

    /// Route one inbound message.
    ///
    /// Errors are per-message: the session state stays consistent and the
    /// next message is handled normally.
    ///
    /// TF messages always feed the frame graph and are then also handed to
    /// the viewer subscribed to their topic, if any.
    pub fn handle_message(&mut self, msg: &InboundMessage) -> Result<Routed, BoardError> {
        let mut routed = Routed::Ignored;
        if is_tf_message(&msg.topic_name, &msg.topic_type) {
            let tf: TfMessage = msg.parse_body()?;
            let is_static = msg.topic_name == TF_STATIC_TOPIC;
            let changed = self.graph.ingest(&tf, is_static);
            if self.graph.version() != self.seen_tf_version {
                self.seen_tf_version = self.graph.version();
                debug!(version = self.seen_tf_version, frames = self.graph.len(), "frame graph changed");
                self.scheduler.request();
            }
            routed = Routed::Transforms { changed };
        }

        let Some(sub) = self.subscriptions.get_mut(&msg.topic_name) else {
            return Ok(routed);
        };
        sub.viewer.decode(msg)?;
        self.scheduler.request();
        Ok(match routed {
            Routed::Ignored => Routed::Viewer,
            transforms => transforms,
        })
    }

    /// Parse and route a raw JSON message.
    pub fn handle_json(&mut self, value: Value) -> Result<Routed, BoardError> {
        let msg: InboundMessage =
            serde_json::from_value(value).map_err(|e| BoardError::Serialization(e.to_string()))?;
        self.handle_message(&msg)
    }

    /// Scheduler tick: if a render is pending, render every viewer once.
    ///
    /// Returns `None` when nothing was pending. Layers with nothing to draw
    /// are left out.
    pub fn tick(&mut self) -> Option<Vec<Layer>> {
        if !self.scheduler.take() {
            return None;
        }
        let layers: Vec<Layer> = self
            .subscriptions
            .iter()
            .filter_map(|(topic, sub)| {
                let objects = sub.viewer.render(&self.graph);
                if objects.is_none() {
                    debug!(topic = %topic, "layer skipped this frame");
                }
                objects.map(|objects| Layer {
                    topic: topic.clone(),
                    objects,
                })
            })
            .collect();
        Some(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::prelude::BASE64_STANDARD;
    use serde_json::json;

    fn tf(topic: &str, child: &str, parent: &str, x: f64) -> Value {
        json!({
            "_topic_name": topic,
            "_topic_type": "tf2_msgs/msg/TFMessage",
            "transforms": [{
                "child_frame_id": child,
                "header": { "frame_id": parent },
                "transform": {
                    "translation": { "x": x, "y": 0.0, "z": 0.0 },
                    "rotation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                }
            }]
        })
    }

    fn cloud(topic: &str, frame: &str, width: usize, values: &[f32]) -> Value {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        json!({
            "_topic_name": topic,
            "_topic_type": "sensor_msgs/msg/PointCloud2",
            "header": { "frame_id": frame },
            "fields": [
                { "name": "x", "offset": 0, "datatype": 7, "count": 1 },
                { "name": "y", "offset": 4, "datatype": 7, "count": 1 },
                { "name": "z", "offset": 8, "datatype": 7, "count": 1 }
            ],
            "point_step": 12,
            "width": width,
            "height": 1,
            "is_bigendian": false,
            "data": BASE64_STANDARD.encode(bytes)
        })
    }

    fn first_points(layers: &[Layer]) -> &[f32] {
        match &layers[0].objects[0] {
            DrawObject::Points { data, .. } => data.as_slice(),
        }
    }

    #[test]
    fn tf_detection_by_topic_or_type() {
        assert!(is_tf_message("/tf", ""));
        assert!(is_tf_message("/tf_static", ""));
        assert!(is_tf_message("/robot1/tf", "tf2_msgs/msg/TFMessage"));
        assert!(!is_tf_message("/points", "sensor_msgs/msg/PointCloud2"));
    }

    #[test]
    fn static_topic_marks_edges_static() {
        let mut dash = Dashboard::default();
        dash.handle_json(tf("/tf_static", "base_link", "map", 1.0)).unwrap();
        dash.handle_json(tf("/tf", "odom", "map", 2.0)).unwrap();
        assert!(dash.graph().edge("base_link").unwrap().is_static);
        assert!(!dash.graph().edge("odom").unwrap().is_static);
    }

    #[test]
    fn unsolicited_messages_are_ignored() {
        let mut dash = Dashboard::default();
        let routed = dash.handle_json(cloud("/points", "lidar", 1, &[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(routed, Routed::Ignored);
        assert!(dash.tick().is_none());
    }

    #[test]
    fn subscribe_requires_registered_type() {
        let mut dash = Dashboard::default();
        assert!(matches!(
            dash.subscribe("/chatter", "std_msgs/msg/String"),
            Err(BoardError::UnknownMessageType(_))
        ));
        dash.subscribe("/points", "sensor_msgs/msg/PointCloud2").unwrap();
        assert_eq!(dash.subscriptions(), vec![("/points", "sensor_msgs/msg/PointCloud2")]);
        assert!(dash.unsubscribe("/points"));
        assert!(!dash.is_subscribed("/points"));
    }

    #[test]
    fn burst_of_updates_renders_once_per_tick() {
        let mut dash = Dashboard::default();
        dash.subscribe("/points", "sensor_msgs/msg/PointCloud2").unwrap();

        dash.handle_json(tf("/tf", "lidar", "map", 1.0)).unwrap();
        dash.handle_json(cloud("/points", "lidar", 1, &[0.0, 0.0, 0.0])).unwrap();
        dash.handle_json(tf("/tf", "lidar", "map", 2.0)).unwrap();

        let layers = dash.tick().unwrap();
        assert_eq!(layers.len(), 1);
        assert!(dash.tick().is_none());
        assert_eq!(dash.scheduler().coalesced(), 2);
    }

    #[test]
    fn tf_update_before_tick_is_visible_to_render() {
        let mut dash = Dashboard::default();
        dash.set_settings(ViewerSettings {
            base_frame: "map".to_string(),
            ..Default::default()
        });
        dash.subscribe("/points", "sensor_msgs/PointCloud2").unwrap();

        dash.handle_json(tf("/tf", "lidar", "map", 1.0)).unwrap();
        dash.handle_json(cloud("/points", "lidar", 1, &[0.0, 0.0, 0.0])).unwrap();
        assert_eq!(first_points(&dash.tick().unwrap()), &[1.0, 0.0, 0.0]);

        // A TF change alone re-renders the cached cloud.
        let routed = dash.handle_json(tf("/tf", "lidar", "map", 5.0)).unwrap();
        assert_eq!(routed, Routed::Transforms { changed: true });
        assert_eq!(first_points(&dash.tick().unwrap()), &[5.0, 0.0, 0.0]);

        // An identical TF does not.
        let routed = dash.handle_json(tf("/tf", "lidar", "map", 5.0)).unwrap();
        assert_eq!(routed, Routed::Transforms { changed: false });
        assert!(dash.tick().is_none());
    }

    #[test]
    fn malformed_cloud_skips_layer_then_recovers() {
        let mut dash = Dashboard::default();
        dash.subscribe("/points", "sensor_msgs/msg/PointCloud2").unwrap();
        dash.handle_json(cloud("/points", "lidar", 1, &[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(dash.tick().unwrap().len(), 1);

        let err = dash.handle_json(cloud("/points", "lidar", 4, &[1.0, 2.0, 3.0]));
        assert!(matches!(err, Err(BoardError::ByteLengthMismatch { .. })));
        dash.handle_json(tf("/tf", "lidar", "map", 1.0)).unwrap();
        assert!(dash.tick().unwrap().is_empty());

        dash.handle_json(cloud("/points", "lidar", 1, &[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(dash.tick().unwrap().len(), 1);
    }

    #[test]
    fn subscribed_tf_topic_feeds_graph_and_viewer() {
        struct TfCounter {
            seen: usize,
        }
        impl TopicViewer for TfCounter {
            fn decode(&mut self, _msg: &InboundMessage) -> Result<(), BoardError> {
                self.seen += 1;
                Ok(())
            }
            fn render(&self, _graph: &FrameGraph) -> Option<Vec<DrawObject>> {
                (self.seen > 0).then(Vec::new)
            }
            fn configure(&mut self, _settings: &ViewerSettings) {}
        }

        let mut registry = ViewerRegistry::default();
        registry.register("tf2_msgs/msg/TFMessage", |_| Box::new(TfCounter { seen: 0 }));
        let mut dash = Dashboard::new(FrameGraph::new(), registry, ViewerSettings::default());
        dash.subscribe("/tf", "tf2_msgs/msg/TFMessage").unwrap();

        let routed = dash.handle_json(tf("/tf", "base_link", "map", 1.0)).unwrap();
        assert_eq!(routed, Routed::Transforms { changed: true });
        assert_eq!(dash.graph().frames(), vec!["base_link", "map"]);

        let layers = dash.tick().unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].topic, "/tf");

        // An unchanged transform still reaches the viewer and asks for a redraw.
        let routed = dash.handle_json(tf("/tf", "base_link", "map", 1.0)).unwrap();
        assert_eq!(routed, Routed::Transforms { changed: false });
        assert!(dash.tick().is_some());
    }

    #[test]
    fn messages_without_routing_keys_are_rejected() {
        let mut dash = Dashboard::default();
        assert!(matches!(dash.handle_json(json!({ "data": 1 })), Err(BoardError::Serialization(_))));
    }

    #[test]
    fn separate_sessions_keep_separate_graphs() {
        let mut a = Dashboard::default();
        let b = Dashboard::default();
        a.handle_json(tf("/tf", "base_link", "map", 1.0)).unwrap();
        assert_eq!(a.graph().len(), 1);
        assert!(b.graph().is_empty());
    }
}
