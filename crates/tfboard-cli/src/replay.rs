//! Replays a recorded JSON-lines message stream through a [`Dashboard`].

use std::collections::BTreeMap;
use std::io::BufRead;

use tfboard_middleware::dashboard::is_tf_message;
use tfboard_middleware::{Dashboard, DrawObject, Routed};
use tfboard_types::{BoardError, InboundMessage};
use tracing::{debug, warn};

/// Last render seen for one topic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSummary {
    pub points: usize,
    pub frame: String,
    pub renders: usize,
}

/// What a replay did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub lines: usize,
    pub tf_messages: usize,
    pub viewer_messages: usize,
    pub ignored: usize,
    pub errors: usize,
    pub renders: usize,
    /// `layers[topic]`
    pub layers: BTreeMap<String, LayerSummary>,
}

/// Feed every line of `reader` through `dash`, ticking after each one.
///
/// Topics are subscribed on first sight when the registry has a viewer for
/// their type. Blank lines are skipped; a line that fails to parse or decode
/// is counted and logged, and replay continues. Only read errors abort.
pub fn replay<R: BufRead>(dash: &mut Dashboard, reader: R) -> Result<ReplaySummary, BoardError> {
    let mut summary = ReplaySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| BoardError::Io(format!("line {}: {e}", idx + 1)))?;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;

        let msg = match serde_json::from_str::<InboundMessage>(&line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(line = idx + 1, error = %e, "skipping unparsable line");
                summary.errors += 1;
                continue;
            }
        };

        auto_subscribe(dash, &msg);

        match dash.handle_message(&msg) {
            Ok(Routed::Transforms { .. }) => summary.tf_messages += 1,
            Ok(Routed::Viewer) => summary.viewer_messages += 1,
            Ok(Routed::Ignored) => summary.ignored += 1,
            Err(e) => {
                warn!(line = idx + 1, topic = %msg.topic_name, error = %e, "message dropped");
                summary.errors += 1;
            }
        }

        if let Some(layers) = dash.tick() {
            summary.renders += 1;
            for layer in layers {
                let entry = summary.layers.entry(layer.topic).or_default();
                entry.renders += 1;
                entry.points = layer.objects.iter().map(DrawObject::point_count).sum();
                if let Some(DrawObject::Points { frame, .. }) = layer.objects.first() {
                    entry.frame = frame.clone();
                }
            }
        }
    }

    debug!(lines = summary.lines, renders = summary.renders, "replay finished");
    Ok(summary)
}

fn auto_subscribe(dash: &mut Dashboard, msg: &InboundMessage) {
    if is_tf_message(&msg.topic_name, &msg.topic_type)
        || dash.is_subscribed(&msg.topic_name)
        || !dash.registry().supports(&msg.topic_type)
    {
        return;
    }
    if let Err(e) = dash.subscribe(&msg.topic_name, &msg.topic_type) {
        warn!(topic = %msg.topic_name, error = %e, "auto-subscribe failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::prelude::BASE64_STANDARD;
    use serde_json::{Value, json};
    use std::io::Cursor;
    use tfboard_middleware::ViewerSettings;

    fn tf_line(child: &str, parent: &str, x: f64) -> String {
        json!({
            "_topic_name": "/tf",
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
        .to_string()
    }

    fn cloud_line(frame: &str, values: &[f32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        json!({
            "_topic_name": "/points",
            "_topic_type": "sensor_msgs/msg/PointCloud2",
            "header": { "frame_id": frame },
            "fields": [
                { "name": "x", "offset": 0, "datatype": 7, "count": 1 },
                { "name": "y", "offset": 4, "datatype": 7, "count": 1 },
                { "name": "z", "offset": 8, "datatype": 7, "count": 1 }
            ],
            "point_step": 12,
            "width": values.len() / 3,
            "height": 1,
            "is_bigendian": false,
            "data": BASE64_STANDARD.encode(bytes)
        })
        .to_string()
    }

    #[test]
    fn replay_subscribes_and_renders_in_base_frame() {
        let input = [
            tf_line("lidar", "map", 2.0),
            cloud_line("lidar", &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        ]
        .join("\n");

        let mut dash = Dashboard::default();
        dash.set_settings(ViewerSettings {
            base_frame: "map".to_string(),
            ..Default::default()
        });
        // Drain the redraw requested by the settings change.
        dash.tick();

        let summary = replay(&mut dash, Cursor::new(input)).unwrap();
        assert_eq!(summary.lines, 2);
        assert_eq!(summary.tf_messages, 1);
        assert_eq!(summary.viewer_messages, 1);
        assert_eq!(summary.errors, 0);

        let layer = &summary.layers["/points"];
        assert_eq!(layer.points, 2);
        assert_eq!(layer.frame, "map");
        assert!(dash.is_subscribed("/points"));
    }

    #[test]
    fn bad_lines_are_counted_and_skipped() {
        let input = format!(
            "not json\n\n{}\n{}\n",
            json!({ "_topic_name": "/chatter", "_topic_type": "std_msgs/msg/String", "data": "hi" }),
            tf_line("base_link", "odom", 1.0)
        );

        let mut dash = Dashboard::default();
        let summary = replay(&mut dash, Cursor::new(input)).unwrap();
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.tf_messages, 1);
        assert_eq!(dash.graph().frames(), vec!["base_link", "odom"]);
    }

    #[test]
    fn malformed_cloud_is_an_error_not_an_abort() {
        let mut broken: Value = serde_json::from_str(&cloud_line("lidar", &[1.0, 2.0, 3.0])).unwrap();
        broken["width"] = json!(7);
        let input = format!("{}\n{}\n", broken, cloud_line("lidar", &[1.0, 2.0, 3.0]));

        let mut dash = Dashboard::default();
        let summary = replay(&mut dash, Cursor::new(input)).unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.viewer_messages, 1);
        assert_eq!(summary.layers["/points"].points, 1);
        assert_eq!(summary.layers["/points"].frame, "lidar");
    }
}
