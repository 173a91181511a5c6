//! Viewer for `sensor_msgs/PointCloud2`, raw or quantized.

use tfboard_perception::frame_graph::normalize_frame;
use tfboard_perception::pointcloud::{self, DecodedCloud};
use tfboard_perception::{FrameGraph, apply_between};
use tfboard_types::{BoardError, InboundMessage, PointCloud2Message};
use tracing::{debug, warn};

use crate::viewer::{DrawObject, TopicViewer, ViewerSettings};

/// Keeps the last good cloud and redraws it in the base frame whenever asked.
///
/// The decoded buffer is cached in its source frame; only a stride change
/// forces a re-decode. TF changes just re-apply the transform at render time.
#[derive(Debug, Default)]
pub struct PointCloudViewer {
    settings: ViewerSettings,
    last_msg: Option<PointCloud2Message>,
    cloud: Option<DecodedCloud>,
}

impl PointCloudViewer {
    pub fn new(settings: ViewerSettings) -> Self {
        Self {
            settings,
            last_msg: None,
            cloud: None,
        }
    }

    /// Frame id of the last accepted message.
    pub fn source_frame(&self) -> Option<&str> {
        self.last_msg.as_ref().map(|m| normalize_frame(&m.header.frame_id))
    }

    fn redecode(&mut self) -> Result<(), BoardError> {
        let Some(msg) = self.last_msg.as_ref() else {
            return Ok(());
        };
        match pointcloud::decode(msg, self.settings.decimation_stride) {
            Ok(cloud) => {
                debug!(
                    frame = %msg.header.frame_id,
                    points = cloud.points.point_count(),
                    compressed = msg.is_compressed(),
                    "point cloud decoded"
                );
                self.cloud = Some(cloud);
                Ok(())
            }
            Err(e) => {
                self.cloud = None;
                Err(e)
            }
        }
    }
}

impl TopicViewer for PointCloudViewer {
    fn decode(&mut self, msg: &InboundMessage) -> Result<(), BoardError> {
        let cloud_msg = match msg.parse_body::<PointCloud2Message>() {
            Ok(m) => m,
            Err(e) => {
                self.last_msg = None;
                self.cloud = None;
                return Err(e);
            }
        };
        self.last_msg = Some(cloud_msg);
        self.redecode().inspect_err(|e| {
            warn!(topic = %msg.topic_name, error = %e, "dropping point cloud message");
        })
    }

    fn render(&self, graph: &FrameGraph) -> Option<Vec<DrawObject>> {
        let cloud = self.cloud.as_ref()?;
        let source = self.source_frame().unwrap_or_default();
        let base = normalize_frame(&self.settings.base_frame);

        let outcome = apply_between(graph, source, base, cloud.points.clone());
        let frame = if outcome.is_transformed() { base } else { source };

        Some(vec![DrawObject::Points {
            data: outcome.into_points().into_vec(),
            frame: frame.to_string(),
            z_min: cloud.z_range.0,
            z_max: cloud.z_range.1,
            color_mode: self.settings.color_mode,
            color: self.settings.fixed_color,
            point_size: self.settings.point_size,
        }])
    }

    fn configure(&mut self, settings: &ViewerSettings) {
        let restride = settings.decimation_stride.max(1) != self.settings.decimation_stride.max(1);
        self.settings = settings.clone();
        if restride && let Err(e) = self.redecode() {
            warn!(error = %e, "re-decoding point cloud with new stride failed");
        }
    }
}
