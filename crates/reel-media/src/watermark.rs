//! Watermark overlay.
//!
//! The watermark is an uploaded image placed in the bottom-right corner of
//! the composed timeline, scaled relative to the frame width and blended at
//! reduced opacity.

use tracing::debug;

use crate::graph::{fmt_num, InputId, NodeId, OperationGraph, Pad, StreamKind};

// =============================================================================
// Configuration (Builder Pattern)
// =============================================================================

/// Configuration for watermark overlay.
///
/// ```ignore
/// let config = WatermarkConfig::default()
///     .with_offset(30, 30)
///     .with_opacity(0.8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    /// Horizontal offset from right edge (pixels)
    pub offset_x: u32,
    /// Vertical offset from bottom edge (pixels)
    pub offset_y: u32,
    /// Opacity (0.0 to 1.0)
    pub opacity: f64,
    /// Watermark width as a share of the frame width
    pub width_ratio: f64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            offset_x: 20,
            offset_y: 20,
            opacity: 0.7,
            width_ratio: 0.15,
        }
    }
}

impl WatermarkConfig {
    /// Set offset from bottom-right corner.
    pub fn with_offset(mut self, x: u32, y: u32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Set watermark opacity (0.0 = invisible, 1.0 = fully opaque).
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Set the watermark width relative to the frame width.
    pub fn with_width_ratio(mut self, ratio: f64) -> Self {
        self.width_ratio = ratio.clamp(0.01, 1.0);
        self
    }

    /// Scaled watermark width for a frame, rounded down to an even number.
    pub fn scaled_width(&self, frame_width: u32) -> u32 {
        let width = (frame_width as f64 * self.width_ratio).round() as u32;
        (width / 2 * 2).max(2)
    }
}

// =============================================================================
// Graph Nodes
// =============================================================================

/// Overlay the watermark image input on `video`. Returns the new video node.
pub fn apply_watermark(
    graph: &mut OperationGraph,
    video: NodeId,
    watermark: InputId,
    frame_width: u32,
    config: &WatermarkConfig,
) -> NodeId {
    let mut logo_filters = vec![format!("scale={}:-2", config.scaled_width(frame_width))];
    if config.opacity < 1.0 {
        logo_filters.push("format=rgba".to_string());
        logo_filters.push(format!("colorchannelmixer=aa={}", fmt_num(config.opacity)));
    }

    let logo = graph.add_node(
        StreamKind::Video,
        vec![Pad::Input(watermark, StreamKind::Video)],
        logo_filters,
    );

    debug!(
        frame_width,
        width = config.scaled_width(frame_width),
        opacity = config.opacity,
        "Adding watermark overlay"
    );

    graph.add_node(
        StreamKind::Video,
        vec![video.into(), logo.into()],
        [
            format!(
                "overlay=W-w-{}:H-h-{}:format=auto",
                config.offset_x, config.offset_y
            ),
            "format=yuv420p".to_string(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatermarkConfig::default();
        assert_eq!(config.offset_x, 20);
        assert_eq!(config.offset_y, 20);
        assert!((config.opacity - 0.7).abs() < 0.001);
        assert_eq!(config.scaled_width(1920), 288);
        assert_eq!(config.scaled_width(1280), 192);
    }

    #[test]
    fn test_config_builder() {
        let config = WatermarkConfig::default()
            .with_offset(30, 40)
            .with_opacity(1.5);
        assert_eq!(config.offset_x, 30);
        assert_eq!(config.offset_y, 40);
        assert_eq!(config.opacity, 1.0);
    }

    #[test]
    fn test_overlay_nodes() {
        let mut graph = OperationGraph::new();
        let logo = graph.add_input("/uploads/logo.png", Vec::<String>::new());
        let video = graph.add_node(StreamKind::Video, vec![], ["color=c=black:s=1280x720:d=1"]);

        let out = apply_watermark(&mut graph, video, logo, 1280, &WatermarkConfig::default());
        let rendered = graph.render(&[out]).unwrap();

        assert_eq!(
            rendered,
            "color=c=black:s=1280x720:d=1[v0];\
             [0:v]scale=192:-2,format=rgba,colorchannelmixer=aa=0.7[v1];\
             [v0][v1]overlay=W-w-20:H-h-20:format=auto,format=yuv420p[v2]"
        );
    }

    #[test]
    fn test_opaque_watermark_skips_alpha() {
        let mut graph = OperationGraph::new();
        let logo = graph.add_input("/uploads/logo.png", Vec::<String>::new());
        let video = graph.add_node(StreamKind::Video, vec![], ["color"]);

        let config = WatermarkConfig::default().with_opacity(1.0);
        let out = apply_watermark(&mut graph, video, logo, 1920, &config);
        let Pad::Node(logo_node) = graph.node(out).unwrap().inputs[1] else {
            panic!("expected a node input");
        };
        assert_eq!(graph.node(logo_node).unwrap().filters, vec!["scale=288:-2"]);
    }
}
