//! Scene compilation.
//!
//! A scene is compiled by running its video chain through an ordered list of
//! pure stages. Each stage takes the chain built so far by value and returns
//! a new one, so no intermediate state is shared between stages or scenes.
//! The finished chain becomes one graph node; every text overlay is then
//! layered on as its own node.

use reel_models::request::DEFAULT_IMAGE_DURATION_SECS;
use reel_models::{MediaType, PanDirection, Scene, TextOverlay, VideoSettings};
use tracing::{debug, warn};

use crate::audio::{self, SceneAudioSource};
use crate::error::{MediaError, MediaResult};
use crate::graph::{fmt_num, InputId, NodeId, OperationGraph, Pad, StreamKind};
use crate::position::resolve_position;
use crate::store::{ResolvedAsset, ResolvedAssets};

/// The part of the primary media a scene plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWindow {
    /// Trim start in source seconds
    pub start: f64,
    /// Trim end in source seconds, if bounded
    pub end: Option<f64>,
    /// Length before retiming, including any padding
    pub length: f64,
    /// Seconds of last-frame hold appended after the trimmed source
    pub pad: f64,
}

/// Work out which part of the source a scene plays and for how long.
pub fn plan_source(scene: &Scene, asset: &ResolvedAsset) -> MediaResult<SourceWindow> {
    let media = &scene.media;

    if media.kind == MediaType::Image {
        return Ok(SourceWindow {
            start: 0.0,
            end: None,
            length: scene.duration.unwrap_or(DEFAULT_IMAGE_DURATION_SECS),
            pad: 0.0,
        });
    }

    let start = media.start_time.unwrap_or(0.0);
    let probed = asset.duration();

    if let Some(source_len) = probed {
        if start >= source_len {
            return Err(MediaError::invalid_trim(
                &scene.id,
                format!(
                    "start_time {} is beyond the media duration {}",
                    fmt_num(start),
                    fmt_num(source_len)
                ),
            ));
        }
    }

    let mut end = media.end_time;
    if let (Some(e), Some(source_len)) = (end, probed) {
        if e > source_len {
            debug!(scene_id = %scene.id, end = e, source_len, "Clamping trim end to media duration");
            end = Some(source_len);
        }
    }
    if let Some(e) = end {
        if e <= start {
            return Err(MediaError::invalid_trim(
                &scene.id,
                format!(
                    "end_time {} must be greater than start_time {}",
                    fmt_num(e),
                    fmt_num(start)
                ),
            ));
        }
    }

    let trimmed = end.map(|e| e - start).or(probed.map(|d| d - start));

    match (scene.duration, trimmed) {
        (Some(wanted), Some(available)) if available >= wanted => Ok(SourceWindow {
            start,
            end: Some(start + wanted),
            length: wanted,
            pad: 0.0,
        }),
        (Some(wanted), Some(available)) => Ok(SourceWindow {
            start,
            end,
            length: wanted,
            pad: wanted - available,
        }),
        // Unknown source length: hold the last frame for the whole scene
        // and cut back to the wanted length.
        (Some(wanted), None) => Ok(SourceWindow {
            start,
            end,
            length: wanted,
            pad: wanted,
        }),
        (None, Some(available)) => Ok(SourceWindow {
            start,
            end,
            length: available,
            pad: 0.0,
        }),
        (None, None) => Err(MediaError::InvalidMedia(format!(
            "cannot determine the duration of {} for scene {}; set end_time or duration",
            media.file_id, scene.id
        ))),
    }
}

/// A video filter chain under construction, with its exact output duration.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoChain {
    filters: Vec<String>,
    duration: f64,
}

impl VideoChain {
    fn new(duration: f64) -> Self {
        Self {
            filters: Vec::new(),
            duration,
        }
    }

    fn then(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Inputs every stage can consult.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub scene: &'a Scene,
    pub window: &'a SourceWindow,
    pub settings: &'a VideoSettings,
}

/// One step of the scene pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStage {
    /// Trim, hold or generate the source frames
    Source,
    /// Fit to the target frame, square pixels, constant frame rate
    Normalize,
    /// Brightness, then rotation
    Color,
    /// Playback speed
    Retime,
    /// Zoom with optional pan
    Zoom,
}

/// Stages in application order. Retime precedes Zoom because the pan
/// expression and overlay timing read the retimed clock.
pub const SCENE_STAGES: [SceneStage; 5] = [
    SceneStage::Source,
    SceneStage::Normalize,
    SceneStage::Color,
    SceneStage::Retime,
    SceneStage::Zoom,
];

impl SceneStage {
    pub fn apply(self, ctx: &StageContext<'_>, chain: VideoChain) -> VideoChain {
        match self {
            SceneStage::Source => source_stage(ctx, chain),
            SceneStage::Normalize => normalize_stage(ctx, chain),
            SceneStage::Color => color_stage(ctx, chain),
            SceneStage::Retime => retime_stage(ctx, chain),
            SceneStage::Zoom => zoom_stage(ctx, chain),
        }
    }
}

fn source_stage(ctx: &StageContext<'_>, chain: VideoChain) -> VideoChain {
    let window = ctx.window;
    let settings = ctx.settings;

    match ctx.scene.media.kind {
        MediaType::Image => chain
            .then(format!("trim=duration={}", fmt_num(window.length)))
            .then("setpts=PTS-STARTPTS"),
        MediaType::Audio => chain.then(format!(
            "color=c=black:s={}x{}:r={}:d={}",
            settings.width,
            settings.height,
            settings.fps,
            fmt_num(window.length)
        )),
        MediaType::Video => {
            let mut chain = chain;
            if window.start > 0.0 || window.end.is_some() {
                let mut trim = format!("trim=start={}", fmt_num(window.start));
                if let Some(end) = window.end {
                    trim.push_str(&format!(":end={}", fmt_num(end)));
                }
                chain = chain.then(trim);
            }
            chain = chain.then("setpts=PTS-STARTPTS");
            if window.pad > 0.0 {
                chain = chain
                    .then(format!("tpad=stop_mode=clone:stop_duration={}", fmt_num(window.pad)))
                    .then(format!("trim=duration={}", fmt_num(window.length)));
            }
            chain
        }
    }
}

fn normalize_stage(ctx: &StageContext<'_>, chain: VideoChain) -> VideoChain {
    let (w, h) = (ctx.settings.width, ctx.settings.height);
    chain
        .then(format!("scale={}:{}:force_original_aspect_ratio=decrease", w, h))
        .then(format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2:color=black", w, h))
        .then("setsar=1")
        .then(format!("fps={}", ctx.settings.fps))
        .then("format=yuv420p")
}

fn color_stage(ctx: &StageContext<'_>, chain: VideoChain) -> VideoChain {
    let Some(effects) = &ctx.scene.media.effects else {
        return chain;
    };
    let mut chain = chain;

    if let Some(b) = effects.brightness.filter(|b| (b - 1.0).abs() > f64::EPSILON) {
        let b = fmt_num(b);
        chain = chain.then(format!("colorchannelmixer=rr={b}:gg={b}:bb={b}"));
    }

    if let Some(deg) = effects.rotation.filter(|r| r % 360.0 != 0.0) {
        chain = chain.then(format!(
            "rotate={}*PI/180:ow=iw:oh=ih:c=black",
            fmt_num(deg)
        ));
    }

    chain
}

fn retime_stage(ctx: &StageContext<'_>, chain: VideoChain) -> VideoChain {
    match scene_speed(ctx.scene) {
        Some(speed) => {
            let duration = chain.duration / speed;
            chain
                .then(format!("setpts=PTS/{}", fmt_num(speed)))
                .then(format!("fps={}", ctx.settings.fps))
                .with_duration(duration)
        }
        None => chain,
    }
}

fn zoom_stage(ctx: &StageContext<'_>, chain: VideoChain) -> VideoChain {
    let Some(effects) = &ctx.scene.media.effects else {
        return chain;
    };
    let Some(zoom) = effects.zoom.filter(|z| (z - 1.0).abs() > f64::EPSILON) else {
        if effects.pan.is_some() {
            debug!(scene_id = %ctx.scene.id, "Pan without zoom has no effect");
        }
        return chain;
    };

    let (w, h) = (ctx.settings.width, ctx.settings.height);
    let z = fmt_num(zoom);
    let chain = chain.then(format!("scale=trunc(iw*{z}/2)*2:trunc(ih*{z}/2)*2"));

    if zoom > 1.0 {
        let d = fmt_num(chain.duration);
        let (x, y) = match effects.pan {
            None => ("(iw-ow)/2".to_string(), "(ih-oh)/2".to_string()),
            Some(PanDirection::LeftToRight) => (format!("(iw-ow)*t/{d}"), "(ih-oh)/2".to_string()),
            Some(PanDirection::RightToLeft) => (format!("(iw-ow)*(1-t/{d})"), "(ih-oh)/2".to_string()),
            Some(PanDirection::TopToBottom) => ("(iw-ow)/2".to_string(), format!("(ih-oh)*t/{d}")),
            Some(PanDirection::BottomToTop) => ("(iw-ow)/2".to_string(), format!("(ih-oh)*(1-t/{d})")),
        };
        chain.then(format!("crop={w}:{h}:{x}:{y}")).then("setsar=1")
    } else {
        chain
            .then(format!("pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"))
            .then("setsar=1")
    }
}

/// Effective playback speed, `None` when unchanged.
pub fn scene_speed(scene: &Scene) -> Option<f64> {
    scene
        .media
        .effects
        .as_ref()
        .and_then(|e| e.speed)
        .filter(|s| *s > 0.0 && (s - 1.0).abs() > f64::EPSILON)
}

/// A compiled scene: one video node, one audio node, an exact duration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScene {
    pub scene_id: String,
    pub video: NodeId,
    pub audio: NodeId,
    pub duration: f64,
    /// Whether the base audio is the media's own track
    pub native_audio: bool,
}

/// Compiles scenes into graph nodes.
#[derive(Debug, Clone, Copy)]
pub struct SceneCompiler<'a> {
    settings: &'a VideoSettings,
    font: &'a str,
}

impl<'a> SceneCompiler<'a> {
    pub fn new(settings: &'a VideoSettings, font: &'a str) -> Self {
        Self { settings, font }
    }

    /// Compile one scene into the graph.
    pub fn compile(
        &self,
        graph: &mut OperationGraph,
        scene: &Scene,
        assets: &ResolvedAssets,
    ) -> MediaResult<CompiledScene> {
        let asset = assets
            .get(&scene.media.file_id)
            .ok_or_else(|| MediaError::media_not_found(&scene.media.file_id))?;

        let window = plan_source(scene, asset)?;
        let input = self.add_primary_input(graph, scene, asset, &window);

        let ctx = StageContext {
            scene,
            window: &window,
            settings: self.settings,
        };
        let chain = SCENE_STAGES
            .iter()
            .fold(VideoChain::new(window.length), |chain, stage| stage.apply(&ctx, chain));
        let duration = chain.duration;

        let video_inputs = match scene.media.kind {
            MediaType::Audio => vec![],
            MediaType::Image | MediaType::Video => vec![Pad::Input(input, StreamKind::Video)],
        };
        let mut video = graph.add_node(StreamKind::Video, video_inputs, chain.filters);

        for overlay in &scene.text_overlays {
            let filter = self.text_overlay_filter(overlay, duration)?;
            video = graph.add_node(StreamKind::Video, vec![video.into()], [filter]);
        }

        let source = SceneAudioSource::resolve(scene.media.kind, asset, input, duration);
        let speed = scene_speed(scene).unwrap_or(1.0);
        let audio = audio::synthesize(graph, source, &window, speed, duration);

        debug!(
            scene_id = %scene.id,
            duration,
            overlays = scene.text_overlays.len(),
            native_audio = source.is_native(),
            "Compiled scene"
        );

        Ok(CompiledScene {
            scene_id: scene.id.clone(),
            video,
            audio,
            duration,
            native_audio: source.is_native(),
        })
    }

    fn add_primary_input(
        &self,
        graph: &mut OperationGraph,
        scene: &Scene,
        asset: &ResolvedAsset,
        window: &SourceWindow,
    ) -> InputId {
        match scene.media.kind {
            MediaType::Image => {
                if scene.media.start_time.is_some() || scene.media.end_time.is_some() {
                    warn!(scene_id = %scene.id, "Trim ignored for image media");
                }
                graph.add_input(
                    &asset.path,
                    [
                        "-loop".to_string(),
                        "1".to_string(),
                        "-framerate".to_string(),
                        self.settings.fps.to_string(),
                        "-t".to_string(),
                        fmt_num(window.length),
                    ],
                )
            }
            MediaType::Video | MediaType::Audio => graph.add_input(&asset.path, Vec::<String>::new()),
        }
    }

    /// `drawtext` filter for one overlay on a scene of `scene_duration` seconds.
    pub fn text_overlay_filter(&self, overlay: &TextOverlay, scene_duration: f64) -> MediaResult<String> {
        let (x, y) = resolve_position(&overlay.position, self.settings.width, self.settings.height)?;

        let font = if self.font.contains('/') {
            format!("fontfile={}", escape_filter_value(self.font))
        } else {
            format!("font={}", escape_filter_value(self.font))
        };

        let mut filter = format!(
            "drawtext={}:text={}:expansion=none:fontsize={}:fontcolor={}:x={}:y={}",
            font,
            escape_filter_value(&overlay.text),
            overlay.font_size,
            ffmpeg_color(&overlay.color),
            fmt_num(x),
            fmt_num(y)
        );

        if let Some(bg) = &overlay.background_color {
            filter.push_str(&format!(":box=1:boxcolor={}:boxborderw=8", ffmpeg_color(bg)));
        }
        if let Some(stroke) = &overlay.stroke_color {
            filter.push_str(&format!(":borderw=2:bordercolor={}", ffmpeg_color(stroke)));
        }

        if overlay.start_time.is_some() || overlay.duration.is_some() {
            let start = overlay.start_time.unwrap_or(0.0);
            let end = overlay
                .duration
                .map(|d| start + d)
                .unwrap_or(scene_duration);
            filter.push_str(&format!(
                ":enable='between(t,{},{})'",
                fmt_num(start),
                fmt_num(end)
            ));
        }

        Ok(filter)
    }
}

/// `#RRGGBB` to FFmpeg's `0xRRGGBB`.
fn ffmpeg_color(hex: &str) -> String {
    format!("0x{}", hex.trim_start_matches('#'))
}

/// Escape a value for use as a filter option inside a filter graph.
///
/// Two levels apply: the option parser (`\ ' :`) and then the graph parser
/// (`\ ' [ ] , ;`).
pub fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::MediaInfo;
    use serde_json::json;

    fn settings() -> VideoSettings {
        VideoSettings {
            width: 1280,
            height: 720,
            fps: 30,
            ..Default::default()
        }
    }

    fn scene(value: serde_json::Value) -> Scene {
        serde_json::from_value(value).unwrap()
    }

    fn video_asset(duration: f64, has_audio: bool) -> ResolvedAsset {
        ResolvedAsset::new(
            "/uploads/clip.mp4",
            Some(MediaInfo {
                duration: Some(duration),
                has_video: true,
                has_audio,
                ..Default::default()
            }),
        )
    }

    fn compile(scene: &Scene, assets: &ResolvedAssets) -> (OperationGraph, CompiledScene) {
        let settings = settings();
        let mut graph = OperationGraph::new();
        let compiled = SceneCompiler::new(&settings, "Sans")
            .compile(&mut graph, scene, assets)
            .unwrap();
        (graph, compiled)
    }

    #[test]
    fn test_image_default_duration() {
        let s = scene(json!({ "id": "a", "media": { "type": "image", "file_id": "img" } }));
        let assets = ResolvedAssets::new().with("img", ResolvedAsset::new("/uploads/img.png", None));

        let (graph, compiled) = compile(&s, &assets);

        assert_eq!(compiled.duration, 5.0);
        assert!(!compiled.native_audio);
        assert_eq!(graph.inputs()[0].options, vec!["-loop", "1", "-framerate", "30", "-t", "5"]);
        let audio = &graph.node(compiled.audio).unwrap().filters;
        assert_eq!(audio[1], "atrim=duration=5");
    }

    #[test]
    fn test_video_trim_and_duration_override() {
        let s = scene(json!({
            "id": "v", "duration": 3.0,
            "media": { "type": "video", "file_id": "clip", "start_time": 2.0, "end_time": 8.0 }
        }));
        let window = plan_source(&s, &video_asset(20.0, true)).unwrap();
        assert_eq!(window, SourceWindow { start: 2.0, end: Some(5.0), length: 3.0, pad: 0.0 });

        let longer = scene(json!({
            "id": "v", "duration": 10.0,
            "media": { "type": "video", "file_id": "clip", "start_time": 2.0, "end_time": 8.0 }
        }));
        let window = plan_source(&longer, &video_asset(20.0, true)).unwrap();
        assert_eq!(window.pad, 4.0);
        assert_eq!(window.length, 10.0);
    }

    #[test]
    fn test_longer_duration_holds_last_frame() {
        let s = scene(json!({
            "id": "v", "duration": 6.0,
            "media": { "type": "video", "file_id": "clip" }
        }));
        let assets = ResolvedAssets::new().with("clip", video_asset(4.0, true));
        let (graph, compiled) = compile(&s, &assets);

        let rendered = graph.render(&[compiled.video, compiled.audio]).unwrap();
        assert!(rendered.contains("tpad=stop_mode=clone:stop_duration=2,trim=duration=6"));
        assert_eq!(compiled.duration, 6.0);
    }

    #[test]
    fn test_trim_start_beyond_media_is_invalid() {
        let s = scene(json!({
            "id": "late",
            "media": { "type": "video", "file_id": "clip", "start_time": 30.0 }
        }));
        let err = plan_source(&s, &video_asset(10.0, true)).unwrap_err();
        assert!(matches!(err, MediaError::InvalidTrim { ref scene_id, .. } if scene_id == "late"));
    }

    #[test]
    fn test_unknown_duration_without_bounds_fails() {
        let s = scene(json!({ "id": "v", "media": { "type": "video", "file_id": "clip" } }));
        let asset = ResolvedAsset::new("/uploads/clip.mp4", None);
        assert!(matches!(plan_source(&s, &asset), Err(MediaError::InvalidMedia(_))));
    }

    #[test]
    fn test_effects_apply_in_order() {
        let s = scene(json!({
            "id": "fx", "duration": 4.0,
            "media": {
                "type": "image", "file_id": "img",
                "effects": { "brightness": 1.2, "rotation": 90, "speed": 2.0, "zoom": 1.5, "pan": "left_to_right" }
            }
        }));
        let assets = ResolvedAssets::new().with("img", ResolvedAsset::new("/uploads/img.png", None));
        let (graph, compiled) = compile(&s, &assets);

        assert_eq!(compiled.duration, 2.0);
        let filters = graph.node(compiled.video).unwrap().filters.join(",");
        let pos = |needle: &str| filters.find(needle).unwrap_or_else(|| panic!("missing {needle}"));

        assert!(pos("scale=1280:720") < pos("colorchannelmixer=rr=1.2"));
        assert!(pos("colorchannelmixer") < pos("rotate=90*PI/180"));
        assert!(pos("rotate=") < pos("setpts=PTS/2"));
        assert!(pos("setpts=PTS/2") < pos("scale=trunc(iw*1.5/2)*2"));
        assert!(filters.contains("crop=1280:720:(iw-ow)*t/2:(ih-oh)/2"));
    }

    #[test]
    fn test_zoom_out_pads_back_to_frame() {
        let s = scene(json!({
            "id": "z",
            "media": { "type": "image", "file_id": "img", "effects": { "zoom": 0.5 } }
        }));
        let assets = ResolvedAssets::new().with("img", ResolvedAsset::new("/uploads/img.png", None));
        let (graph, compiled) = compile(&s, &assets);
        let filters = graph.node(compiled.video).unwrap().filters.join(",");
        assert!(filters.ends_with("scale=trunc(iw*0.5/2)*2:trunc(ih*0.5/2)*2,pad=1280:720:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1"));
    }

    #[test]
    fn test_text_overlays_are_separate_nodes() {
        let s = scene(json!({
            "id": "t", "duration": 6.0,
            "media": { "type": "image", "file_id": "img" },
            "text_overlays": [
                { "text": "Title", "position": { "x": "center", "y": "top" } },
                { "text": "Sub", "position": { "x": 10, "y": "bottom" }, "start_time": 1.0, "duration": 2.0,
                  "background_color": "#000000", "stroke_color": "#FF0000" }
            ]
        }));
        let assets = ResolvedAssets::new().with("img", ResolvedAsset::new("/uploads/img.png", None));
        let (graph, compiled) = compile(&s, &assets);

        let last = graph.node(compiled.video).unwrap();
        assert_eq!(last.filters.len(), 1);
        let second = &last.filters[0];
        assert!(second.starts_with("drawtext=font=Sans:text=Sub:"));
        assert!(second.contains("x=10:y=720"));
        assert!(second.contains(":box=1:boxcolor=0x000000"));
        assert!(second.contains(":borderw=2:bordercolor=0xFF0000"));
        assert!(second.ends_with(":enable='between(t,1,3)'"));

        let Pad::Node(first_id) = last.inputs[0] else { panic!("overlay input should be a node") };
        let first = &graph.node(first_id).unwrap().filters[0];
        assert!(first.contains("x=640:y=0"));
        assert!(!first.contains("enable="));
    }

    #[test]
    fn test_overlay_start_only_runs_to_scene_end() {
        let settings = settings();
        let compiler = SceneCompiler::new(&settings, "/fonts/Inter.ttf");
        let overlay: TextOverlay = serde_json::from_value(json!({
            "text": "Late", "position": { "x": 0, "y": 0 }, "start_time": 2.5
        }))
        .unwrap();

        let filter = compiler.text_overlay_filter(&overlay, 4.0).unwrap();
        assert!(filter.starts_with("drawtext=fontfile=/fonts/Inter.ttf:"));
        assert!(filter.ends_with("enable='between(t,2.5,4)'"));
    }

    #[test]
    fn test_malformed_overlay_position_fails_scene() {
        let s = scene(json!({
            "id": "bad",
            "media": { "type": "image", "file_id": "img" },
            "text_overlays": [ { "text": "x", "position": { "x": "upper-left", "y": 0 } } ]
        }));
        let assets = ResolvedAssets::new().with("img", ResolvedAsset::new("/uploads/img.png", None));
        let settings = settings();
        let mut graph = OperationGraph::new();
        let err = SceneCompiler::new(&settings, "Sans")
            .compile(&mut graph, &s, &assets)
            .unwrap_err();
        assert!(matches!(err, MediaError::MalformedPosition(_)));
    }

    #[test]
    fn test_audio_media_gets_black_frames() {
        let s = scene(json!({ "id": "pod", "media": { "type": "audio", "file_id": "talk", "end_time": 4.0 } }));
        let assets = ResolvedAssets::new().with(
            "talk",
            ResolvedAsset::new(
                "/uploads/talk.mp3",
                Some(MediaInfo { duration: Some(60.0), has_audio: true, ..Default::default() }),
            ),
        );
        let (graph, compiled) = compile(&s, &assets);

        let video = graph.node(compiled.video).unwrap();
        assert!(video.inputs.is_empty());
        assert_eq!(video.filters[0], "color=c=black:s=1280x720:r=30:d=4");
        assert!(compiled.native_audio);
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("Hello world"), "Hello world");
        assert_eq!(escape_filter_value("It's 5:00"), r"It\\\'s 5\\:00");
        assert_eq!(escape_filter_value("a,b[c]"), r"a\,b\[c\]");
    }
}
