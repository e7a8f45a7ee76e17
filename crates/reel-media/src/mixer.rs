//! Audio mixing.
//!
//! Three levels: each scene's base audio is mixed with its scene audio and
//! voiceover, the scene mixes are joined along the same boundaries as the
//! video, and timeline layers (background music, extra tracks) are summed on
//! top. Layers whose file did not resolve are skipped with a warning.

use reel_models::{Audio, AudioTrack, BackgroundMusic, CompositionRequest, Scene};
use tracing::{debug, warn};

use crate::audio::{audio_format_filter, SAMPLE_RATE};
use crate::graph::{fmt_num, NodeId, OperationGraph, Pad, StreamKind};
use crate::scene::CompiledScene;
use crate::store::ResolvedAssets;
use crate::transition::Boundary;

/// One audio file placed on a window of time with gain and fades.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioLayer {
    pub file_id: String,
    pub volume: f64,
    pub fade_in: Option<f64>,
    pub fade_out: Option<f64>,
    /// Start within the window in seconds
    pub offset: f64,
    /// Play at most this many seconds
    pub duration: Option<f64>,
    pub looped: bool,
}

impl From<&Audio> for AudioLayer {
    fn from(audio: &Audio) -> Self {
        Self {
            file_id: audio.file_id.clone(),
            volume: audio.volume,
            fade_in: audio.fade_in,
            fade_out: audio.fade_out,
            offset: audio.start_time.unwrap_or(0.0),
            duration: audio.duration,
            looped: audio.looped,
        }
    }
}

impl From<&AudioTrack> for AudioLayer {
    fn from(track: &AudioTrack) -> Self {
        Self {
            file_id: track.file_id.clone(),
            volume: track.volume,
            fade_in: track.fade_in,
            fade_out: track.fade_out,
            offset: track.start_time.unwrap_or(0.0),
            duration: track.duration,
            looped: track.looped,
        }
    }
}

impl From<&BackgroundMusic> for AudioLayer {
    fn from(music: &BackgroundMusic) -> Self {
        Self {
            file_id: music.music_id.clone(),
            volume: music.volume,
            fade_in: music.fade_in,
            fade_out: music.fade_out,
            offset: 0.0,
            duration: None,
            looped: music.looped,
        }
    }
}

impl AudioLayer {
    /// Seconds this layer actually plays inside a window of `window` seconds.
    pub fn play_duration(&self, window: f64, source_duration: Option<f64>) -> f64 {
        let mut play = window - self.offset;
        if let Some(d) = self.duration {
            play = play.min(d);
        }
        if !self.looped {
            if let Some(source) = source_duration {
                play = play.min(source);
            }
        }
        play.max(0.0)
    }

    /// Filters shaping the layer, or `None` when it would not be heard.
    pub fn filters(&self, window: f64, source_duration: Option<f64>) -> Option<Vec<String>> {
        let play = self.play_duration(window, source_duration);
        if play <= 0.0 {
            return None;
        }

        let mut filters = vec![
            format!("atrim=duration={}", fmt_num(play)),
            "asetpts=PTS-STARTPTS".to_string(),
            format!("aresample={}", SAMPLE_RATE),
            audio_format_filter(),
            format!("volume={}", fmt_num(self.volume)),
        ];

        if let Some(fade_in) = self.fade_in.filter(|f| *f > 0.0) {
            filters.push(format!("afade=t=in:st=0:d={}", fmt_num(fade_in.min(play))));
        }
        if let Some(fade_out) = self.fade_out.filter(|f| *f > 0.0) {
            let fade_out = fade_out.min(play);
            filters.push(format!(
                "afade=t=out:st={}:d={}",
                fmt_num(play - fade_out),
                fmt_num(fade_out)
            ));
        }
        if self.offset > 0.0 {
            let ms = (self.offset * 1000.0).round() as u64;
            filters.push(format!("adelay={}:all=1", ms));
        }

        Some(filters)
    }

    /// Encoder input options for this layer's file.
    pub fn input_options(&self) -> Vec<String> {
        if self.looped {
            vec!["-stream_loop".to_string(), "-1".to_string()]
        } else {
            Vec::new()
        }
    }

    /// Add the layer to the graph. `None` when the file is unresolved or the
    /// layer falls outside the window.
    pub fn add_to(
        &self,
        graph: &mut OperationGraph,
        assets: &ResolvedAssets,
        window: f64,
        warnings: &mut Vec<String>,
    ) -> Option<NodeId> {
        let Some(asset) = assets.get(&self.file_id) else {
            warn!(file_id = %self.file_id, "Audio layer not resolved, skipping");
            warnings.push(format!("audio layer {} skipped: file not resolved", self.file_id));
            return None;
        };

        let Some(filters) = self.filters(window, asset.duration()) else {
            debug!(file_id = %self.file_id, offset = self.offset, window, "Audio layer outside window");
            return None;
        };

        let input = graph.add_input(&asset.path, self.input_options());
        Some(graph.add_node(
            StreamKind::Audio,
            vec![Pad::Input(input, StreamKind::Audio)],
            filters,
        ))
    }
}

fn amix_filter(inputs: usize) -> String {
    format!(
        "amix=inputs={}:duration=first:dropout_transition=0:normalize=0",
        inputs
    )
}

/// Mix a scene's base audio with its scene audio and voiceover.
///
/// The result lasts exactly the scene duration.
pub fn mix_scene(
    graph: &mut OperationGraph,
    scene: &Scene,
    compiled: &CompiledScene,
    assets: &ResolvedAssets,
    warnings: &mut Vec<String>,
) -> NodeId {
    let layers: Vec<NodeId> = [scene.audio.as_ref(), scene.voiceover.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|audio| AudioLayer::from(audio).add_to(graph, assets, compiled.duration, warnings))
        .collect();

    if layers.is_empty() {
        return compiled.audio;
    }

    let mut inputs = vec![Pad::Node(compiled.audio)];
    inputs.extend(layers.into_iter().map(Pad::Node));
    let duration = fmt_num(compiled.duration);

    graph.add_node(
        StreamKind::Audio,
        inputs.clone(),
        [
            amix_filter(inputs.len()),
            format!("apad=whole_dur={}", duration),
            format!("atrim=duration={}", duration),
        ],
    )
}

/// Join per-scene audio along the video boundaries.
///
/// `scene_audio` pairs each scene's mixed audio with its duration.
pub fn join_scene_audio(
    graph: &mut OperationGraph,
    scene_audio: &[NodeId],
    boundaries: &[Boundary],
) -> Option<NodeId> {
    let (first, rest) = scene_audio.split_first()?;

    Some(rest.iter().zip(boundaries).fold(*first, |acc, (next, boundary)| {
        let filter = match boundary {
            Boundary::Cut => "concat=n=2:v=0:a=1".to_string(),
            Boundary::Cross { duration, .. } => {
                format!("acrossfade=d={}:c1=tri:c2=tri", fmt_num(*duration))
            }
        };
        graph.add_node(StreamKind::Audio, vec![acc.into(), (*next).into()], [filter])
    }))
}

/// Sum background music and extra tracks onto the joined scene audio.
pub fn mix_timeline(
    graph: &mut OperationGraph,
    base: NodeId,
    request: &CompositionRequest,
    assets: &ResolvedAssets,
    total_duration: f64,
    warnings: &mut Vec<String>,
) -> NodeId {
    let layers: Vec<NodeId> = request
        .background_music()
        .map(AudioLayer::from)
        .into_iter()
        .chain(request.audio_tracks.iter().map(AudioLayer::from))
        .filter_map(|layer| layer.add_to(graph, assets, total_duration, warnings))
        .collect();

    if layers.is_empty() {
        return base;
    }

    debug!(layers = layers.len(), total_duration, "Mixing timeline audio");

    let mut inputs = vec![Pad::Node(base)];
    inputs.extend(layers.into_iter().map(Pad::Node));
    let count = inputs.len();

    graph.add_node(
        StreamKind::Audio,
        inputs,
        [
            amix_filter(count),
            format!("atrim=duration={}", fmt_num(total_duration)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::MediaInfo;
    use crate::store::ResolvedAsset;

    fn audio_asset(path: &str, duration: f64) -> ResolvedAsset {
        ResolvedAsset::new(
            path,
            Some(MediaInfo {
                duration: Some(duration),
                has_audio: true,
                ..Default::default()
            }),
        )
    }

    fn base_scene(graph: &mut OperationGraph, duration: f64) -> CompiledScene {
        let video = graph.add_node(StreamKind::Video, vec![], ["color"]);
        let audio = graph.add_node(StreamKind::Audio, vec![], ["anullsrc"]);
        CompiledScene {
            scene_id: "s".to_string(),
            video,
            audio,
            duration,
            native_audio: false,
        }
    }

    #[test]
    fn test_layer_filters() {
        let layer = AudioLayer {
            file_id: "vo".to_string(),
            volume: 1.2,
            fade_in: Some(0.5),
            fade_out: Some(1.0),
            offset: 1.5,
            duration: None,
            looped: false,
        };

        let filters = layer.filters(6.0, Some(10.0)).unwrap();
        assert_eq!(filters[0], "atrim=duration=4.5");
        assert!(filters.contains(&"volume=1.2".to_string()));
        assert!(filters.contains(&"afade=t=in:st=0:d=0.5".to_string()));
        assert!(filters.contains(&"afade=t=out:st=3.5:d=1".to_string()));
        assert_eq!(filters.last().unwrap(), "adelay=1500:all=1");
    }

    #[test]
    fn test_play_duration_limits() {
        let mut layer = AudioLayer::from(&Audio::new("a"));
        assert_eq!(layer.play_duration(10.0, Some(3.0)), 3.0);

        layer.looped = true;
        assert_eq!(layer.play_duration(10.0, Some(3.0)), 10.0);

        layer.duration = Some(4.0);
        assert_eq!(layer.play_duration(10.0, Some(3.0)), 4.0);

        layer.offset = 12.0;
        assert!(layer.filters(10.0, None).is_none());
    }

    #[test]
    fn test_scene_without_layers_keeps_base() {
        let mut graph = OperationGraph::new();
        let compiled = base_scene(&mut graph, 5.0);
        let scene: Scene = serde_json::from_value(serde_json::json!({
            "id": "s", "media": { "type": "image", "file_id": "img" }
        }))
        .unwrap();

        let node = mix_scene(&mut graph, &scene, &compiled, &ResolvedAssets::new(), &mut Vec::new());
        assert_eq!(node, compiled.audio);
    }

    #[test]
    fn test_scene_mix_with_voiceover() {
        let mut graph = OperationGraph::new();
        let compiled = base_scene(&mut graph, 5.0);
        let scene: Scene = serde_json::from_value(serde_json::json!({
            "id": "s", "media": { "type": "image", "file_id": "img" },
            "voiceover": { "file_id": "vo", "volume": 1.5 },
            "audio": { "file_id": "gone" }
        }))
        .unwrap();
        let assets = ResolvedAssets::new().with("vo", audio_asset("/uploads/vo.wav", 8.0));
        let mut warnings = Vec::new();

        let node = mix_scene(&mut graph, &scene, &compiled, &assets, &mut warnings);
        let mixed = graph.node(node).unwrap();

        assert_eq!(mixed.inputs.len(), 2);
        assert_eq!(
            mixed.filters,
            vec![
                "amix=inputs=2:duration=first:dropout_transition=0:normalize=0",
                "apad=whole_dur=5",
                "atrim=duration=5",
            ]
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("gone"));
    }

    #[test]
    fn test_join_follows_boundaries() {
        let mut graph = OperationGraph::new();
        let a = graph.add_node(StreamKind::Audio, vec![], ["anullsrc"]);
        let b = graph.add_node(StreamKind::Audio, vec![], ["anullsrc"]);
        let c = graph.add_node(StreamKind::Audio, vec![], ["anullsrc"]);
        let boundaries = vec![
            Boundary::Cut,
            Boundary::Cross {
                transition: "fade",
                kind: reel_models::TransitionKind::Fade,
                duration: 0.5,
            },
        ];

        let out = join_scene_audio(&mut graph, &[a, b, c], &boundaries).unwrap();
        let rendered = graph.render(&[out]).unwrap();
        assert!(rendered.contains("[a0][a1]concat=n=2:v=0:a=1[a3]"));
        assert!(rendered.contains("[a3][a2]acrossfade=d=0.5:c1=tri:c2=tri[a4]"));
    }

    #[test]
    fn test_timeline_music_loops_and_fades() {
        let request: CompositionRequest = serde_json::from_value(serde_json::json!({
            "title": "t",
            "scenes": [{ "id": "s", "media": { "type": "image", "file_id": "img" } }],
            "global_audio": { "background_music": { "music_id": "song", "fade_in": 2.0, "fade_out": 1.0 } },
            "audio_tracks": [{ "file_id": "sfx", "start_time": 3.0 }]
        }))
        .unwrap();
        let assets = ResolvedAssets::new()
            .with("song", audio_asset("/uploads/song.mp3", 2.0))
            .with("sfx", audio_asset("/uploads/sfx.wav", 1.0));

        let mut graph = OperationGraph::new();
        let base = graph.add_node(StreamKind::Audio, vec![], ["anullsrc"]);
        let out = mix_timeline(&mut graph, base, &request, &assets, 10.0, &mut Vec::new());

        assert_eq!(graph.inputs()[0].options, vec!["-stream_loop", "-1"]);
        assert!(graph.inputs()[1].options.is_empty());

        let rendered = graph.render(&[out]).unwrap();
        assert!(rendered.contains("volume=0.3,afade=t=in:st=0:d=2,afade=t=out:st=9:d=1"));
        assert!(rendered.contains("atrim=duration=1,"));
        assert!(rendered.contains("adelay=3000:all=1"));
        assert!(rendered.contains("amix=inputs=3:duration=first:dropout_transition=0:normalize=0,atrim=duration=10"));
    }
}
