//! Transition resolution between adjacent scenes.
//!
//! Transitions are matched strictly by their `(from_scene, to_scene)` pair.
//! Each adjacent pair of scenes gets exactly one [`Boundary`]: a hard cut
//! when nothing is declared, or a cross-effect of a bounded duration.

use std::collections::HashMap;

use reel_models::{Transition, TransitionKind};
use tracing::{debug, warn};

use crate::graph::{fmt_num, NodeId, OperationGraph, StreamKind};
use crate::scene::CompiledScene;

/// Largest share of either adjacent scene a cross-effect may overlap.
pub const MAX_OVERLAP_RATIO: f64 = 0.5;

/// How two adjacent scenes are joined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    /// Hard cut, zero overlap
    Cut,
    /// Cross-effect overlapping both scenes by `duration` seconds
    Cross {
        /// Encoder transition name
        transition: &'static str,
        kind: TransitionKind,
        duration: f64,
    },
}

impl Boundary {
    /// Seconds the two scenes overlap.
    pub fn overlap(&self) -> f64 {
        match self {
            Boundary::Cut => 0.0,
            Boundary::Cross { duration, .. } => *duration,
        }
    }

    pub fn is_cross(&self) -> bool {
        matches!(self, Boundary::Cross { .. })
    }
}

/// Map a declared transition kind to the encoder's cross-blend name.
pub fn xfade_transition(kind: TransitionKind) -> &'static str {
    match kind {
        TransitionKind::Fade | TransitionKind::Unknown => "fade",
        TransitionKind::Dissolve => "dissolve",
        TransitionKind::Wipe => "wipeleft",
        TransitionKind::SlideLeft => "slideleft",
        TransitionKind::SlideRight => "slideright",
        TransitionKind::SlideUp => "slideup",
        TransitionKind::SlideDown => "slidedown",
    }
}

/// Resolve one boundary per adjacent scene pair.
///
/// When the same pair is declared more than once the last declaration wins.
/// Declarations for pairs that are not adjacent are ignored.
pub fn resolve_boundaries(
    scenes: &[CompiledScene],
    transitions: &[Transition],
    warnings: &mut Vec<String>,
) -> Vec<Boundary> {
    let declared: HashMap<(&str, &str), &Transition> = transitions
        .iter()
        .map(|t| ((t.from_scene.as_str(), t.to_scene.as_str()), t))
        .collect();

    let mut used = 0usize;
    let boundaries: Vec<Boundary> = scenes
        .windows(2)
        .map(|pair| {
            let (from, to) = (&pair[0], &pair[1]);
            let Some(transition) = declared.get(&(from.scene_id.as_str(), to.scene_id.as_str())) else {
                return Boundary::Cut;
            };
            used += 1;
            resolve_one(from, to, transition, warnings)
        })
        .collect();

    if used < declared.len() {
        for t in transitions {
            let adjacent = scenes
                .windows(2)
                .any(|p| p[0].scene_id == t.from_scene && p[1].scene_id == t.to_scene);
            if !adjacent {
                debug!(
                    from = %t.from_scene,
                    to = %t.to_scene,
                    "Ignoring transition between non-adjacent scenes"
                );
            }
        }
    }

    boundaries
}

fn resolve_one(
    from: &CompiledScene,
    to: &CompiledScene,
    transition: &Transition,
    warnings: &mut Vec<String>,
) -> Boundary {
    if transition.kind == TransitionKind::Unknown {
        warn!(from = %from.scene_id, to = %to.scene_id, "Unknown transition type, using fade");
        warnings.push(format!(
            "transition {} -> {}: unknown type rendered as fade",
            from.scene_id, to.scene_id
        ));
    }

    let limit = MAX_OVERLAP_RATIO * from.duration.min(to.duration);
    let duration = if transition.duration > limit {
        warn!(
            from = %from.scene_id,
            to = %to.scene_id,
            requested = transition.duration,
            clamped = limit,
            "Transition longer than adjacent scenes allow, clamping"
        );
        warnings.push(format!(
            "transition {} -> {}: duration {} clamped to {}",
            from.scene_id,
            to.scene_id,
            fmt_num(transition.duration),
            fmt_num(limit)
        ));
        limit
    } else {
        transition.duration
    };

    Boundary::Cross {
        transition: xfade_transition(transition.kind),
        kind: transition.kind,
        duration,
    }
}

/// Join the scene video streams in order. Returns the joined node and the
/// total timeline duration.
///
/// `boundaries` must hold one entry per adjacent pair.
pub fn join_video(
    graph: &mut OperationGraph,
    scenes: &[CompiledScene],
    boundaries: &[Boundary],
) -> Option<(NodeId, f64)> {
    let (first, rest) = scenes.split_first()?;

    let joined = rest.iter().zip(boundaries).fold(
        (first.video, first.duration),
        |(acc, total), (scene, boundary)| match *boundary {
            Boundary::Cut => {
                let node = graph.add_node(
                    StreamKind::Video,
                    vec![acc.into(), scene.video.into()],
                    ["concat=n=2:v=1:a=0"],
                );
                (node, total + scene.duration)
            }
            Boundary::Cross {
                transition,
                duration,
                ..
            } => {
                let node = graph.add_node(
                    StreamKind::Video,
                    vec![acc.into(), scene.video.into()],
                    [format!(
                        "xfade=transition={}:duration={}:offset={}",
                        transition,
                        fmt_num(duration),
                        fmt_num(total - duration)
                    )],
                );
                (node, total + scene.duration - duration)
            }
        },
    );

    Some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(graph: &mut OperationGraph, id: &str, duration: f64) -> CompiledScene {
        let video = graph.add_node(StreamKind::Video, vec![], [format!("color=d={}", duration)]);
        let audio = graph.add_node(StreamKind::Audio, vec![], [format!("anullsrc,atrim=duration={}", duration)]);
        CompiledScene {
            scene_id: id.to_string(),
            video,
            audio,
            duration,
            native_audio: false,
        }
    }

    #[test]
    fn test_no_declaration_is_cut() {
        let mut graph = OperationGraph::new();
        let scenes = vec![compiled(&mut graph, "a", 3.0), compiled(&mut graph, "b", 4.0)];
        let mut warnings = Vec::new();

        let boundaries = resolve_boundaries(&scenes, &[], &mut warnings);
        assert_eq!(boundaries, vec![Boundary::Cut]);

        let (node, total) = join_video(&mut graph, &scenes, &boundaries).unwrap();
        assert_eq!(total, 7.0);
        assert_eq!(graph.node(node).unwrap().filters[0], "concat=n=2:v=1:a=0");
    }

    #[test]
    fn test_xfade_offsets_accumulate() {
        let mut graph = OperationGraph::new();
        let scenes = vec![
            compiled(&mut graph, "a", 5.0),
            compiled(&mut graph, "b", 5.0),
            compiled(&mut graph, "c", 4.0),
        ];
        let transitions = vec![
            Transition::new("a", "b", TransitionKind::Fade, 0.5),
            Transition::new("b", "c", TransitionKind::SlideLeft, 1.0),
        ];
        let mut warnings = Vec::new();

        let boundaries = resolve_boundaries(&scenes, &transitions, &mut warnings);
        let (node, total) = join_video(&mut graph, &scenes, &boundaries).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(total, 12.5);
        assert_eq!(
            graph.node(node).unwrap().filters[0],
            "xfade=transition=slideleft:duration=1:offset=8.5"
        );
        let rendered = graph.render(&[node]).unwrap();
        assert!(rendered.contains("xfade=transition=fade:duration=0.5:offset=4.5"));
    }

    #[test]
    fn test_unmatched_pair_is_ignored() {
        let mut graph = OperationGraph::new();
        let scenes = vec![
            compiled(&mut graph, "a", 3.0),
            compiled(&mut graph, "b", 3.0),
            compiled(&mut graph, "c", 3.0),
        ];
        let transitions = vec![
            Transition::new("a", "c", TransitionKind::Fade, 0.5),
            Transition::new("b", "a", TransitionKind::Fade, 0.5),
        ];
        let mut warnings = Vec::new();

        let boundaries = resolve_boundaries(&scenes, &transitions, &mut warnings);
        assert_eq!(boundaries, vec![Boundary::Cut, Boundary::Cut]);
    }

    #[test]
    fn test_overlong_transition_is_clamped() {
        let mut graph = OperationGraph::new();
        let scenes = vec![compiled(&mut graph, "a", 1.0), compiled(&mut graph, "b", 6.0)];
        let transitions = vec![Transition::new("a", "b", TransitionKind::Dissolve, 3.0)];
        let mut warnings = Vec::new();

        let boundaries = resolve_boundaries(&scenes, &transitions, &mut warnings);
        assert_eq!(boundaries[0].overlap(), 0.5);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("clamped to 0.5"));
    }

    #[test]
    fn test_unknown_kind_falls_back_to_fade() {
        let mut graph = OperationGraph::new();
        let scenes = vec![compiled(&mut graph, "a", 3.0), compiled(&mut graph, "b", 3.0)];
        let transitions = vec![Transition::new("a", "b", TransitionKind::Unknown, 0.5)];
        let mut warnings = Vec::new();

        let boundaries = resolve_boundaries(&scenes, &transitions, &mut warnings);
        assert!(matches!(boundaries[0], Boundary::Cross { transition: "fade", .. }));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_last_declaration_wins() {
        let mut graph = OperationGraph::new();
        let scenes = vec![compiled(&mut graph, "a", 3.0), compiled(&mut graph, "b", 3.0)];
        let transitions = vec![
            Transition::new("a", "b", TransitionKind::Fade, 0.5),
            Transition::new("a", "b", TransitionKind::Wipe, 1.0),
        ];
        let mut warnings = Vec::new();

        let boundaries = resolve_boundaries(&scenes, &transitions, &mut warnings);
        assert_eq!(
            boundaries[0],
            Boundary::Cross { transition: "wipeleft", kind: TransitionKind::Wipe, duration: 1.0 }
        );
    }

    #[test]
    fn test_single_scene_has_no_boundaries() {
        let mut graph = OperationGraph::new();
        let scenes = vec![compiled(&mut graph, "only", 2.0)];
        let boundaries = resolve_boundaries(&scenes, &[], &mut Vec::new());
        assert!(boundaries.is_empty());

        let (node, total) = join_video(&mut graph, &scenes, &boundaries).unwrap();
        assert_eq!(node, scenes[0].video);
        assert_eq!(total, 2.0);
    }
}
