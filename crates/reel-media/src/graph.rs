//! Operation graph arena.
//!
//! The composition is assembled as an arena of filter nodes addressed by
//! integer [`NodeId`]s. Every node carries one output stream with a unique
//! label derived from its index and stream kind (`v3`, `a7`), so two
//! contributions can never collide at a merge point. Rendering produces the
//! `-filter_complex` text and verifies that no stream is consumed twice.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of an encoder input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId(usize);

impl InputId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Stream kind carried by a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn tag(self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// A stream consumed by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pad {
    /// A stream of an encoder input (`[2:a]`)
    Input(InputId, StreamKind),
    /// The output of another node
    Node(NodeId),
}

impl From<NodeId> for Pad {
    fn from(id: NodeId) -> Self {
        Pad::Node(id)
    }
}

/// Encoder input with per-input options.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphInput {
    pub path: PathBuf,
    pub options: Vec<String>,
}

/// A filter chain with its input pads and one labelled output.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: StreamKind,
    pub inputs: Vec<Pad>,
    pub filters: Vec<String>,
}

/// Arena of inputs and filter nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationGraph {
    inputs: Vec<GraphInput>,
    nodes: Vec<Node>,
}

impl OperationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encoder input. Each use of a file gets its own input.
    pub fn add_input<I, S>(&mut self, path: impl AsRef<Path>, options: I) -> InputId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(GraphInput {
            path: path.as_ref().to_path_buf(),
            options: options.into_iter().map(Into::into).collect(),
        });
        InputId(self.inputs.len() - 1)
    }

    /// Append a node and return its ID.
    pub fn add_node<I, S>(&mut self, kind: StreamKind, inputs: Vec<Pad>, filters: I) -> NodeId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes.push(Node {
            kind,
            inputs,
            filters: filters.into_iter().map(Into::into).collect(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn inputs(&self) -> &[GraphInput] {
        &self.inputs
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Output label of a node, without brackets.
    pub fn label(&self, id: NodeId) -> String {
        let tag = self
            .nodes
            .get(id.0)
            .map(|n| n.kind.tag())
            .unwrap_or("x");
        format!("{}{}", tag, id.0)
    }

    fn pad_label(&self, pad: Pad) -> String {
        match pad {
            Pad::Input(input, kind) => format!("{}:{}", input.0, kind.tag()),
            Pad::Node(id) => self.label(id),
        }
    }

    /// Render the `-filter_complex` text for the given output nodes.
    ///
    /// Only nodes reachable from `outputs` are emitted, in arena order.
    /// Fails if any stream (node output or input stream) would be consumed
    /// more than once, or if a pad references an unknown node or input.
    pub fn render(&self, outputs: &[NodeId]) -> MediaResult<String> {
        let reachable = self.reachable(outputs)?;

        let mut consumers: HashMap<Pad, usize> = HashMap::new();
        for id in outputs {
            *consumers.entry(Pad::Node(*id)).or_default() += 1;
        }

        let mut chains = Vec::with_capacity(reachable.len());
        for (index, node) in self.nodes.iter().enumerate() {
            if !reachable.contains(&index) {
                continue;
            }

            let mut chain = String::new();
            for pad in &node.inputs {
                *consumers.entry(*pad).or_default() += 1;
                chain.push('[');
                chain.push_str(&self.pad_label(*pad));
                chain.push(']');
            }

            if node.filters.is_empty() {
                chain.push_str(match node.kind {
                    StreamKind::Video => "null",
                    StreamKind::Audio => "anull",
                });
            } else {
                chain.push_str(&node.filters.join(","));
            }

            chain.push('[');
            chain.push_str(&self.label(NodeId(index)));
            chain.push(']');
            chains.push(chain);
        }

        if let Some((pad, _)) = consumers.iter().find(|(_, count)| **count > 1) {
            return Err(MediaError::graph(format!(
                "stream [{}] consumed more than once",
                self.pad_label(*pad)
            )));
        }

        Ok(chains.join(";"))
    }

    fn reachable(&self, outputs: &[NodeId]) -> MediaResult<HashSet<usize>> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = outputs.to_vec();

        while let Some(id) = stack.pop() {
            let node = self
                .nodes
                .get(id.0)
                .ok_or_else(|| MediaError::graph(format!("unknown node {}", id.0)))?;
            if !seen.insert(id.0) {
                continue;
            }
            for pad in &node.inputs {
                match *pad {
                    Pad::Node(input) => stack.push(input),
                    Pad::Input(input, _) if input.0 >= self.inputs.len() => {
                        return Err(MediaError::graph(format!("unknown input {}", input.0)));
                    }
                    Pad::Input(..) => {}
                }
            }
        }

        Ok(seen)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Format a number for a filter argument: at most six decimals, no
/// trailing zeros.
pub fn fmt_num(value: f64) -> String {
    let rounded = (value * 1_000_000.0).round() / 1_000_000.0;
    let mut s = format!("{:.6}", rounded);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_unique_per_node() {
        let mut graph = OperationGraph::new();
        let input = graph.add_input("a.mp4", Vec::<String>::new());
        let v = graph.add_node(StreamKind::Video, vec![Pad::Input(input, StreamKind::Video)], ["scale=640:360"]);
        let a = graph.add_node(StreamKind::Audio, vec![Pad::Input(input, StreamKind::Audio)], ["anull"]);

        assert_eq!(graph.label(v), "v0");
        assert_eq!(graph.label(a), "a1");
        assert_eq!(
            graph.render(&[v, a]).unwrap(),
            "[0:v]scale=640:360[v0];[0:a]anull[a1]"
        );
    }

    #[test]
    fn test_render_prunes_unreachable_nodes() {
        let mut graph = OperationGraph::new();
        let src = graph.add_node(StreamKind::Audio, vec![], ["anullsrc=r=48000:cl=stereo", "atrim=duration=1"]);
        let _orphan = graph.add_node(StreamKind::Audio, vec![], ["anullsrc"]);
        let out = graph.add_node(StreamKind::Audio, vec![src.into()], ["volume=0.5"]);

        let rendered = graph.render(&[out]).unwrap();
        assert_eq!(
            rendered,
            "anullsrc=r=48000:cl=stereo,atrim=duration=1[a0];[a0]volume=0.5[a2]"
        );
    }

    #[test]
    fn test_double_consumption_is_rejected() {
        let mut graph = OperationGraph::new();
        let src = graph.add_node(StreamKind::Video, vec![], ["color=c=black:s=64x64:d=1"]);
        let a = graph.add_node(StreamKind::Video, vec![src.into()], ["hflip"]);
        let b = graph.add_node(StreamKind::Video, vec![src.into()], ["vflip"]);
        let out = graph.add_node(StreamKind::Video, vec![a.into(), b.into()], ["hstack"]);

        let err = graph.render(&[out]).unwrap_err();
        assert!(err.to_string().contains("[v0]"));
    }

    #[test]
    fn test_input_stream_consumed_twice_is_rejected() {
        let mut graph = OperationGraph::new();
        let input = graph.add_input("a.mp4", Vec::<String>::new());
        let pad = Pad::Input(input, StreamKind::Audio);
        let a = graph.add_node(StreamKind::Audio, vec![pad], ["anull"]);
        let b = graph.add_node(StreamKind::Audio, vec![pad], ["anull"]);

        assert!(graph.render(&[a, b]).is_err());
    }

    #[test]
    fn test_output_also_used_as_input_is_rejected() {
        let mut graph = OperationGraph::new();
        let src = graph.add_node(StreamKind::Video, vec![], ["color"]);
        let next = graph.add_node(StreamKind::Video, vec![src.into()], ["null"]);
        assert!(graph.render(&[src, next]).is_err());
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(5.0), "5");
        assert_eq!(fmt_num(4.5), "4.5");
        assert_eq!(fmt_num(1.0 / 3.0), "0.333333");
        assert_eq!(fmt_num(-0.0000001), "0");
        assert_eq!(fmt_num(0.7), "0.7");
    }
}
