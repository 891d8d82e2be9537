//! Small named graph shapes reused across several integration test files.

use petalflow::graph::{Graph, GraphBuilder};
use petalflow::node::{Node, NodeId};
use std::sync::Arc;

use super::testing::{BestScoreMerge, JsonMerge, ScoreSource, SetVar};

/// `s -> a -> m`, `s -> b -> m`, `m -> e`, with `m` a JSON-merge barrier.
pub fn diamond_with_json_merge() -> Graph {
    GraphBuilder::new("diamond")
        .add_node(SetVar::new("s", "from_start", serde_json::json!(true)))
        .unwrap()
        .add_node(SetVar::new("a", "from_a", serde_json::json!("value-a")))
        .unwrap()
        .add_node(SetVar::new("b", "from_b", serde_json::json!("value-b")))
        .unwrap()
        .add_node(Arc::new(JsonMerge { id: NodeId::new("m") }) as Arc<dyn Node>)
        .unwrap()
        .add_node(SetVar::processed("e"))
        .unwrap()
        .add_edge("s", "a")
        .unwrap()
        .add_edge("s", "b")
        .unwrap()
        .add_edge("a", "m")
        .unwrap()
        .add_edge("b", "m")
        .unwrap()
        .add_edge("m", "e")
        .unwrap()
        .set_entry("s")
        .unwrap()
        .build()
        .unwrap()
}

/// Same shape, but `m` keeps whichever branch wrote the higher `score`.
pub fn diamond_with_best_score_merge(score_a: f64, score_b: f64) -> Graph {
    GraphBuilder::new("diamond-score")
        .add_node(SetVar::processed("s"))
        .unwrap()
        .add_node(Arc::new(ScoreSource { id: NodeId::new("a"), score: score_a, source: "a" }) as Arc<dyn Node>)
        .unwrap()
        .add_node(Arc::new(ScoreSource { id: NodeId::new("b"), score: score_b, source: "b" }) as Arc<dyn Node>)
        .unwrap()
        .add_node(Arc::new(BestScoreMerge { id: NodeId::new("m") }) as Arc<dyn Node>)
        .unwrap()
        .add_edge("s", "a")
        .unwrap()
        .add_edge("s", "b")
        .unwrap()
        .add_edge("a", "m")
        .unwrap()
        .add_edge("b", "m")
        .unwrap()
        .set_entry("s")
        .unwrap()
        .build()
        .unwrap()
}
