mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use stategraph::checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer};
use stategraph::engine::{Engine, ExecutionConfig, ExecutionStatus};
use stategraph::graph::{TopologyBuilder, TopologyError};
use stategraph::state::State;

#[tokio::test]
async fn in_memory_store_round_trips() {
    let store = InMemoryCheckpointer::new();
    let state = State::builder().with_value("k", json!("v")).build();

    let first = Checkpoint::capture("c1", "thread", &state, "node_a", 1);
    let second = Checkpoint::capture("c2", "thread", &state, "node_b", 2);
    store.save(first.clone()).await.unwrap();
    store.save(second.clone()).await.unwrap();

    assert_eq!(store.load("thread", "c1").await.unwrap(), Some(first));
    assert_eq!(
        store.load_latest("thread").await.unwrap(),
        Some(second.clone())
    );
    let listed = store.list("thread").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].step_id, 1);
    assert_eq!(listed[1].step_id, 2);

    store.delete("thread", "c1").await.unwrap();
    assert_eq!(store.load("thread", "c1").await.unwrap(), None);
    // Deleting again is a no-op.
    store.delete("thread", "c1").await.unwrap();
    assert_eq!(store.list("thread").await.unwrap(), vec![second]);

    assert!(store.list("other-thread").await.unwrap().is_empty());
    assert_eq!(store.load_latest("other-thread").await.unwrap(), None);
}

#[tokio::test]
async fn checkpoint_serde_round_trips() {
    let state = State::builder()
        .with_value("n", json!(7))
        .with_metadata("origin", json!("test"))
        .build();
    let checkpoint = Checkpoint::capture("c1", "thread", &state, "node", 3);

    let encoded = serde_json::to_string(&checkpoint).unwrap();
    let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, checkpoint);

    let restored = decoded.restore_state();
    assert_eq!(restored.get("n"), Some(json!(7)));
    assert_eq!(restored.get_metadata("origin"), Some(json!("test")));
}

#[tokio::test]
async fn engine_persists_one_checkpoint_per_step() -> Result<(), TopologyError> {
    let topology = TopologyBuilder::new("ckpt", "checkpointed chain")
        .add_node("a", "a", SetValueNode::new("a_done", json!(true)))?
        .add_node("b", "b", SetValueNode::new("b_done", json!(true)))?
        .add_edge("a", "b")?
        .with_start_node("a")?
        .add_end_node("b")?
        .with_config(
            ExecutionConfig::default()
                .with_checkpoints(true)
                .with_thread_id("session-1"),
        )
        .build()?;

    let store = Arc::new(InMemoryCheckpointer::new());
    let engine = Engine::new(Arc::new(topology)).with_checkpointer(store.clone());

    let outcome = engine
        .execute(CancellationToken::new(), &State::new())
        .await
        .unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Completed);

    let checkpoints = store.list("session-1").await.unwrap();
    assert_eq!(checkpoints.len(), 2);
    assert_eq!(checkpoints[0].node_id, "a");
    assert_eq!(checkpoints[0].step_id, 1);
    assert_eq!(checkpoints[1].node_id, "b");
    assert_eq!(checkpoints[1].step_id, 2);

    // The first checkpoint captures the state before b ran.
    let mid = checkpoints[0].restore_state();
    assert_eq!(mid.get("a_done"), Some(json!(true)));
    assert_eq!(mid.get("b_done"), None);
    Ok(())
}

#[tokio::test]
async fn run_resumes_from_a_restored_checkpoint() -> Result<(), TopologyError> {
    let topology = TopologyBuilder::new("resume", "resumable")
        .add_node("inc", "increment", CountingNode)?
        .with_start_node("inc")?
        .add_end_node("inc")?
        .with_config(
            ExecutionConfig::default()
                .with_checkpoints(true)
                .with_thread_id("resume-1"),
        )
        .build()?;

    let store = Arc::new(InMemoryCheckpointer::new());
    let engine = Engine::new(Arc::new(topology)).with_checkpointer(store.clone());

    engine
        .execute(CancellationToken::new(), &State::new())
        .await
        .unwrap();

    let latest = store
        .load_latest("resume-1")
        .await
        .unwrap()
        .expect("checkpoint written");
    let resumed = latest.restore_state();
    assert_eq!(resumed.get("count"), Some(json!(1)));

    let outcome = engine
        .execute(CancellationToken::new(), &resumed)
        .await
        .unwrap();
    assert_eq!(outcome.state.get("count"), Some(json!(2)));
    Ok(())
}

#[tokio::test]
async fn failing_store_never_aborts_the_run() -> Result<(), TopologyError> {
    struct BrokenStore;

    #[async_trait::async_trait]
    impl Checkpointer for BrokenStore {
        async fn save(
            &self,
            _checkpoint: Checkpoint,
        ) -> Result<(), stategraph::checkpoint::CheckpointerError> {
            Err(stategraph::checkpoint::CheckpointerError::Storage {
                message: "disk full".into(),
            })
        }

        async fn load(
            &self,
            _thread_id: &str,
            _checkpoint_id: &str,
        ) -> Result<Option<Checkpoint>, stategraph::checkpoint::CheckpointerError> {
            Ok(None)
        }

        async fn load_latest(
            &self,
            _thread_id: &str,
        ) -> Result<Option<Checkpoint>, stategraph::checkpoint::CheckpointerError> {
            Ok(None)
        }

        async fn list(
            &self,
            _thread_id: &str,
        ) -> Result<Vec<Checkpoint>, stategraph::checkpoint::CheckpointerError> {
            Ok(Vec::new())
        }

        async fn delete(
            &self,
            _thread_id: &str,
            _checkpoint_id: &str,
        ) -> Result<(), stategraph::checkpoint::CheckpointerError> {
            Ok(())
        }
    }

    let topology = TopologyBuilder::new("broken", "broken store")
        .add_node("a", "a", SetValueNode::new("done", json!(true)))?
        .with_start_node("a")?
        .add_end_node("a")?
        .with_config(ExecutionConfig::default().with_checkpoints(true))
        .build()?;

    let engine = Engine::new(Arc::new(topology)).with_checkpointer(Arc::new(BrokenStore));
    let outcome = engine
        .execute(CancellationToken::new(), &State::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Completed);
    assert_eq!(outcome.state.get("done"), Some(json!(true)));
    Ok(())
}
