//! Property tests for graph acyclicity and claim exclusivity.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tandem::domain::{DetectionMethod, FeatureId, FeatureStatus, NewFeature, WorkerId};
use tandem::ingest::EdgeCandidate;
use tandem::storage::in_memory::new_in_memory_store;
use tandem::{Error, Scheduler, SchedulerSettings};

const FEATURES: u64 = 8;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

async fn open(priorities: &[u32]) -> Arc<Scheduler> {
    let scheduler = Scheduler::open(new_in_memory_store(), SchedulerSettings::default())
        .await
        .unwrap();
    let batch = priorities
        .iter()
        .zip(1u64..)
        .map(|(&priority, id)| NewFeature::new(id, format!("f{id}"), priority))
        .collect();
    scheduler.load_features(batch).await.unwrap();
    Arc::new(scheduler)
}

/// Kahn's algorithm: true if every node can be ordered.
fn is_acyclic(nodes: u64, edges: &[(FeatureId, FeatureId)]) -> bool {
    let mut indegree: HashMap<FeatureId, usize> = (1..=nodes).map(|n| (FeatureId(n), 0)).collect();
    for (from, _) in edges {
        *indegree.entry(*from).or_default() += 1;
    }
    let mut ready: Vec<FeatureId> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut seen = 0;
    while let Some(done) = ready.pop() {
        seen += 1;
        for (from, to) in edges {
            if *to == done {
                let d = indegree.entry(*from).or_default();
                *d -= 1;
                if *d == 0 {
                    ready.push(*from);
                }
            }
        }
    }
    seen == indegree.len()
}

fn edge_strategy() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec((1..=FEATURES, 1..=FEATURES), 0..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_added_edges_never_form_a_cycle(edges in edge_strategy()) {
        runtime().block_on(async {
            let s = open(&[1; FEATURES as usize]).await;

            for (from, to) in edges {
                match s.add_dependency(FeatureId(from), FeatureId(to)).await {
                    Ok(_) => {}
                    Err(Error::CycleDetected { .. }) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            let export = s.get_graph().await.unwrap();
            let pairs: Vec<_> = export.edges.iter().map(|e| e.pair()).collect();
            assert!(is_acyclic(FEATURES, &pairs), "cycle in {pairs:?}");
        });
    }

    #[test]
    fn prop_ingested_edges_never_form_a_cycle(
        edges in prop::collection::vec((1..=FEATURES, 1..=FEATURES, 0.0f64..=1.0), 0..24)
    ) {
        runtime().block_on(async {
            let s = open(&[1; FEATURES as usize]).await;
            let candidates: Vec<EdgeCandidate> = edges
                .iter()
                .map(|&(from, to, c)| {
                    EdgeCandidate::new(FeatureId(from), FeatureId(to), c, DetectionMethod::Keyword)
                })
                .collect();

            let report = s.ingest(&candidates).await.unwrap();

            let export = s.get_graph().await.unwrap();
            let pairs: Vec<_> = export.edges.iter().map(|e| e.pair()).collect();
            assert!(is_acyclic(FEATURES, &pairs), "cycle in {pairs:?}");
            assert_eq!(report.inserted, pairs.len());
        });
    }

    #[test]
    fn prop_concurrent_workers_finish_everything_in_dependency_order(
        priorities in prop::collection::vec(0u32..4, FEATURES as usize),
        edges in edge_strategy(),
        workers in 1usize..6,
    ) {
        runtime().block_on(async {
            let s = open(&priorities).await;
            for (from, to) in edges {
                let _ = s.add_dependency(FeatureId(from), FeatureId(to)).await;
            }

            let handles = (0..workers).map(|w| {
                let s = Arc::clone(&s);
                tokio::spawn(async move {
                    let worker = WorkerId::new(format!("w{w}"));
                    let mut claimed = Vec::new();
                    loop {
                        match s.claim_next(&worker).await.unwrap() {
                            Some(feature) => {
                                for dep in s.dependencies_of(feature.id).await.unwrap() {
                                    let status = s.feature(dep).await.unwrap().status;
                                    assert_eq!(status, FeatureStatus::Passing);
                                }
                                claimed.push(feature.id);
                                s.mark_passing(feature.id).await.unwrap();
                            }
                            None => {
                                let p = s.progress().await.unwrap();
                                if p.passing == p.total {
                                    break;
                                }
                                tokio::task::yield_now().await;
                            }
                        }
                    }
                    claimed
                })
            });

            let mut all = Vec::new();
            for handle in futures::future::join_all(handles).await {
                all.extend(handle.unwrap());
            }

            let unique: HashSet<FeatureId> = all.iter().copied().collect();
            assert_eq!(unique.len(), all.len(), "a feature was claimed twice");
            assert_eq!(all.len(), FEATURES as usize);
        });
    }
}
