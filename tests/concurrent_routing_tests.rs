/// Concurrent routing tests
///
/// A built router is shared between threads and tasks without locking
/// Run with: cargo test --test concurrent_routing_tests
use memshard::{NodePool, NodeRegistry, NodeShardInfo, ShardRouter, ShardedClient};
use std::sync::Arc;
use std::thread;
use tokio::sync::Barrier;

#[test]
fn test_threads_agree_on_placement() {
    let shards: Vec<_> = (0..5)
        .map(|i| NodeShardInfo::new("10.0.0.1", 6379 + i).name(&format!("node-{}", i)))
        .collect();
    let router: Arc<ShardRouter<NodePool, NodeShardInfo>> =
        Arc::new(ShardRouter::new(shards).unwrap());

    let expected: Vec<usize> = (0..2_000)
        .map(|i| router.shard_index(&format!("key:{}", i)).unwrap())
        .collect();
    let expected = Arc::new(expected);

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let router = Arc::clone(&router);
            let expected = Arc::clone(&expected);
            thread::spawn(move || {
                for i in 0..2_000 {
                    let index = router.shard_index(&format!("key:{}", i)).unwrap();
                    assert_eq!(index, expected[i], "thread {} disagrees on key:{}", thread_id, i);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_write_disjoint_keys() {
    let ports = [7701, 7702, 7703];
    let nodes: Vec<_> = ports
        .iter()
        .map(|port| NodeRegistry::global().start_node("127.0.0.1", *port, None).unwrap())
        .collect();
    let shards = ports
        .iter()
        .map(|port| NodeShardInfo::new("127.0.0.1", *port).max_connections(4))
        .collect();
    let client = Arc::new(ShardedClient::new(shards).unwrap());

    let num_tasks = 10;
    let writes_per_task = 50;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let mut handles = vec![];

    for task_id in 0..num_tasks {
        let client = Arc::clone(&client);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for i in 0..writes_per_task {
                let key = format!("{{task:{}}}:{}", task_id, i);
                client.set(&key, &i.to_string()).await.unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let mut total = 0;
    for node in &nodes {
        total += node.key_count(0).await.unwrap();
        assert!(node.connection_count() <= 4);
    }
    assert_eq!(total, num_tasks * writes_per_task);

    // every task's keys share a tag, so they sit on one node
    for task_id in 0..num_tasks {
        let owner = client.shard_info(&format!("task:{}", task_id)).unwrap().port;
        let node = NodeRegistry::global().get("127.0.0.1", owner).unwrap().unwrap();
        for i in 0..writes_per_task {
            let key = format!("{{task:{}}}:{}", task_id, i);
            assert_eq!(client.get(&key).await.unwrap(), Some(i.to_string()));
            assert!(node.key_count(0).await.unwrap() >= writes_per_task);
        }
    }

    for (address, stats) in client.stats().await {
        assert_eq!(stats.active, 0, "{} still has borrowed connections", address);
    }
}
