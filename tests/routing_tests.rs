/// Routing tests
///
/// Key placement, weights, key tags and ring stability of ShardRouter
/// Run with: cargo test --test routing_tests
use memshard::{
    FnShard, Hashing, Result, RouterConfig, ShardError, ShardInfo, ShardRouter,
    VIRTUAL_NODES_PER_WEIGHT,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const KEYS: usize = 100_000;

type Router = ShardRouter<String, Node>;

/// Shard whose resource is its own label
#[derive(Debug, Clone)]
struct Node {
    label: String,
    weight: u32,
    named: bool,
}

impl Node {
    fn unnamed(label: &str) -> Self {
        Self {
            label: label.to_string(),
            weight: 1,
            named: false,
        }
    }

    fn named(label: &str) -> Self {
        Self {
            named: true,
            ..Self::unnamed(label)
        }
    }

    fn weighted(label: &str, weight: u32) -> Self {
        Self {
            weight,
            ..Self::unnamed(label)
        }
    }
}

impl ShardInfo<String> for Node {
    fn weight(&self) -> u32 {
        self.weight
    }

    fn name(&self) -> Option<&str> {
        self.named.then_some(self.label.as_str())
    }

    fn create_resource(&self) -> Result<String> {
        Ok(format!("resource-{}", self.label))
    }
}

fn shares(router: &Router, keys: usize) -> Vec<f64> {
    let mut counts = vec![0usize; router.shard_count()];
    for i in 0..keys {
        counts[router.shard_index(&format!("key:{}", i)).unwrap()] += 1;
    }
    counts.iter().map(|c| *c as f64 / keys as f64).collect()
}

#[test]
fn test_equal_shards_share_keys_evenly() {
    let router = Router::new(vec![
        Node::unnamed("a"),
        Node::unnamed("b"),
        Node::unnamed("c"),
    ])
    .unwrap();

    assert_eq!(router.virtual_node_count(), 3 * VIRTUAL_NODES_PER_WEIGHT as usize);
    for (index, share) in shares(&router, KEYS).into_iter().enumerate() {
        assert!(
            (share - 1.0 / 3.0).abs() <= 0.03,
            "shard {} owns {:.4} of the keys",
            index,
            share
        );
    }
}

#[test]
fn test_md5_shares_keys_evenly() {
    let config = RouterConfig::new().hash_algorithm(Hashing::Md5);
    let router = Router::with_config(
        vec![Node::unnamed("a"), Node::unnamed("b"), Node::unnamed("c")],
        config,
    )
    .unwrap();

    for share in shares(&router, KEYS) {
        assert!((share - 1.0 / 3.0).abs() <= 0.03, "share {:.4}", share);
    }
}

#[test]
fn test_double_weight_gets_double_share() {
    let router = Router::new(vec![
        Node::weighted("a", 1),
        Node::weighted("b", 2),
        Node::weighted("c", 1),
    ])
    .unwrap();

    assert_eq!(router.virtual_node_count(), 4 * VIRTUAL_NODES_PER_WEIGHT as usize);
    let shares = shares(&router, KEYS);
    let ratio = shares[1] / ((shares[0] + shares[2]) / 2.0);
    assert!(
        (1.7..=2.3).contains(&ratio),
        "doubled shard owns {:.2}x the others",
        ratio
    );
}

#[test]
fn test_tagged_keys_colocate() {
    let router = Router::new(vec![
        Node::unnamed("a"),
        Node::unnamed("b"),
        Node::unnamed("c"),
    ])
    .unwrap();

    assert_eq!(router.key_tag("{user1000}.following"), "user1000");
    let owner = router.shard_index("user1000").unwrap();
    for key in ["{user1000}.following", "{user1000}.followers", "x{user1000}y"] {
        assert_eq!(router.shard_index(key).unwrap(), owner, "key {}", key);
    }

    assert_eq!(
        router.shard_info("user:{123}:name").unwrap().label,
        router.shard_info("user:{123}:age").unwrap().label
    );

    // only the first tag counts
    assert_eq!(
        router.shard_index("{user1000}{other}").unwrap(),
        owner
    );
}

#[test]
fn test_keys_without_tag_hash_whole() {
    let router = Router::with_config(
        vec![Node::unnamed("a"), Node::unnamed("b")],
        RouterConfig::new().no_tag_pattern(),
    )
    .unwrap();

    assert_eq!(router.tag_pattern(), None);
    assert_eq!(router.key_tag("{user1000}.following"), "{user1000}.following");
    assert_eq!(router.key_tag("{}"), "{}");
}

#[test]
fn test_custom_tag_pattern() {
    let router = Router::with_config(
        vec![Node::unnamed("a"), Node::unnamed("b"), Node::unnamed("c")],
        RouterConfig::new().tag_pattern(r"^(\w+):"),
    )
    .unwrap();

    assert_eq!(router.key_tag("orders:17"), "orders");
    assert_eq!(
        router.shard_index("orders:17").unwrap(),
        router.shard_index("orders:99").unwrap()
    );
}

#[test]
fn test_invalid_tag_pattern_rejected() {
    let result = Router::with_config(
        vec![Node::unnamed("a")],
        RouterConfig::new().tag_pattern(r"\{.+?\}"),
    );
    assert!(matches!(result, Err(ShardError::PatternError(_))));
}

#[test]
fn test_routing_is_reproducible() {
    let build = || {
        Router::new(vec![
            Node::named("a"),
            Node::unnamed("b"),
            Node::weighted("c", 3),
        ])
        .unwrap()
    };
    let first = build();
    let second = build();

    assert_eq!(first.ring(), second.ring());
    for i in 0..5_000 {
        let key = format!("session:{}", i);
        assert_eq!(
            first.shard_index(&key).unwrap(),
            second.shard_index(&key).unwrap()
        );
    }
}

#[test]
fn test_named_shards_survive_reordering() {
    let original = Router::new(vec![Node::named("a"), Node::named("b"), Node::named("c")])
        .unwrap();
    let reordered = Router::new(vec![Node::named("c"), Node::named("a"), Node::named("b")])
        .unwrap();

    for i in 0..5_000 {
        let key = format!("key:{}", i);
        assert_eq!(
            original.shard_info(&key).unwrap().label,
            reordered.shard_info(&key).unwrap().label
        );
    }
}

#[test]
fn test_adding_a_shard_only_moves_keys_to_it() {
    for named in [false, true] {
        let make = |label: &str| {
            if named {
                Node::named(label)
            } else {
                Node::unnamed(label)
            }
        };
        let before = Router::new(vec![make("a"), make("b"), make("c")]).unwrap();
        let after = Router::new(vec![make("a"), make("b"), make("c"), make("d")]).unwrap();

        let mut moved = 0;
        for i in 0..20_000 {
            let key = format!("key:{}", i);
            let old = before.shard_info(&key).unwrap().label.clone();
            let new = after.shard_info(&key).unwrap().label.clone();
            if old != new {
                assert_eq!(new, "d", "key {} moved between old shards", key);
                moved += 1;
            }
        }
        let fraction = moved as f64 / 20_000.0;
        assert!(
            (0.15..0.35).contains(&fraction),
            "{:.3} of keys moved",
            fraction
        );
    }
}

#[test]
fn test_resource_matches_descriptor() {
    let router = Router::new(vec![
        Node::unnamed("a"),
        Node::unnamed("b"),
        Node::unnamed("c"),
    ])
    .unwrap();

    for i in 0..1_000 {
        let key = format!("item:{}", i);
        let info = router.shard_info(&key).unwrap();
        let resource = router.shard(&key).unwrap();
        assert_eq!(resource, &format!("resource-{}", info.label));

        let index = router.shard_index(&key).unwrap();
        assert!(std::ptr::eq(resource, &router.all_shards()[index]));
    }
}

#[test]
fn test_byte_and_str_keys_agree() {
    let router = Router::new(vec![Node::unnamed("a"), Node::unnamed("b")]).unwrap();
    for key in ["plain", "{tag}rest", "", "ключ"] {
        assert_eq!(
            router.shard_index(key).unwrap(),
            router.shard_index_for_bytes(key.as_bytes()).unwrap()
        );
    }

    // non UTF-8 keys are routable
    assert!(router.shard_for_bytes(&[0xff, 0xfe, 0x00]).is_ok());
}

#[test]
fn test_each_resource_created_once() {
    let created = Arc::new(AtomicUsize::new(0));
    let shards: Vec<_> = (0..4)
        .map(|i| {
            let created = Arc::clone(&created);
            FnShard::new(move || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            })
        })
        .collect();

    let router = ShardRouter::new(shards).unwrap();
    for i in 0..1_000 {
        router.shard(&format!("key:{}", i)).unwrap();
    }
    assert_eq!(created.load(Ordering::SeqCst), 4);
    assert_eq!(router.all_shards(), &[0, 1, 2, 3]);
}

#[test]
fn test_all_shard_info_lists_each_shard_once() {
    let router = Router::new(vec![
        Node::unnamed("a"),
        Node::weighted("b", 3),
        Node::unnamed("c"),
    ])
    .unwrap();

    let mut labels: Vec<_> = router
        .all_shard_info()
        .into_iter()
        .map(|node| node.label.clone())
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["a", "b", "c"]);
}

#[test]
fn test_single_shard_owns_everything() {
    let router = Router::new(vec![Node::unnamed("only")]).unwrap();
    for i in 0..1_000 {
        assert_eq!(router.shard_index(&format!("k{}", i)).unwrap(), 0);
    }
}

#[test]
fn test_empty_router() {
    let router = Router::new(Vec::new()).unwrap();
    assert!(router.all_shard_info().is_empty());
    assert!(router.all_shards().is_empty());
    assert!(matches!(router.shard("key"), Err(ShardError::EmptyRingLookup)));
    assert!(matches!(router.shard_info("key"), Err(ShardError::EmptyRingLookup)));

    let required = Router::with_config(
        Vec::new(),
        RouterConfig::new().require_shards(true),
    );
    assert!(matches!(required, Err(ShardError::ConstructionFailure(_))));
}

#[test]
fn test_zero_weight_rejected() {
    let result = Router::new(vec![Node::unnamed("a"), Node::weighted("b", 0)]);
    assert!(matches!(result, Err(ShardError::ConstructionFailure(_))));
}

#[test]
fn test_weight_beyond_ring_capacity_rejected() {
    let largest = u32::MAX / VIRTUAL_NODES_PER_WEIGHT;
    let result = Router::new(vec![Node::unnamed("a"), Node::weighted("b", largest + 1)]);
    match result {
        Err(ShardError::ConstructionFailure(message)) => assert!(message.contains("#1")),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_failing_resource_aborts_construction() {
    fn up() -> Result<u8> {
        Ok(1)
    }
    fn down() -> Result<u8> {
        Err(ShardError::ConnectionError("refused".into()))
    }

    let shards = vec![
        FnShard::new(up as fn() -> Result<u8>),
        FnShard::new(down as fn() -> Result<u8>).with_name("down"),
    ];
    match ShardRouter::new(shards) {
        Err(ShardError::ConstructionFailure(message)) => assert!(message.contains("'down'")),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}
