//! Property tests for the generational asset pool.
//!
//! A handle must resolve exactly while the asset it was issued for is loaded,
//! no matter how slots are reused afterwards.

use mip_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum PoolOp {
    Insert(u32),
    Unload(usize),
    Clear,
}

fn pool_op_strategy() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        4 => any::<u32>().prop_map(PoolOp::Insert),
        3 => (0..64usize).prop_map(PoolOp::Unload),
        1 => Just(PoolOp::Clear),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn handles_resolve_only_while_loaded(
        ops in prop::collection::vec(pool_op_strategy(), 1..100)
    ) {
        let mut pool: AssetPool<u32> = AssetPool::new();
        // Every handle ever issued, with its value while it should be live.
        let mut issued: Vec<(Handle<u32>, Option<u32>)> = Vec::new();

        for op in ops {
            match op {
                PoolOp::Insert(v) => {
                    let handle = pool.insert("", v);
                    prop_assert!(handle.is_valid());
                    issued.push((handle, Some(v)));
                }
                PoolOp::Unload(idx) => {
                    if !issued.is_empty() {
                        let slot = idx % issued.len();
                        let (handle, expected) = issued[slot];
                        prop_assert_eq!(pool.unload(handle), expected);
                        issued[slot].1 = None;
                    }
                }
                PoolOp::Clear => {
                    pool.clear();
                    for entry in issued.iter_mut() {
                        entry.1 = None;
                    }
                }
            }

            let live = issued.iter().filter(|(_, v)| v.is_some()).count();
            prop_assert_eq!(pool.len(), live);
            for &(handle, expected) in &issued {
                prop_assert_eq!(pool.get(handle).copied(), expected);
            }
        }
    }

    #[test]
    fn key_cache_never_returns_dead_handles(
        keys in prop::collection::vec("[a-d]", 1..40),
        unload_every in 1..5usize,
    ) {
        let mut pool: AssetPool<String> = AssetPool::new();

        for (i, key) in keys.iter().enumerate() {
            let handle = match pool.find(key) {
                Some(handle) => handle,
                None => pool.insert(key, key.clone()),
            };
            prop_assert_eq!(pool.get(handle), Some(key));

            if i % unload_every == 0 {
                pool.unload(handle);
                prop_assert_eq!(pool.find(key), None);
            }
        }
    }
}
