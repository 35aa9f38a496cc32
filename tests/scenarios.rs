//! End-to-end scenarios exercising each data structure the way a command
//! layer would drive it in a single request.

use keyspace::{Dict, End, EngineConfig, QuickList, ScoreBound, SetEngine, SortedSetEngine};

#[test]
fn list_push_head_then_index_and_length() {
    let mut list = QuickList::new(32, 0);
    list.push(End::Head, b"a");
    list.push(End::Head, b"b");
    list.push(End::Head, b"c");

    assert_eq!(list.get(0).map(|e| entry_bytes(e)), Some(b"c".to_vec()));
    assert_eq!(list.get(-1).map(|e| entry_bytes(e)), Some(b"a".to_vec()));
    assert_eq!(list.len(), 3);
    assert_eq!(list.node_count(), 1);
}

#[test]
fn large_list_splits_nodes_and_shrinks_on_delete_range() {
    let mut list = QuickList::new(32, 0);
    for i in 0..500 {
        list.push(End::Tail, format!("hello{i}").as_bytes());
    }
    assert_eq!(list.len(), 500);
    assert_eq!(list.node_count(), 16);

    let removed = list.delete_range(200, 100);
    assert_eq!(removed, 100);
    assert_eq!(list.len(), 400);
    assert_eq!(list.node_count(), 14);
}

fn entry_bytes(entry: keyspace::Entry) -> Vec<u8> {
    match entry {
        keyspace::Entry::Bytes(b) => b,
        keyspace::Entry::Int(i) => i.to_string().into_bytes(),
    }
}

#[test]
fn set_promotes_to_hashtable_on_first_non_integer_member() {
    let cfg = EngineConfig::default();
    let mut set = SetEngine::new();
    set.add(b"5", &cfg);
    set.add(b"6", &cfg);
    set.add(b"4", &cfg);
    assert_eq!(set.encoding(), keyspace::SetEncoding::Intset);

    set.add(b"hello", &cfg);
    assert_eq!(set.encoding(), keyspace::SetEncoding::Hashtable);
    assert_eq!(set.len(), 4);
    assert!(set.contains(b"4"));
    assert!(!set.contains(b"xyz"));
}

#[test]
fn dict_rehashes_a_thousand_keys_to_completion() {
    let mut dict: Dict<String, i64> = Dict::new();
    for i in 0..1000 {
        dict.replace(format!("k{i}"), i);
    }

    let advanced = dict.rehash_for(std::time::Duration::from_millis(100));
    assert!(advanced > 0 || !dict.is_rehashing());
    // Drive any remaining rehash work to completion deterministically.
    while dict.is_rehashing() {
        dict.rehash_for(std::time::Duration::from_millis(100));
    }

    assert!(!dict.is_rehashing());
    assert_eq!(dict.len(), 1000);
    for i in 0..1000 {
        assert_eq!(dict.find(&format!("k{i}")), Some(&i));
    }
}

#[test]
fn sorted_set_packed_encoding_ranks_ties_by_member_lex() {
    let cfg = EngineConfig::default();
    let mut zset = SortedSetEngine::new();
    zset.add("a", 1.0, &cfg);
    zset.add("b", 2.0, &cfg);
    zset.add("c", 1.0, &cfg);

    assert_eq!(zset.encoding(), keyspace::SortedSetEncoding::Listpack);
    assert_eq!(zset.rank("a"), Some(0));
    assert_eq!(zset.rank("c"), Some(1));

    let range = zset.range_by_score(ScoreBound::Value(1.0, true), ScoreBound::Value(2.0, true), false, None);
    assert_eq!(
        range,
        vec![
            ("a".to_string(), 1.0),
            ("c".to_string(), 1.0),
            ("b".to_string(), 2.0),
        ]
    );
}

#[test]
fn intset_promotes_width_and_never_demotes_on_removal() {
    let mut set = keyspace::IntArraySet::new();
    assert!(set.add(32));
    assert_eq!(set.width(), keyspace::Width::Bits16);

    assert!(set.add(65535));
    assert_eq!(set.width(), keyspace::Width::Bits32);

    assert!(set.add(4294967295));
    assert_eq!(set.width(), keyspace::Width::Bits64);

    assert!(set.contains(32));
    assert!(set.contains(65535));
    assert!(set.contains(4294967295));
    assert_eq!(set.len(), 3);

    assert!(set.remove(32));
    assert_eq!(set.width(), keyspace::Width::Bits64);
    assert_eq!(set.len(), 2);
}
