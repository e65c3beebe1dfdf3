use coffer::prelude::*;

#[test]
fn add_builds_a_multimap() {
    let mut map: OrdMap<String, i32> = OrdMap::new();
    map.add("a".to_string(), 1);
    map.add("a".to_string(), 2);
    map.add("b".to_string(), 3);

    assert_eq!(map.len(), 3);
    assert_eq!(map.get_values("a"), vec![&1, &2]);
    assert_eq!(map.get_values("b"), vec![&3]);
    assert!(map.get_values("c").is_empty());
}

#[test]
fn put_and_add_interact() {
    let mut map = OrdMap::new();
    assert_eq!(map.put("k", 1), None);
    map.add("k", 2);
    assert_eq!(map.get_values("k").len(), 2);

    // put overwrites one binding, the other survives.
    assert!(map.put("k", 10).is_some());
    let mut values: Vec<i32> = map.get_values("k").into_iter().copied().collect();
    values.sort();
    assert!(values.contains(&10));
    assert_eq!(values.len(), 2);
}

#[test]
fn take_values_empties_the_key() {
    let mut map = OrdMap::new();
    for i in 0..4 {
        map.add(7, i);
    }
    map.put(8, 99);
    assert_eq!(map.take_values(&7), vec![0, 1, 2, 3]);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&8), Some(&99));
}

#[test]
fn iteration_is_key_ordered() {
    let mut map = OrdMap::new();
    for key in [5, 1, 9, 3, 7] {
        map.put(key, key * 10);
    }
    let keys: Vec<i32> = map.keys().copied().collect();
    assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    assert_eq!(map.first(), Some((&1, &10)));
    assert_eq!(map.last(), Some((&9, &90)));
}

#[test]
fn shared_map_handles_alias_one_container() {
    let shared = Shared::new(OrdMap::new());
    let alias = shared.clone();
    alias.with(|map| {
        map.put("x".to_string(), 1);
        map.add("x".to_string(), 2);
    });
    let values = shared.with(|map| map.get_values("x").into_iter().copied().collect::<Vec<_>>());
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn ordered_set_multiset() {
    let mut set: OrdSet<&str> = OrdSet::new();
    assert!(set.insert("b"));
    assert!(set.insert("a"));
    assert!(!set.insert("a"));
    set.insert_dup("a");
    assert_eq!(set.to_vec(), vec!["a", "a", "b"]);
}
