use coffer::prelude::*;

#[test]
fn iteration_keeps_insertion_order_across_rehashes() {
    let mut map = HashMap::with_capacity_range(4, 0);
    let mut expected = Vec::new();
    for i in 0..200 {
        let key = format!("key-{i}");
        map.put(key.clone(), i);
        expected.push(key);
    }
    // Growth happened along the way.
    assert!(map.capacity() >= 256);
    let got: Vec<String> = map.keys().cloned().collect();
    assert_eq!(got, expected);

    // Deletions keep the relative order of survivors.
    for i in (0..200).step_by(2) {
        assert!(map.remove(&format!("key-{i}")).is_some());
    }
    let got: Vec<String> = map.keys().cloned().collect();
    let survivors: Vec<String> = expected
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, k)| k.clone())
        .collect();
    assert_eq!(got, survivors);
}

#[test]
fn capacity_policy_is_power_of_two() {
    let mut map = HashMap::new();
    assert_eq!(map.capacity(), 0);
    map.put(1u32, ());
    let min = map.capacity();
    assert!(min.is_power_of_two());

    for i in 0..(min as u32) {
        map.put(i, ());
    }
    assert_eq!(map.capacity(), min * 2);

    for i in 0..(min as u32) {
        map.remove(&i);
    }
    assert!(map.capacity().is_power_of_two());
    assert!(map.capacity() <= min);
}

#[test]
fn multimap_and_value_matched_removal() {
    let mut map = HashMap::new();
    map.add("dup".to_string(), "first".to_string());
    map.add("dup".to_string(), "second".to_string());
    map.put("other".to_string(), "x".to_string());

    assert_eq!(map.get_values("dup").len(), 2);
    assert!(map.remove_key_value("dup", &"second".to_string()));
    assert_eq!(map.get_values("dup"), vec![&"first".to_string()]);
    assert_eq!(map.remove_items("dup"), 1);
    assert_eq!(map.len(), 1);
}

#[test]
fn clear_resets_then_reuses() {
    let mut map = HashMap::new();
    for i in 0..100 {
        map.put(i, i);
    }
    map.clear();
    assert_eq!(map.len(), 0);
    assert_eq!(map.capacity(), 0);
    map.put(5, 50);
    assert_eq!(map.get(&5), Some(&50));
}

#[test]
fn clone_preserves_everything_observable() {
    let mut map = HashMap::new();
    for i in 0..30 {
        map.add(i % 7, i);
    }
    let copy = map.clone();
    assert_eq!(copy.len(), map.len());
    assert_eq!(copy.capacity(), map.capacity());
    let ours: Vec<(i32, i32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    let theirs: Vec<(i32, i32)> = copy.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(ours, theirs);
}

#[test]
fn hash_set_insertion_order() {
    let mut set = HashSet::new();
    for word in ["gamma", "alpha", "beta", "alpha"] {
        set.insert(word.to_string());
    }
    assert_eq!(set.len(), 3);
    let got: Vec<String> = set.iter().cloned().collect();
    assert_eq!(got, vec!["gamma", "alpha", "beta"]);
}

#[test]
fn borrowed_key_lookups() {
    let mut map: HashMap<String, i32> = HashMap::new();
    map.put("alpha".to_string(), 1);
    assert_eq!(map.get("alpha"), Some(&1));
    assert!(map.contains_key("alpha"));
    assert_eq!(map.remove("alpha"), Some(1));
}
