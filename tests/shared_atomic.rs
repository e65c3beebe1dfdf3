use std::sync::Arc;
use std::thread;

use coffer::prelude::*;

#[test]
fn shared_container_across_threads() {
    let shared = Shared::new(OrdMap::new());
    let mut handles = Vec::new();
    for worker in 0..4 {
        let shared = shared.clone();
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                shared.with(|map| {
                    map.put(format!("{worker}-{i}"), i);
                });
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(shared.with(|map| map.len()), 400);
}

#[test]
fn atomic_cell_of_large_value() {
    let cell = Arc::new(Atomic::new([0u8; 256]));
    let writers: Vec<_> = (0..4u8)
        .map(|worker| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for _ in 0..100 {
                    cell.set([worker + 1; 256]);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    // Whatever was stored last, it is one whole write, never a mix.
    let value = cell.get();
    assert!(value.iter().all(|b| *b == value[0]));
    assert!((1..=4).contains(&value[0]));
}

#[test]
fn counter_coordinates_workers() {
    let pending = Arc::new(AtomicCounter::new(8));
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pending = Arc::clone(&pending);
            thread::spawn(move || {
                thread::yield_now();
                pending.decrease();
            })
        })
        .collect();
    pending.wait_zero();
    assert_eq!(pending.get(), 0);
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn atomic_shared_pointer_swap() {
    let initial = Shared::new(vec![1]);
    let cell = Atomic::new(initial.clone());

    let replacement = Shared::new(vec![2]);
    assert!(cell.compare_exchange(&initial, replacement.clone()).is_ok());
    assert!(cell.get().ptr_eq(&replacement));

    // A stale expectation is rejected and hands the candidate back.
    let stale = cell.compare_exchange(&initial, Shared::new(vec![3]));
    assert!(stale.is_err());
}

#[test]
fn variant_payloads_are_shared_across_threads() {
    let list = Variant::new_list();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let list = list.clone();
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                list.add_element(Variant::from(i));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(list.element_count(), 200);
}

#[test]
fn promise_handoff_between_threads() {
    let promise = Arc::new(Promise::new());
    let variant = Variant::Promise(Arc::clone(&promise));
    assert!(variant.is_promise());

    let waiter = {
        let promise = Arc::clone(&promise);
        thread::spawn(move || promise.wait().get_i32(0))
    };
    promise.resolve(Variant::from(99));
    assert_eq!(waiter.join().unwrap(), 99);
}
