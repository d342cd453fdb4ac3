//! Integration tests get their own binary, so they can install the tracker as
//! the global allocator. Everything lives in one test so that no other test
//! thread can reuse an address in the middle of a check.

use memleak::{LeakRecord, LeakTracker, Registry};

#[global_allocator]
static GLOBAL: LeakTracker = LeakTracker;

const HOOK_FILE: &str = "src/alloc/global.rs";

fn live(address: *const u8) -> Option<LeakRecord> {
    Registry::instance()
        .snapshot()
        .leaks
        .into_iter()
        .find(|leak| leak.address == address as usize)
}

#[test]
fn hooks_follow_every_allocation() {
    let registry = Registry::instance();
    assert!(!registry.is_torn_down());
    assert!(registry.size() > 0);

    // alloc + dealloc, attributed to the hook
    let boxed = Box::new([7u8; 64]);
    let address = boxed.as_ptr();
    let record = live(address).expect("box is recorded");
    assert!(record.file.ends_with(HOOK_FILE), "{record}");

    // call-site forwarding
    let boxed = memleak::track!(boxed);
    let line = line!() - 1;
    let record = live(address).expect("still recorded");
    assert_eq!((record.file.as_str(), record.line), (file!(), line));
    drop(boxed);
    assert_eq!(live(address), None);

    // alloc_zeroed
    let zeroed = vec![0u8; 4096];
    assert!(live(zeroed.as_ptr()).is_some());
    drop(zeroed);

    // realloc
    let mut grown: Vec<u64> = Vec::with_capacity(1);
    grown.push(1);
    let before = grown.as_ptr() as *const u8;
    grown.reserve(100_000);
    let after = grown.as_ptr() as *const u8;
    assert!(live(after).is_some());
    if before != after {
        assert_eq!(live(before), None);
    }
    drop(grown);
    assert_eq!(live(after), None);

    // other threads report into the same registry
    let leaked: Vec<usize> = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| s.spawn(move |_| Box::into_raw(Box::new(i as u64)) as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();
    for &address in &leaked {
        assert!(live(address as *const u8).is_some());
    }
    for &address in &leaked {
        // SAFETY: came from `Box::into_raw()` above, freed exactly once
        drop(unsafe { Box::from_raw(address as *mut u64) });
        assert_eq!(live(address as *const u8), None);
    }
}
