//! Every hooked allocation is reported against the allocator's own source
//! line. `track!` moves a block over to the line that wraps it.

use memleak::{track, LeakTracker, Registry};

#[global_allocator]
static GLOBAL: LeakTracker = LeakTracker;

struct Node {
    next: Option<Box<Node>>,
}

fn main() {
    env_logger::init();

    let tail = track!(Box::new(Node { next: None }));
    let head = track!(Box::new(Node { next: Some(tail) }));
    // A cycle-free list, leaked as a whole
    let _ = Box::leak(head);

    let names = track!(vec![String::from("alice"), String::from("bob")]);
    std::mem::forget(names);

    for leak in Registry::instance().snapshot().leaks {
        if leak.file == file!() {
            println!("{leak}");
        }
    }
}
