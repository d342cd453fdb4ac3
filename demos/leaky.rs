//! Leaks a few allocations on purpose. Run with
//!
//! ```plaintext
//! RUST_LOG=memleak=debug cargo run --example leaky
//! MEMLEAK_REPORT=json cargo run --example leaky
//! ```

use memleak::{LeakTracker, Registry};

#[global_allocator]
static GLOBAL: LeakTracker = LeakTracker;

fn main() {
    env_logger::init();

    let freed = vec![1u32, 2, 3];
    let forgotten = String::from("never freed");
    std::mem::forget(forgotten);
    let _ = Box::leak(Box::new([0u8; 128]));

    drop(freed);
    println!("{} live allocations", Registry::instance().size());
}
