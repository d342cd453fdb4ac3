//! The process-wide owner of the [`Ledger`].
//!
//! The instance lives in static storage and is built on first use, which is
//! normally the very first allocation the process makes. Building it must not
//! go back through the global allocator, so the ledger takes its nodes from
//! [`Malloc`] and the static is a [`LazyLock`] (no allocation, unlike the
//! `std` one). An `atexit()` handler tears it down and prints the leaks.

use std::{
    io::{self, Write},
    sync::{Mutex, MutexGuard, PoisonError},
};

use super::{
    busy::BusyGuard,
    ledger::Ledger,
    manual::{Malloc, RawAlloc},
};
use crate::{
    config::{Config, ReportFormat},
    lazy_lock::LazyLock,
    report::{LeakReport, SUMMARY},
    util::{hint::cold, print::RawStderr},
};

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::install);

/// Tracks every live allocation reported to it, see the module docs.
///
/// Hooks fire from any thread, so the ledger sits behind a [`Mutex`] (the
/// `std` one doesn't allocate).
pub struct Registry<A = Malloc>
where
    A: RawAlloc,
{
    /// `None` once torn down
    ledger: Mutex<Option<Ledger<A>>>,
    config: Config,
}

impl Registry<Malloc> {
    /// The process-wide registry, built on first call
    pub fn instance() -> &'static Registry {
        if let Some(registry) = LazyLock::get(&REGISTRY) {
            return registry;
        }
        cold(|| {
            // Whatever the initializer allocates must not come back here
            let _busy = BusyGuard::hold();
            REGISTRY.initialize()
        })
    }

    /// The process-wide registry, if anything has built it yet
    pub fn try_instance() -> Option<&'static Registry> {
        LazyLock::get(&REGISTRY)
    }

    fn install() -> Self {
        let registry = Self::new(Malloc, Config::from_env());
        // SAFETY: `teardown_at_exit` is a plain `extern "C" fn()` that never
        //         unwinds.
        if unsafe { libc::atexit(teardown_at_exit) } != 0 {
            log::warn!("could not register the exit handler, leaks will not be reported");
        }
        log::debug!("leak tracking enabled, report format {:?}", registry.config.format);
        registry
    }
}

extern "C" fn teardown_at_exit() {
    if let Some(registry) = Registry::try_instance() {
        registry.teardown();
    }
}

impl<A> Registry<A>
where
    A: RawAlloc,
{
    /// A standalone registry, with its own ledger backed by `alloc`. It
    /// reports on drop instead of at exit.
    pub fn new(alloc: A, config: Config) -> Self {
        Self {
            ledger: Mutex::new(Some(Ledger::new_in(alloc))),
            config,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn alloc(&self, file: &'static str, line: u32, address: *const u8) {
        self.with_ledger(|ledger| ledger.insert(file, line, address));
    }

    /// Untracked (or already released) addresses are fine, and ignored
    pub fn release(&self, address: *const u8) {
        // Log while still marked busy, the logger may allocate
        self.with_ledger(|ledger| {
            if !ledger.remove(address) {
                log::trace!("release of untracked address {address:p}");
            }
        });
    }

    /// Attribute the live allocation at `address` to `file:line`
    pub fn retag(&self, file: &'static str, line: u32, address: *const u8) {
        self.with_ledger(|ledger| ledger.retag(address, file, line));
    }

    /// Number of live allocations (`0` once torn down)
    pub fn size(&self) -> usize {
        self.with_ledger(|ledger| ledger.size()).unwrap_or(0)
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().is_none()
    }

    /// Owned copy of every live allocation
    pub fn snapshot(&self) -> LeakReport {
        self.with_ledger(|ledger| LeakReport::from_ledger(ledger))
            .unwrap_or_default()
    }

    /// Write the leak report in the configured format. Writes nothing if
    /// there are no leaks.
    pub fn report<W>(&self, sink: W) -> io::Result<()>
    where
        W: Write,
    {
        self.with_ledger(|ledger| write_report(ledger, self.config.format, sink))
            .unwrap_or(Ok(()))
    }

    /// Report leaks to stderr and release the ledger. Every later call is a
    /// no-op, so this is safe to call more than once.
    pub fn teardown(&self) {
        // Nobody is left to hear about a failed write to stderr
        let _ = self.teardown_into(RawStderr);
    }

    /// [`Registry::teardown()`], reporting into `sink`
    pub fn teardown_into<W>(&self, sink: W) -> io::Result<()>
    where
        W: Write,
    {
        let _busy = BusyGuard::hold();
        let Some(ledger) = self.lock().take() else {
            return Ok(());
        };
        log::debug!("leak tracking torn down, {} live allocations", ledger.size());
        // `ledger` drops here, whatever the sink did
        write_report(&ledger, self.config.format, sink)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Ledger<A>>> {
        // A panic can't leave the chain half-linked, so poison is meaningless
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the ledger, unless torn down. The thread counts as busy for
    /// the whole call.
    fn with_ledger<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Ledger<A>) -> R,
    {
        let _busy = BusyGuard::hold();
        self.lock().as_mut().map(f)
    }
}

impl<A> Drop for Registry<A>
where
    A: RawAlloc,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

fn write_report<A, W>(ledger: &Ledger<A>, format: ReportFormat, mut sink: W) -> io::Result<()>
where
    A: RawAlloc,
    W: Write,
{
    if ledger.is_empty() {
        return Ok(());
    }
    match format {
        ReportFormat::Text => {
            writeln!(sink, "{SUMMARY}{}", ledger.size())?;
            ledger.dump(sink)
        }
        ReportFormat::Json => LeakReport::from_ledger(ledger).write_json(sink),
        ReportFormat::Off => Ok(()),
    }
}
