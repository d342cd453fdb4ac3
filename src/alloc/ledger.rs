//! A simple, non-sorted linked list that stores the address, file name and
//! line number of every live allocation.
//!
//! The list can't use `Vec` or `Box` or anything else that goes through the
//! global allocator, since it is what the global allocator reports into. All
//! nodes come from a [`RawAlloc`] instead, and are linked by hand:
//!
//! ```plaintext
//! head -> newest -> ... -> oldest -> tail
//! ```
//!
//! `head` and `tail` are sentinels. They carry no data and live exactly as
//! long as the [`Ledger`].

use std::{
    fmt,
    io::{self, Write},
    iter::FusedIterator,
    marker::PhantomData,
    ptr::{self, NonNull},
};

use super::manual::{xalloc, xfree, Malloc, Raw, RawAlloc};

/// One live allocation.
pub struct Record {
    address: *const u8,
    file: &'static str,
    line: u32,
    next: *mut Record,
}

impl Record {
    const fn sentinel(next: *mut Record) -> Self {
        Self {
            address: ptr::null(),
            file: "",
            line: 0,
            next,
        }
    }

    /// The tracked address. Only ever used as a key, never dereferenced.
    pub fn address(&self) -> *const u8 {
        self.address
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr:{:p} file:{} line:{}", self.address, self.file, self.line)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("address", &self.address)
            .field("file", &self.file)
            .field("line", &self.line)
            .finish()
    }
}

/// Every live allocation, keyed by address. See the module docs.
pub struct Ledger<A = Malloc>
where
    A: RawAlloc,
{
    head: Raw<Record>,
    tail: Raw<Record>,
    size: usize,
    alloc: A,
}

// SAFETY: The ledger uniquely owns every node it links, so moving it to
//         another thread moves all of them along with it.
unsafe impl<A> Send for Ledger<A> where A: RawAlloc + Send {}

impl Ledger<Malloc> {
    pub fn new() -> Self {
        Self::new_in(Malloc)
    }
}

impl Default for Ledger<Malloc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Ledger<A>
where
    A: RawAlloc,
{
    /// An empty ledger (just the two sentinels), taking its nodes from `alloc`
    pub fn new_in(alloc: A) -> Self {
        let tail = xalloc(&alloc, Record::sentinel(ptr::null_mut()));
        let head = xalloc(&alloc, Record::sentinel(tail.as_ptr()));
        Self {
            head,
            tail,
            size: 0,
            alloc,
        }
    }

    /// Record a new live allocation, right after `head`
    pub fn insert(&mut self, file: &'static str, line: u32, address: *const u8) {
        let head = self.head.as_ptr();
        // SAFETY: `head` is live for as long as `self` is
        let next = unsafe { (*head).next };
        let record = xalloc(
            &self.alloc,
            Record {
                address,
                file,
                line,
                next,
            },
        );
        // SAFETY: as above, and we hold `&mut self` so nobody else is walking
        //         the chain
        unsafe { (*head).next = record.into_raw().as_ptr() };
        self.size += 1;
    }

    /// Forget the first record of `address`. Unknown addresses are ignored.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, address: *const u8) -> bool {
        let Some((before, anchor)) = self.find(address) else {
            return false;
        };
        // SAFETY:
        //   - `before` and `anchor` are both live nodes of this chain, and
        //     `anchor` is never a sentinel
        //   - after the splice nothing links to `anchor` any more, so we are
        //     its unique owner
        unsafe {
            (*before).next = (*anchor).next;
            xfree(&self.alloc, Raw::new(NonNull::new_unchecked(anchor)));
        }
        self.size -= 1;
        true
    }

    /// Move the first record of `address` over to a new call site.
    ///
    /// Returns whether a record was found.
    pub fn retag(&mut self, address: *const u8, file: &'static str, line: u32) -> bool {
        let Some((_, anchor)) = self.find(address) else {
            return false;
        };
        // SAFETY: `anchor` is a live, non-sentinel node and we hold `&mut self`
        unsafe {
            (*anchor).file = file;
            (*anchor).line = line;
        }
        true
    }

    /// Release every record, keeping the (empty) ledger usable
    pub fn clear(&mut self) {
        let head = self.head.as_ptr();
        let tail = self.tail.as_ptr();
        // SAFETY: Every node between the sentinels was allocated by
        //         `insert()` from `self.alloc` and is owned by this ledger.
        unsafe {
            let mut anchor = (*head).next;
            while anchor != tail {
                let next = (*anchor).next;
                xfree(&self.alloc, Raw::new(NonNull::new_unchecked(anchor)));
                anchor = next;
            }
            (*head).next = tail;
        }
        self.size = 0;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Walk the live records, newest first
    pub fn iter(&self) -> Records<'_> {
        // SAFETY: `head` is live for as long as `self` is
        let first = unsafe { (*self.head.as_ptr()).next };
        Records {
            anchor: first,
            tail: self.tail.as_ptr(),
            _ledger: PhantomData,
        }
    }

    /// Write one `addr:<address> file:<file> line:<line>` line per record
    pub fn dump<W>(&self, mut sink: W) -> io::Result<()>
    where
        W: Write,
    {
        for record in self.iter() {
            writeln!(sink, "{record}")?;
        }
        Ok(())
    }

    /// Returns `(before, anchor)` where `anchor` is the first record for
    /// `address`
    fn find(&self, address: *const u8) -> Option<(*mut Record, *mut Record)> {
        let tail = self.tail.as_ptr();
        let mut before = self.head.as_ptr();
        // SAFETY: The chain always runs from `head` to `tail` through nodes
        //         owned by this ledger.
        unsafe {
            let mut anchor = (*before).next;
            while anchor != tail {
                if (*anchor).address == address {
                    return Some((before, anchor));
                }
                before = anchor;
                anchor = (*anchor).next;
            }
        }
        None
    }
}

impl<A> Drop for Ledger<A>
where
    A: RawAlloc,
{
    fn drop(&mut self) {
        self.clear();
        let head = self.head.as_ptr();
        let tail = self.tail.as_ptr();
        // SAFETY: Both sentinels came from `xalloc()` on `self.alloc` in
        //         `new_in()`, and are never handed out.
        unsafe {
            xfree(&self.alloc, Raw::new(NonNull::new_unchecked(head)));
            xfree(&self.alloc, Raw::new(NonNull::new_unchecked(tail)));
        }
    }
}

impl<A> fmt::Debug for Ledger<A>
where
    A: RawAlloc,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, A> IntoIterator for &'a Ledger<A>
where
    A: RawAlloc,
{
    type Item = &'a Record;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`Ledger`], see [`Ledger::iter()`]
pub struct Records<'a> {
    anchor: *const Record,
    tail: *const Record,
    _ledger: PhantomData<&'a Record>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        if self.anchor == self.tail {
            return None;
        }
        // SAFETY: We borrow the ledger for `'a`, so it can't be mutated and
        //         every node up to `tail` stays live.
        let record = unsafe { &*self.anchor };
        self.anchor = record.next;
        Some(record)
    }
}

impl FusedIterator for Records<'_> {}
