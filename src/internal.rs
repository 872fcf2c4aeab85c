mod history;
mod mailbox;
mod maintenance;
mod stats_book;
mod topic_registry;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) use history::History;
pub(crate) use mailbox::{Mailbox, Popped};
pub(crate) use maintenance::{Tick, run_periodic};
pub(crate) use stats_book::StatsBook;
pub(crate) use topic_registry::TopicRegistry;

// Broker state stays usable after a panic inside a critical section; every
// structure guarded here is valid between individual mutations.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}
