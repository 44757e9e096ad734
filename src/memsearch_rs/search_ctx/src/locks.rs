/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Lock primitives with explicit acquire/release.
//!
//! Guard-based locks cannot express the pipeline's locking protocol: the
//! buffer-and-locker stage releases the spec read lock mid-pipeline and the
//! unlocker stage releases the host lock several processors downstream of
//! where it was taken. Both primitives are built on a mutex-protected state
//! word and a condvar, and are not re-entrant.

use parking_lot::{Condvar, Mutex};

/// The host's global lock ("the GIL"). Serializes access to the key-space
/// with the host's single-threaded command loop.
#[derive(Debug, Default)]
pub struct HostLock {
    locked: Mutex<bool>,
    cv: Condvar,
}

impl HostLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire without blocking. Returns `false` if the lock is held.
    pub fn try_lock(&self) -> bool {
        let mut locked = self.locked.lock();
        if *locked {
            return false;
        }
        *locked = true;
        true
    }

    /// Block until the lock is acquired.
    pub fn lock(&self) {
        let mut locked = self.locked.lock();
        while *locked {
            self.cv.wait(&mut locked);
        }
        *locked = true;
    }

    pub fn unlock(&self) {
        let mut locked = self.locked.lock();
        debug_assert!(*locked, "unlock of a host lock that is not held");
        *locked = false;
        drop(locked);
        self.cv.notify_one();
    }

    /// Whether the lock is currently held by anyone.
    pub fn is_locked(&self) -> bool {
        *self.locked.lock()
    }
}

/// The index-spec read/write lock.
///
/// A pipeline holds it in read mode for the duration of a pull; index
/// mutations take it in write mode. The buffer-and-locker stage drops the
/// read side before blocking on the [`HostLock`] so a writer queued behind
/// us can make progress.
#[derive(Debug, Default)]
pub struct SpecLock {
    /// Number of readers, or -1 while a writer holds the lock.
    state: Mutex<i64>,
    cv: Condvar,
}

impl SpecLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_read(&self) {
        let mut state = self.state.lock();
        while *state < 0 {
            self.cv.wait(&mut state);
        }
        *state += 1;
    }

    pub fn unlock_read(&self) {
        let mut state = self.state.lock();
        debug_assert!(*state > 0, "read-unlock of a spec lock with no readers");
        *state -= 1;
        let none_left = *state == 0;
        drop(state);
        if none_left {
            self.cv.notify_all();
        }
    }

    pub fn lock_write(&self) {
        let mut state = self.state.lock();
        while *state != 0 {
            self.cv.wait(&mut state);
        }
        *state = -1;
    }

    pub fn unlock_write(&self) {
        let mut state = self.state.lock();
        debug_assert!(*state == -1, "write-unlock of a spec lock not write-held");
        *state = 0;
        drop(state);
        self.cv.notify_all();
    }
}
