/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The buffer-and-locker / unlocker bracket.
//!
//! This pair is added to a pipeline wherever downstream processors need
//! thread-safe access to the host's key-space. Taking the host's global
//! lock mid-pipeline risks a lock-hierarchy inversion: the pipeline already
//! holds the index-spec read lock, while every other subsystem takes the
//! global lock first. So the buffer stage first drains its upstream into an
//! arena, then:
//!
//! 1. tries the global lock — if that succeeds nobody holds it and there is
//!    no deadlock to have;
//! 2. otherwise releases the spec read lock (letting the holder progress),
//!    blocks on the global lock, and — if the index changed across the
//!    gap — re-validates every buffered record before yielding it.
//!
//! No processor downstream of the buffer touches the index again; the
//! buffered data is all there is. The [`Unlocker`] releases the global lock
//! when the stream is drained.

use search_config::TimeoutPolicy;

use crate::util::BlockBuffer;
use crate::{Context, Error, ResultProcessor, ResultProcessorType, SearchResult};

/// How many results one arena block holds.
const BUFFER_BLOCK_SIZE: usize = 100;

enum Phase {
    Buffering,
    Yielding { validate: bool },
}

/// How the upstream stream ended while buffering.
enum BufferEnd {
    Eof,
    /// Deadline fired under the Return policy.
    TimedOut,
}

pub struct BufferAndLocker {
    buffer: BlockBuffer<SearchResult>,
    phase: Phase,
}

impl BufferAndLocker {
    pub fn new() -> Self {
        Self::with_block_size(BUFFER_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            buffer: BlockBuffer::new(block_size),
            phase: Phase::Buffering,
        }
    }

    /// Drain upstream into the arena. `Ok` says how the stream ended; an
    /// empty buffer propagates that ending verbatim instead of locking.
    fn buffer_docs(&mut self, cx: &mut Context<'_>) -> Result<BufferEnd, Error> {
        let mut scratch = SearchResult::new();
        loop {
            match cx.upstream_next(&mut scratch) {
                Ok(Some(())) => {
                    self.buffer.push(std::mem::take(&mut scratch));
                }
                Ok(None) => return Ok(BufferEnd::Eof),
                Err(Error::TimedOut)
                    if cx.state().timeout_policy == TimeoutPolicy::Return =>
                {
                    // buffered records are kept and yielded
                    return Ok(BufferEnd::TimedOut);
                }
                Err(Error::TimedOut) => {
                    // Fail policy: the partial buffer is worthless
                    self.buffer.clear();
                    return Err(Error::TimedOut);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Take the global lock, deciding whether the yield phase must
    /// re-validate. See the module docs for the deadlock-avoidance order.
    fn lock_host(&mut self, cx: &mut Context<'_>, spec_version: u64) -> bool {
        let sctx = cx.state().sctx.clone();
        let host_lock = sctx.keyspace().lock();

        let mut validate = false;
        if !host_lock.try_lock() {
            let state = cx.state();
            if state.holds_spec_lock {
                // release the spec lock so its holder cannot deadlock us
                sctx.spec().lock().unlock_read();
                state.holds_spec_lock = false;
            }

            host_lock.lock();

            // if the spec changed since we dropped its lock, every
            // buffered result needs a second look
            if sctx.spec().version() != spec_version {
                validate = true;
            }
        }

        cx.state().holds_host_lock = true;
        tracing::debug!(
            buffered = self.buffer.len(),
            validate,
            "buffer acquired the host lock"
        );
        validate
    }

    fn yield_next(&mut self, validate: bool, res: &mut SearchResult) -> Result<Option<()>, Error> {
        while let Some(buffered) = self.buffer.take_next() {
            if validate && !buffered.dmd().is_some_and(|dmd| !dmd.is_deleted()) {
                // invalidated across the lock gap; drop returns the borrow
                continue;
            }
            *res = buffered;
            return Ok(Some(()));
        }
        Ok(None)
    }
}

impl Default for BufferAndLocker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultProcessor for BufferAndLocker {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::BufferAndLocker
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        loop {
            match self.phase {
                Phase::Yielding { validate } => return self.yield_next(validate, res),
                Phase::Buffering => {
                    // remember the index version so we can tell whether
                    // updates landed while we buffer
                    let spec_version = cx.state().sctx.spec().version();

                    let end = self.buffer_docs(&mut cx)?;
                    if self.buffer.is_empty() {
                        // nothing buffered: report the ending without ever
                        // locking
                        return match end {
                            BufferEnd::Eof => Ok(None),
                            BufferEnd::TimedOut => Err(Error::TimedOut),
                        };
                    }

                    let validate = self.lock_host(&mut cx, spec_version);
                    self.phase = Phase::Yielding { validate };
                }
            }
        }
    }
}

/// Releases the host's global lock once no downstream processor needs the
/// key-space anymore. Always placed downstream of every lock-needing
/// consumer of a [`BufferAndLocker`].
pub struct Unlocker;

impl Unlocker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Unlocker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultProcessor for Unlocker {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Unlocker
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        let status = cx.upstream_next(res);
        if matches!(status, Ok(None)) {
            let state = cx.state();
            if state.holds_host_lock {
                state.sctx.keyspace().lock().unlock();
                state.holds_host_lock = false;
                tracing::debug!("unlocker released the host lock");
            }
        }
        status
    }
}
