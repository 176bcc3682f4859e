use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle bits of a chunk. Bits are independent; a chunk can be visible
/// and waiting for a rebuild at the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    RebuildRequired,
    Visible,
    Empty,
    ChangedSinceLoad,
    Disposed,
}

impl Flag {
    pub const ALL: [Flag; 5] = [
        Flag::RebuildRequired,
        Flag::Visible,
        Flag::Empty,
        Flag::ChangedSinceLoad,
        Flag::Disposed,
    ];

    #[inline]
    pub const fn bit(self) -> u32 {
        match self {
            Flag::RebuildRequired => 1 << 0,
            Flag::Visible => 1 << 1,
            Flag::Empty => 1 << 2,
            Flag::ChangedSinceLoad => 1 << 3,
            Flag::Disposed => 1 << 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Flag::RebuildRequired => "REBUILD_REQUIRED",
            Flag::Visible => "VISIBLE",
            Flag::Empty => "EMPTY",
            Flag::ChangedSinceLoad => "CHANGED_SINCE_LOAD",
            Flag::Disposed => "DISPOSED",
        }
    }
}

const BITS_MASK: u64 = 0xffff_ffff;
const EPOCH_SHIFT: u32 = 32;

#[inline]
fn bits_of(word: u64) -> u32 {
    (word & BITS_MASK) as u32
}

#[inline]
fn epoch_of(word: u64) -> u32 {
    (word >> EPOCH_SHIFT) as u32
}

#[inline]
fn pack(epoch: u32, bits: u32) -> u64 {
    (u64::from(epoch) << EPOCH_SHIFT) | u64::from(bits)
}

/// Atomic flag word. The low half holds [`Flag`] bits, the high half a
/// rebuild epoch bumped by every [`ChunkFlags::mark_rebuild`]. All writes go
/// through compare-and-swap; no lock is ever taken.
///
/// Once `Disposed` is set the word is frozen: further writes are rejected and
/// logged.
pub struct ChunkFlags {
    word: AtomicU64,
}

impl ChunkFlags {
    /// Flags of a freshly created chunk: rebuild pending, `Empty` decided once.
    pub fn new_chunk(empty: bool) -> Self {
        let mut bits = Flag::RebuildRequired.bit();
        if empty {
            bits |= Flag::Empty.bit();
        }
        Self {
            word: AtomicU64::new(pack(0, bits)),
        }
    }

    #[inline]
    pub fn contains(&self, flag: Flag) -> bool {
        bits_of(self.word.load(Ordering::Acquire)) & flag.bit() != 0
    }

    #[inline]
    pub fn bits(&self) -> u32 {
        bits_of(self.word.load(Ordering::Acquire))
    }

    #[inline]
    pub fn rebuild_epoch(&self) -> u32 {
        epoch_of(self.word.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.contains(Flag::Disposed)
    }

    /// CAS loop applying `f` to the current bits. `f` returns `None` to leave
    /// the word untouched.
    fn update(&self, mut f: impl FnMut(u32, u32) -> Option<(u32, u32)>) -> bool {
        let mut cur = self.word.load(Ordering::Acquire);
        loop {
            let Some((epoch, bits)) = f(epoch_of(cur), bits_of(cur)) else {
                return false;
            };
            let next = pack(epoch, bits);
            if next == cur {
                return false;
            }
            match self
                .word
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    fn reject_if_disposed(bits: u32, op: &str, flag: Flag) -> bool {
        if bits & Flag::Disposed.bit() != 0 {
            log::warn!("{op} {} on a disposed chunk ignored", flag.label());
            return true;
        }
        false
    }

    /// Sets `flag`; returns whether the word changed. `Disposed` must go
    /// through [`ChunkFlags::mark_disposed`] and `RebuildRequired` through
    /// [`ChunkFlags::mark_rebuild`].
    pub fn set(&self, flag: Flag) -> bool {
        match flag {
            Flag::Disposed => return self.mark_disposed(),
            Flag::RebuildRequired => return self.mark_rebuild(),
            _ => {}
        }
        self.update(|epoch, bits| {
            if Self::reject_if_disposed(bits, "set", flag) {
                return None;
            }
            Some((epoch, bits | flag.bit()))
        })
    }

    /// Clears `flag`; returns whether the word changed. `Disposed` is terminal
    /// and cannot be cleared.
    pub fn clear(&self, flag: Flag) -> bool {
        if flag == Flag::Disposed {
            log::warn!("attempt to clear DISPOSED ignored");
            return false;
        }
        self.update(|epoch, bits| {
            if bits & flag.bit() == 0 {
                return None;
            }
            if Self::reject_if_disposed(bits, "clear", flag) {
                return None;
            }
            Some((epoch, bits & !flag.bit()))
        })
    }

    /// Sets `Visible` to `visible`.
    pub fn set_visible(&self, visible: bool) -> bool {
        if visible {
            self.set(Flag::Visible)
        } else {
            self.clear(Flag::Visible)
        }
    }

    /// Requests a rebuild and bumps the epoch, so a rebuild pass that started
    /// earlier cannot clear the request on completion.
    pub fn mark_rebuild(&self) -> bool {
        self.update(|epoch, bits| {
            if Self::reject_if_disposed(bits, "set", Flag::RebuildRequired) {
                return None;
            }
            Some((epoch.wrapping_add(1), bits | Flag::RebuildRequired.bit()))
        })
    }

    /// Clears `RebuildRequired` only if no new request arrived since `epoch`
    /// was read. Returns whether the flag was cleared.
    pub fn finish_rebuild(&self, epoch: u32) -> bool {
        self.update(|cur_epoch, bits| {
            if cur_epoch != epoch || bits & Flag::Disposed.bit() != 0 {
                return None;
            }
            Some((cur_epoch, bits & !Flag::RebuildRequired.bit()))
        })
    }

    /// Sets `Disposed`. Returns false, with a warning, when the chunk was
    /// already disposed.
    pub fn mark_disposed(&self) -> bool {
        let changed = self.update(|epoch, bits| {
            if bits & Flag::Disposed.bit() != 0 {
                return None;
            }
            Some((epoch, (bits | Flag::Disposed.bit()) & !Flag::Visible.bit()))
        });
        if !changed {
            log::warn!("chunk disposed twice");
        }
        changed
    }
}

impl fmt::Debug for ChunkFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = self.bits();
        let mut list = f.debug_set();
        for flag in Flag::ALL {
            if bits & flag.bit() != 0 {
                list.entry(&format_args!("{}", flag.label()));
            }
        }
        list.finish()
    }
}
