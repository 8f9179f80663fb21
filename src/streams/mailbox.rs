//! Single-slot hand-off between one capture thread and the batch collector.

use std::fmt;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

const LIVE_SCHEMES: [&str; 5] = ["rtsp://", "rtmp://", "http://", "https://", "udp://"];

/// How a [`Mailbox`] treats an item that has not been consumed yet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// `send` waits for the consumer, nothing is dropped. Used for files.
    #[default]
    Blocking,
    /// `send` replaces whatever is waiting. Used for live streams.
    Overwrite,
}

impl DeliveryMode {
    pub fn is_live_uri(uri: &str) -> bool {
        let uri = uri.trim().to_ascii_lowercase();
        LIVE_SCHEMES.iter().any(|s| uri.starts_with(s))
    }

    pub fn for_uri(uri: &str) -> Self {
        if Self::is_live_uri(uri) {
            DeliveryMode::Overwrite
        } else {
            DeliveryMode::Blocking
        }
    }
}

/// Returned by [`Mailbox::send`] once the consumer has abandoned the mailbox. Carries the item back.
pub struct SendError<T>(pub T);

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SendError(..)")
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sending on an abandoned mailbox")
    }
}

impl<T> std::error::Error for SendError<T> {}

enum Slot<T> {
    Empty,
    Item(T),
    EndOfStream,
}

impl<T> Slot<T> {
    fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

struct State<T> {
    slot: Slot<T>,
    abandoned: bool,
}

pub struct Mailbox<T> {
    mode: DeliveryMode,
    state: Mutex<State<T>>,
    filled: Condvar,
    emptied: Condvar,
}

impl<T> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("mode", &self.mode)
            .field("present", &self.is_present())
            .finish()
    }
}

impl<T> Mailbox<T> {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            mode,
            state: Mutex::new(State {
                slot: Slot::Empty,
                abandoned: false,
            }),
            filled: Condvar::new(),
            emptied: Condvar::new(),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Hands over `item`. In blocking mode this waits until the previous item was taken.
    pub fn send(&self, item: T) -> Result<(), SendError<T>> {
        match self.wait_for_room() {
            Some(mut state) => {
                Self::install(&mut state, Slot::Item(item));
                self.filled.notify_one();
                Ok(())
            }
            None => Err(SendError(item)),
        }
    }

    /// Marks the stream as finished. Goes through the same discipline as `send`, so in blocking
    /// mode the last frame is consumed first. Returns `false` if the mailbox was abandoned.
    pub fn send_end_of_stream(&self) -> bool {
        match self.wait_for_room() {
            Some(mut state) => {
                Self::install(&mut state, Slot::EndOfStream);
                self.filled.notify_one();
                true
            }
            None => false,
        }
    }

    /// Locks the state once the slot may be written, `None` if the mailbox was abandoned.
    fn wait_for_room(&self) -> Option<MutexGuard<'_, State<T>>> {
        let mut state = self.state.lock();
        if self.mode == DeliveryMode::Blocking {
            while !state.slot.is_empty() && !state.abandoned {
                self.emptied.wait(&mut state);
            }
        }
        if state.abandoned {
            return None;
        }
        Some(state)
    }

    fn install(state: &mut State<T>, next: Slot<T>) {
        // terminal marker stays, late items are discarded
        if !matches!(state.slot, Slot::EndOfStream) {
            state.slot = next;
        }
    }

    /// Takes the waiting item, blocking until one arrives. `None` means end of stream or abandoned;
    /// both are permanent.
    pub fn receive(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.abandoned {
                return None;
            }
            match std::mem::replace(&mut state.slot, Slot::Empty) {
                Slot::Item(item) => {
                    self.emptied.notify_one();
                    return Some(item);
                }
                Slot::EndOfStream => {
                    state.slot = Slot::EndOfStream;
                    return None;
                }
                Slot::Empty => self.filled.wait(&mut state),
            }
        }
    }

    /// True when `receive` would return without blocking.
    pub fn is_present(&self) -> bool {
        let state = self.state.lock();
        state.abandoned || !state.slot.is_empty()
    }

    pub fn is_abandoned(&self) -> bool {
        self.state.lock().abandoned
    }

    /// Wakes both sides for good: pending and future sends fail, receives return `None`.
    pub fn abandon(&self) {
        let mut state = self.state.lock();
        state.abandoned = true;
        self.filled.notify_all();
        self.emptied.notify_all();
    }

    /// Removes a leftover item without blocking, even after `abandon`.
    pub fn drain(&self) -> Option<T> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.slot, Slot::Empty) {
            Slot::Item(item) => {
                self.emptied.notify_one();
                Some(item)
            }
            other => {
                state.slot = other;
                None
            }
        }
    }
}
