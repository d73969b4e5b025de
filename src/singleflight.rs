use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Admits at most one in-flight generation at a time.
///
/// `begin` hands out an RAII guard whose drop returns the coordinator to
/// idle, so a failed or panicked run can never leave it stuck busy. Each
/// busy period owns exactly one cancellation token; `cancel_active` fires it
/// and flips to idle immediately, abandoning the in-flight run without
/// waiting for it to settle. Busy periods are numbered so the abandoned
/// run's guard cannot clobber a flight started afterwards.
pub struct SingleFlight {
    inner: Mutex<Inner>,
}

struct Inner {
    active: Option<Flight>,
    next_id: u64,
}

struct Flight {
    id: u64,
    cancel: CancellationToken,
}

/// Outcome of a trigger.
pub enum Begin<'a> {
    /// The coordinator was idle; the caller now owns the flight.
    Started(FlightGuard<'a>),
    /// Another flight is in progress; nothing was started.
    Busy,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: None,
                next_id: 0,
            }),
        }
    }

    pub fn begin(&self) -> Begin<'_> {
        let mut inner = self.inner.lock();
        if inner.active.is_some() {
            return Begin::Busy;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let cancel = CancellationToken::new();
        inner.active = Some(Flight {
            id,
            cancel: cancel.clone(),
        });
        Begin::Started(FlightGuard {
            owner: self,
            id,
            cancel,
        })
    }

    /// Fire the active flight's cancellation token and return to idle at
    /// once. Returns false when nothing was in flight.
    pub fn cancel_active(&self) -> bool {
        let flight = self.inner.lock().active.take();
        match flight {
            Some(f) => {
                f.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    fn finish(&self, id: u64) {
        let mut inner = self.inner.lock();
        if inner.active.as_ref().is_some_and(|f| f.id == id) {
            inner.active = None;
        }
    }
}

pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    id: u64,
    cancel: CancellationToken,
}

impl FlightGuard<'_> {
    /// The cancellation token for this busy period.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.finish(self.id);
    }
}
