//! Request queue adapter
//!
//! Bridges submitters to the scheduler core and the core to a block device.
//! Inbound submissions are validated, identity-tagged, and offered to the
//! pending set, with back-merge detection against the sector-order neighbor.
//! A single pump task pulls dispatched requests and runs the device transfer,
//! completing every submitter's channel.
//!
//! # Architecture
//!
//! ```text
//! submit_read / submit_write
//!       │ validate, allocate id
//!       ├─> LookScheduler::insert (+ former/notify_merge on adjacency)
//!       ├─> payload table: QueuedIo with one segment per submission
//!       └─> Notify ──> run() pump
//!                        │ dispatch under the queue lock
//!                        └─> BlockDevice transfer, one oneshot per segment
//! ```
//!
//! All scheduler and payload state sits behind one `parking_lot::Mutex`;
//! device transfers run outside it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, trace, warn};

use crate::device::{BlockDevice, DeviceError, DeviceResult};
use crate::sched::{
    next_request_id, LookScheduler, Request, RequestId, SchedStats, SchedStatsSnapshot, Sector,
};

/// Upper bound on a merged transfer, in sectors
pub const MAX_MERGE_SECTORS: u64 = 1024;

/// Direction of a queued transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoKind {
    Read,
    Write,
}

/// One original submission inside a queued transfer.
enum IoSegment {
    Read {
        sectors: u64,
        tx: oneshot::Sender<DeviceResult<Vec<u8>>>,
    },
    Write {
        data: Vec<u8>,
        tx: oneshot::Sender<DeviceResult<usize>>,
    },
}

impl IoSegment {
    fn fail(self, err: DeviceError) {
        match self {
            IoSegment::Read { tx, .. } => {
                let _ = tx.send(Err(err));
            }
            IoSegment::Write { tx, .. } => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

/// One scheduler entry: a contiguous device transfer assembled from one or
/// more submissions.
struct QueuedIo {
    kind: IoKind,
    start: Sector,
    sectors: u64,
    segments: Vec<IoSegment>,
}

/// Scheduler core plus payload table, guarded together.
struct Inner {
    sched: LookScheduler,
    payloads: HashMap<RequestId, QueuedIo>,
}

/// Async request queue over one scheduler instance and one device.
pub struct RequestQueue<D: BlockDevice> {
    device: Arc<D>,
    inner: Mutex<Inner>,
    /// Shared with the scheduler; readable without the queue lock
    stats: Arc<SchedStats>,
    /// Wakes the pump when work arrives
    work: Notify,
    shutdown: AtomicBool,
}

impl<D: BlockDevice + 'static> RequestQueue<D> {
    pub fn new(device: Arc<D>) -> Arc<Self> {
        let sched = LookScheduler::new();
        let stats = sched.stats();
        Arc::new(Self {
            device,
            inner: Mutex::new(Inner {
                sched,
                payloads: HashMap::new(),
            }),
            stats,
            work: Notify::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Queue a read of `sectors` sectors at `start`. The receiver resolves
    /// once the device transfer finishes.
    pub fn submit_read(
        &self,
        start: Sector,
        sectors: u64,
    ) -> DeviceResult<oneshot::Receiver<DeviceResult<Vec<u8>>>> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(DeviceError::Shutdown);
        }
        self.check_span(start, sectors)?;
        let (tx, rx) = oneshot::channel();
        self.enqueue(IoKind::Read, start, sectors, IoSegment::Read { sectors, tx });
        Ok(rx)
    }

    /// Queue a write of `data` at `start`. The receiver resolves with the
    /// bytes written once the device transfer finishes.
    pub fn submit_write(
        &self,
        start: Sector,
        data: Vec<u8>,
    ) -> DeviceResult<oneshot::Receiver<DeviceResult<usize>>> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(DeviceError::Shutdown);
        }
        if data.is_empty() {
            return Err(DeviceError::ZeroLength);
        }
        let sector_size = self.device.sector_size();
        if data.len() % sector_size != 0 {
            return Err(DeviceError::BufferSize {
                len: data.len(),
                sector_size,
            });
        }
        let sectors = (data.len() / sector_size) as u64;
        self.check_span(start, sectors)?;
        let (tx, rx) = oneshot::channel();
        self.enqueue(IoKind::Write, start, sectors, IoSegment::Write { data, tx });
        Ok(rx)
    }

    /// Submit a read and await its completion.
    pub async fn read(&self, start: Sector, sectors: u64) -> DeviceResult<Vec<u8>> {
        let rx = self.submit_read(start, sectors)?;
        rx.await.unwrap_or(Err(DeviceError::Shutdown))
    }

    /// Submit a write and await its completion. Returns the bytes written.
    pub async fn write(&self, start: Sector, data: Vec<u8>) -> DeviceResult<usize> {
        let rx = self.submit_write(start, data)?;
        rx.await.unwrap_or(Err(DeviceError::Shutdown))
    }

    /// Service loop. Spawn exactly one per queue; exits after [`shutdown`]
    /// and fails whatever never reached the device.
    ///
    /// [`shutdown`]: RequestQueue::shutdown
    pub async fn run(self: Arc<Self>) {
        debug!("request queue pump started");
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let next = {
                let mut inner = self.inner.lock();
                inner.sched.dispatch().map(|request| {
                    let payload = inner.payloads.remove(&request.id());
                    (request, payload)
                })
            };
            match next {
                Some((request, Some(io))) => self.service(request, io).await,
                Some((request, None)) => {
                    warn!(id = %request.id(), "dispatched request had no payload");
                }
                None => self.work.notified().await,
            }
        }
        self.drain();
        debug!("request queue pump stopped");
    }

    /// Stop accepting submissions and wake the pump so it can wind down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so the wake holds even if the pump is
        // still between its empty dispatch and the park
        self.work.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Requests waiting for dispatch.
    pub fn pending(&self) -> usize {
        self.inner.lock().sched.pending()
    }

    /// Scheduler counters, read without taking the queue lock.
    pub fn stats(&self) -> SchedStatsSnapshot {
        self.stats.snapshot()
    }

    fn check_span(&self, start: Sector, sectors: u64) -> DeviceResult<()> {
        if sectors == 0 {
            return Err(DeviceError::ZeroLength);
        }
        let capacity = self.device.capacity_sectors();
        if start.checked_add(sectors).map_or(true, |end| end > capacity) {
            return Err(DeviceError::OutOfRange {
                start,
                sectors,
                capacity,
            });
        }
        Ok(())
    }

    /// Insert a new request, folding it into a mergeable neighbor when the
    /// spans line up.
    fn enqueue(&self, kind: IoKind, start: Sector, sectors: u64, segment: IoSegment) {
        let id = next_request_id();
        let mut inner = self.inner.lock();
        // re-check under the lock: the pump drains exactly once, so anything
        // inserted after that drain would never complete
        if self.shutdown.load(Ordering::SeqCst) {
            drop(inner);
            segment.fail(DeviceError::Shutdown);
            return;
        }
        inner.sched.insert(Request::new(id, start, sectors));

        // Back merge: a pending neighbor whose queued span ends exactly where
        // this request starts, same kind, combined span within the cap. The
        // payload table carries the true span; the core entry keeps the
        // surviving request's original range across merges.
        let neighbor = match inner.sched.former(id) {
            Ok(Some(prev)) => Some(prev.id()),
            _ => None,
        };
        let target = neighbor.filter(|prev_id| {
            inner.payloads.get(prev_id).is_some_and(|io| {
                io.kind == kind
                    && io.start + io.sectors == start
                    && io.sectors + sectors <= MAX_MERGE_SECTORS
            })
        });

        match target {
            Some(prev_id) => {
                if let Err(err) = inner.sched.notify_merge(prev_id, id) {
                    // both ids were observed pending under this lock
                    warn!(%err, "merge bookkeeping failed, keeping request standalone");
                    inner.payloads.insert(
                        id,
                        QueuedIo {
                            kind,
                            start,
                            sectors,
                            segments: vec![segment],
                        },
                    );
                } else if let Some(io) = inner.payloads.get_mut(&prev_id) {
                    io.sectors += sectors;
                    io.segments.push(segment);
                    trace!(surviving = %prev_id, absorbed = %id, "back-merged request");
                }
            }
            None => {
                inner.payloads.insert(
                    id,
                    QueuedIo {
                        kind,
                        start,
                        sectors,
                        segments: vec![segment],
                    },
                );
            }
        }
        drop(inner);
        self.work.notify_one();
    }

    /// Run one dispatched transfer against the device and complete its
    /// segments.
    async fn service(&self, request: Request, io: QueuedIo) {
        let sector_size = self.device.sector_size();
        match io.kind {
            IoKind::Read => {
                let mut buf = vec![0u8; io.sectors as usize * sector_size];
                match self.device.read_sectors(io.start, &mut buf).await {
                    Ok(()) => {
                        // each submitter gets its slice of the merged span
                        let mut offset = 0;
                        for seg in io.segments {
                            let IoSegment::Read { sectors, tx } = seg else {
                                continue;
                            };
                            let len = sectors as usize * sector_size;
                            let _ = tx.send(Ok(buf[offset..offset + len].to_vec()));
                            offset += len;
                        }
                    }
                    Err(err) => {
                        warn!(id = %request.id(), %err, "read transfer failed");
                        for seg in io.segments {
                            seg.fail(err.clone());
                        }
                    }
                }
            }
            IoKind::Write => {
                let mut data = Vec::with_capacity(io.sectors as usize * sector_size);
                let mut done = Vec::with_capacity(io.segments.len());
                for seg in io.segments {
                    let IoSegment::Write { data: payload, tx } = seg else {
                        continue;
                    };
                    data.extend_from_slice(&payload);
                    done.push((payload.len(), tx));
                }
                match self.device.write_sectors(io.start, &data).await {
                    Ok(()) => {
                        for (len, tx) in done {
                            let _ = tx.send(Ok(len));
                        }
                    }
                    Err(err) => {
                        warn!(id = %request.id(), %err, "write transfer failed");
                        for (_, tx) in done {
                            let _ = tx.send(Err(err.clone()));
                        }
                    }
                }
            }
        }
        trace!(
            id = %request.id(),
            start = io.start,
            sectors = io.sectors,
            "request serviced"
        );
    }

    /// Fail everything still queued. Called once by the pump on its way out.
    fn drain(&self) {
        let leftovers: Vec<QueuedIo> = {
            let mut inner = self.inner.lock();
            let ids: Vec<RequestId> = inner.payloads.keys().copied().collect();
            for id in ids {
                let _ = inner.sched.remove(id);
            }
            inner.payloads.drain().map(|(_, io)| io).collect()
        };
        let failed: usize = leftovers.iter().map(|io| io.segments.len()).sum();
        for io in leftovers {
            for seg in io.segments {
                seg.fail(DeviceError::Shutdown);
            }
        }
        if failed > 0 {
            debug!(failed, "queued submissions failed at shutdown");
        }
    }
}
