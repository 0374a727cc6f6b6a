//! Vertex/face aggregation
//!
//! Triangle `i` always lands at points `3i..3i + 3` and face `i`, whether
//! triangles are processed in order or spread across worker threads. Workers
//! reserve their slot from a shared counter before touching a triangle and
//! results are reassembled by slot, so completion order never shows in the
//! output.

use crate::mesh::Completeness;
use crate::{BBox3, Error, Face, Mesh, Result, Triangle, Vertex};
use nalgebra::Vector3;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How triangles are distributed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Sequential,
    /// `workers == 0` uses the available parallelism
    Parallel { workers: usize },
}

/// Builds a [`Mesh`] from a triangle stream
#[derive(Debug, Clone)]
pub struct Aggregator {
    policy: Policy,
    deadline: Option<Instant>,
}

/// One step of pulling from a triangle stream under a deadline
enum Pull {
    Next(Triangle),
    Exhausted,
    /// The deadline passed with at least one triangle still pending
    Expired,
}

/// Triangles one worker finished, keyed by reserved slot
#[derive(Default)]
struct WorkerBatch {
    done: Vec<(usize, [Vertex; 3])>,
    bbox: BBox3,
}

impl Aggregator {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            deadline: None,
        }
    }

    pub fn sequential() -> Self {
        Self::new(Policy::Sequential)
    }

    pub fn parallel(workers: usize) -> Self {
        Self::new(Policy::Parallel { workers })
    }

    /// Stop taking triangles once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Aggregate a decoded stream.
    ///
    /// The parallel policy drains the stream first, so a decode error aborts
    /// before any worker starts. The deadline is checked while draining too:
    /// if it passes there, the triangles decoded so far are placed and the
    /// result is partial.
    pub fn aggregate<I>(&self, triangles: I) -> Result<Mesh>
    where
        I: IntoIterator<Item = Result<Triangle>>,
    {
        match self.policy {
            Policy::Sequential => self.run_sequential(triangles),
            Policy::Parallel { workers } => {
                let mut iter = triangles.into_iter();
                let mut collected = Vec::with_capacity(iter.size_hint().0);
                loop {
                    match self.pull(&mut iter)? {
                        Pull::Next(triangle) => collected.push(triangle),
                        Pull::Exhausted => break,
                        Pull::Expired => {
                            debug!(decoded = collected.len(), "deadline passed while decoding");
                            return self.run_parallel(&collected, workers, None, true);
                        }
                    }
                }
                self.run_parallel(&collected, workers, self.deadline, false)
            }
        }
    }

    /// Aggregate triangles already in memory
    pub fn aggregate_slice(&self, triangles: &[Triangle]) -> Result<Mesh> {
        match self.policy {
            Policy::Sequential => self.run_sequential(triangles.iter().copied().map(Ok)),
            Policy::Parallel { workers } => {
                self.run_parallel(triangles, workers, self.deadline, false)
            }
        }
    }

    /// Next triangle, unless the deadline passed first.
    ///
    /// A pending triangle is only looked at after expiry to tell a cut-short
    /// stream from a finished one; a pending decode error still wins.
    fn pull<I>(&self, iter: &mut I) -> Result<Pull>
    where
        I: Iterator<Item = Result<Triangle>>,
    {
        let expired = deadline_passed(self.deadline);
        match iter.next() {
            None => Ok(Pull::Exhausted),
            Some(Err(e)) => Err(e),
            Some(Ok(_)) if expired => Ok(Pull::Expired),
            Some(Ok(triangle)) => Ok(Pull::Next(triangle)),
        }
    }

    fn run_sequential<I>(&self, triangles: I) -> Result<Mesh>
    where
        I: IntoIterator<Item = Result<Triangle>>,
    {
        let mut iter = triangles.into_iter();
        let (lower, _) = iter.size_hint();
        let mut points = Vec::with_capacity(lower.saturating_mul(3));
        let mut faces = Vec::with_capacity(lower);
        let mut bbox = BBox3::empty();
        let mut completeness = Completeness::Complete;

        loop {
            let triangle = match self.pull(&mut iter)? {
                Pull::Next(triangle) => triangle,
                Pull::Exhausted => break,
                Pull::Expired => {
                    completeness = Completeness::Partial {
                        processed: faces.len(),
                    };
                    break;
                }
            };
            faces.push(face_for(faces.len())?);
            for v in triangle.vertices {
                bbox.include_point(v);
                points.push(v);
            }
        }

        finish(points, faces, bbox, completeness)
    }

    /// `cut_short` marks the result partial even when every given triangle
    /// is placed, for a stream the deadline stopped before its end.
    fn run_parallel(
        &self,
        triangles: &[Triangle],
        workers: usize,
        deadline: Option<Instant>,
        cut_short: bool,
    ) -> Result<Mesh> {
        if let Some(last) = triangles.len().checked_sub(1) {
            face_for(last)?;
        }
        let workers = resolve_workers(workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let total_slots = triangles.len() * 3;
        let next_slot = AtomicUsize::new(0);
        debug!(workers, triangles = triangles.len(), "parallel aggregation");

        let batches: Vec<WorkerBatch> = pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|_| {
                    let mut batch = WorkerBatch::default();
                    loop {
                        if deadline_passed(deadline) {
                            break;
                        }
                        let slot = next_slot.fetch_add(3, Ordering::Relaxed);
                        if slot >= total_slots {
                            break;
                        }
                        let triangle = &triangles[slot / 3];
                        for v in triangle.vertices {
                            batch.bbox.include_point(v);
                        }
                        batch.done.push((slot, triangle.vertices));
                    }
                    batch
                })
                .collect()
        });

        // Every reserved slot was finished, so the finished slots are exactly 0..processed*3
        let processed: usize = batches.iter().map(|b| b.done.len()).sum();
        let mut points = vec![Vector3::zeros(); processed * 3];
        let mut bbox = BBox3::empty();
        for batch in batches {
            bbox = bbox.merged(batch.bbox);
            for (slot, vertices) in batch.done {
                debug_assert!(slot + 3 <= points.len());
                points[slot..slot + 3].copy_from_slice(&vertices);
            }
        }
        let faces = (0..processed).map(face_for).collect::<Result<Vec<_>>>()?;

        let completeness = if cut_short || processed < triangles.len() {
            Completeness::Partial { processed }
        } else {
            Completeness::Complete
        };
        finish(points, faces, bbox, completeness)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::sequential()
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn resolve_workers(workers: usize) -> usize {
    if workers > 0 {
        return workers;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Face for triangle `index`, checking the indices fit in `u32`
fn face_for(index: usize) -> Result<Face> {
    let base = index
        .checked_mul(3)
        .and_then(|b| u32::try_from(b).ok())
        .filter(|b| b.checked_add(2).is_some())
        .ok_or(Error::TooManyTriangles(index + 1))?;
    Ok([base, base + 1, base + 2])
}

fn finish(
    points: Vec<Vertex>,
    faces: Vec<Face>,
    bbox: BBox3,
    completeness: Completeness,
) -> Result<Mesh> {
    if let Completeness::Partial { processed } = completeness {
        warn!(processed, "deadline exceeded, mesh is partial");
    }
    Mesh::from_parts(points, faces, bbox, completeness)
}
