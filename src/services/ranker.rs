//! Proximity ordering of the technician's worklist.

use std::cmp::Ordering;

use crate::models::coordinate::Coordinate;
use crate::models::job::{Job, RankedJob};
use crate::services::geo;

/// Order jobs nearest-first from `technician`.
///
/// Jobs whose distance cannot be computed (no technician fix, or no job
/// coordinate) sort after every known distance. The sort is stable, so ties
/// and unknowns keep their input order. Inputs are never modified.
pub fn rank(technician: Option<Coordinate>, jobs: &[Job]) -> Vec<RankedJob> {
    let mut ranked: Vec<RankedJob> = jobs
        .iter()
        .map(|job| RankedJob {
            distance_km: technician.zip(job.location).map(|(t, j)| geo::distance_km(t, j)),
            job: job.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| compare_distance(a.distance_km, b.distance_km));
    ranked
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
