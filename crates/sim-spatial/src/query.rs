//! Pure, lock-agnostic geometry kernels. These take plain
//! `(id, position, size)` triples rather than locked agents, so the same
//! math backs both the in-tick path (`StepContext`, candidates drawn from an
//! already-held 1-ring) and the ad hoc external path (`ChunkedIndex::overlap`
//! et al., candidates drawn from a freshly-locked 1-ring).

use sim_geom::{AgentId, Vec3};

/// True if `probe` (a sphere of `probe_radius` centred at `probe`) overlaps
/// any candidate.
pub fn sphere_overlap(probe: Vec3, probe_radius: f64, candidates: impl Iterator<Item = (AgentId, Vec3, f64)>) -> bool {
    candidates.into_iter().any(|(_, pos, size)| {
        let reach = probe_radius + size;
        probe.distance_squared(pos) < reach * reach
    })
}

/// A small stand-off subtracted from a ray hit's distance so the mover stops
/// short of contact rather than exactly touching it (spec'd epsilon).
const HIT_EPSILON: f64 = 0.01;

/// Nearest ray–sphere hit along `dir_hat` (must be unit length) within
/// `length`, against spheres of radius `probe_radius + candidate_size`, or
/// `(false, length)` if nothing is hit.
///
/// `f = origin - centre`, `b = 2 * dot(f, dir_hat)`, `c = dot(f, f) - r^2`;
/// the smaller real root of `t^2 + b*t + c = 0` is the entry distance, used
/// unless it's negative (origin already inside the sphere), in which case
/// the larger root (the exit distance) is used instead. The final hit
/// distance has [`HIT_EPSILON`] subtracted so the mover stops short of
/// contact.
pub fn ray_sphere_first_hit(
    origin: Vec3,
    dir_hat: Vec3,
    probe_radius: f64,
    length: f64,
    candidates: impl Iterator<Item = (AgentId, Vec3, f64)>,
) -> (bool, f64) {
    let mut nearest = length;
    let mut hit = false;

    for (_, centre, size) in candidates {
        let radius = probe_radius + size;
        let f = origin - centre;
        let b = 2.0 * f.dot(dir_hat);
        let c = f.dot(f) - radius * radius;
        let discriminant = b * b - 4.0 * c;
        if discriminant < 0.0 {
            continue;
        }
        let sqrt_d = discriminant.sqrt();
        let t_entry = (-b - sqrt_d) / 2.0;
        let t = if t_entry >= 0.0 { t_entry } else { (-b + sqrt_d) / 2.0 };
        if t >= 0.0 && t <= nearest {
            nearest = t;
            hit = true;
        }
    }

    if hit {
        (true, (nearest - HIT_EPSILON).max(0.0))
    } else {
        (false, length)
    }
}

/// The candidate with the smallest squared distance to `origin`, or `None`
/// if `candidates` is empty.
pub fn nearest_by_distance(origin: Vec3, candidates: impl Iterator<Item = (AgentId, Vec3, f64)>) -> Option<AgentId> {
    candidates
        .into_iter()
        .map(|(id, pos, _)| (id, origin.distance_squared(pos)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> AgentId {
        AgentId(n)
    }

    #[test]
    fn sphere_overlap_detects_touching_spheres() {
        // Candidate at distance 2.0 with size 1.0: a probe reaches it once
        // `probe_radius + 1.0 > 2.0`, i.e. `probe_radius > 1.0`.
        let candidates = [(id(1), Vec3::new(2.0, 0.0, 0.0), 1.0)];
        assert!(sphere_overlap(Vec3::ZERO, 1.1, candidates.into_iter()));
        assert!(!sphere_overlap(Vec3::ZERO, 0.5, candidates.into_iter()));
    }

    #[test]
    fn ray_sphere_first_hit_picks_nearest() {
        let candidates = [
            (id(1), Vec3::new(5.0, 0.0, 0.0), 1.0),
            (id(2), Vec3::new(2.0, 0.0, 0.0), 1.0),
        ];
        let (hit, distance) =
            ray_sphere_first_hit(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.0, 10.0, candidates.into_iter());
        assert!(hit);
        // Entry distance is 1.0 (2.0 - radius 1.0); minus the 0.01 stand-off.
        assert!((distance - 0.99).abs() < 1e-9);
    }

    #[test]
    fn ray_sphere_first_hit_misses_beyond_length() {
        let candidates = [(id(1), Vec3::new(100.0, 0.0, 0.0), 1.0)];
        let (hit, distance) =
            ray_sphere_first_hit(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.0, 5.0, candidates.into_iter());
        assert!(!hit);
        assert!((distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn ray_sphere_first_hit_uses_combined_radius() {
        // Probe radius 0.5 + candidate size 0.5 = 1.0 combined radius, so
        // the hit is detected a full unit earlier than the bare centre.
        let candidates = [(id(1), Vec3::new(5.0, 0.0, 0.0), 0.5)];
        let (hit, distance) =
            ray_sphere_first_hit(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.5, 10.0, candidates.into_iter());
        assert!(hit);
        assert!((distance - 3.99).abs() < 1e-9);
    }

    #[test]
    fn ray_sphere_first_hit_from_inside_uses_exit_root() {
        // Origin starts inside the combined sphere (overlapping already);
        // the near root is negative, so the far (exit) root is used.
        let candidates = [(id(1), Vec3::new(0.9, 0.0, 0.0), 0.5)];
        let (hit, distance) =
            ray_sphere_first_hit(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.5, 10.0, candidates.into_iter());
        assert!(hit);
        assert!(distance > 0.9);
    }

    #[test]
    fn nearest_by_distance_picks_closest() {
        let candidates = [
            (id(1), Vec3::new(10.0, 0.0, 0.0), 1.0),
            (id(2), Vec3::new(1.0, 0.0, 0.0), 1.0),
        ];
        assert_eq!(nearest_by_distance(Vec3::ZERO, candidates.into_iter()), Some(id(2)));
    }

    #[test]
    fn nearest_by_distance_empty_is_none() {
        assert_eq!(nearest_by_distance(Vec3::ZERO, std::iter::empty()), None);
    }
}
