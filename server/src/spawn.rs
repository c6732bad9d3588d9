//! Respawn placement: picks where a kart comes back into the arena.

use crate::config::SpawnPoint;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct SpawnPlacement {
    points: Vec<SpawnPoint>,
    random: bool,
    cursor: usize,
}

impl SpawnPlacement {
    pub fn new(points: Vec<SpawnPoint>, random: bool) -> Self {
        Self {
            points,
            random,
            cursor: 0,
        }
    }

    /// Next spawn transform, or `None` when no spawn points are configured and
    /// the caller should keep the entity's own transform.
    ///
    /// Round-robin advances a single cursor on every call, regardless of which
    /// kart asked.
    pub fn next_spawn_point<R: Rng>(&mut self, rng: &mut R) -> Option<SpawnPoint> {
        if self.points.is_empty() {
            return None;
        }

        let index = if self.random {
            rng.gen_range(0..self.points.len())
        } else {
            let index = self.cursor % self.points.len();
            self.cursor = (index + 1) % self.points.len();
            index
        };

        self.points.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn points() -> Vec<SpawnPoint> {
        (0..3)
            .map(|i| SpawnPoint {
                position: Vec3::new(i as f32, 0.0, 0.0),
                yaw: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_round_robin_wraps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut placement = SpawnPlacement::new(points(), false);

        let xs: Vec<f32> = (0..5)
            .filter_map(|_| placement.next_spawn_point(&mut rng))
            .map(|p| p.position.x)
            .collect();

        assert_eq!(xs, vec![0.0, 1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_random_picks_configured_points() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut placement = SpawnPlacement::new(points(), true);
        let configured = points();

        for _ in 0..20 {
            let point = placement.next_spawn_point(&mut rng).unwrap();
            assert!(configured.contains(&point));
        }
    }

    #[test]
    fn test_no_points_falls_back() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut placement = SpawnPlacement::new(Vec::new(), false);
        assert!(placement.next_spawn_point(&mut rng).is_none());
    }
}
