//! Minimal collision world for the arena.
//!
//! Static geometry is a set of axis-aligned boxes with no network identity.
//! Karts contribute sphere colliders that are rebuilt every step, so one kart
//! can own more than one collider. Queries report the owning entity of every
//! collider they touch and leave de-duplication to the caller.

use crate::config::{ArenaConfig, KartTuning};
use glam::Vec3;
use shared::{forward_from_yaw, EntityId};

/// Physical state of a kart.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KartBody {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Heading in radians, 0 = +Z.
    pub yaw: f32,
    pub angular_velocity: f32,
}

impl KartBody {
    pub fn at(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            yaw,
            ..Self::default()
        }
    }

    pub fn forward(&self) -> Vec3 {
        forward_from_yaw(self.yaw)
    }

    pub fn apply_impulse(&mut self, impulse: Vec3) {
        self.velocity += impulse;
    }

    pub fn stop(&mut self) {
        self.velocity = Vec3::ZERO;
        self.angular_velocity = 0.0;
    }
}

/// Represents a static box in the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Obstacle {
    fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.center - self.half_extents, self.center + self.half_extents)
    }
}

#[derive(Debug, Clone, Copy)]
struct EntityCollider {
    owner: EntityId,
    center: Vec3,
    radius: f32,
}

/// Something an overlap query touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderHit {
    /// `None` for static geometry.
    pub owner: Option<EntityId>,
    /// Closest point on the collider to the query centre.
    pub point: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryFilter {
    pub entities: bool,
    pub statics: bool,
}

impl QueryFilter {
    pub const ALL: QueryFilter = QueryFilter {
        entities: true,
        statics: true,
    };
    pub const ENTITIES: QueryFilter = QueryFilter {
        entities: true,
        statics: false,
    };
}

#[derive(Debug)]
pub struct PhysicsWorld {
    obstacles: Vec<Obstacle>,
    half_size: f32,
    colliders: Vec<EntityCollider>,
}

impl PhysicsWorld {
    pub fn new(arena: &ArenaConfig) -> Self {
        Self {
            obstacles: arena
                .obstacles
                .iter()
                .map(|o| Obstacle {
                    center: o.center,
                    half_extents: o.half_extents,
                })
                .collect(),
            half_size: arena.half_size,
            colliders: Vec::new(),
        }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn clear_colliders(&mut self) {
        self.colliders.clear();
    }

    /// Registers the body and nose spheres of a kart.
    pub fn add_kart_colliders(&mut self, owner: EntityId, body: &KartBody, tuning: &KartTuning) {
        self.colliders.push(EntityCollider {
            owner,
            center: body.position + Vec3::Y * tuning.body_radius,
            radius: tuning.body_radius,
        });
        self.colliders.push(EntityCollider {
            owner,
            center: body.position + body.forward() * tuning.nose_offset + Vec3::Y * tuning.nose_radius,
            radius: tuning.nose_radius,
        });
    }

    /// Returns every collider intersecting the sphere.
    pub fn overlap_sphere(&self, center: Vec3, radius: f32, filter: QueryFilter) -> Vec<ColliderHit> {
        let mut hits = Vec::new();

        if filter.entities {
            for collider in &self.colliders {
                let offset = center - collider.center;
                let reach = radius + collider.radius;
                if offset.length_squared() <= reach * reach {
                    let point = collider.center + offset.normalize_or_zero() * collider.radius;
                    hits.push(ColliderHit {
                        owner: Some(collider.owner),
                        point,
                    });
                }
            }
        }

        if filter.statics {
            for obstacle in &self.obstacles {
                let point = obstacle.closest_point(center);
                if point.distance_squared(center) <= radius * radius {
                    hits.push(ColliderHit { owner: None, point });
                }
            }
        }

        hits
    }

    pub fn is_over_floor(&self, position: Vec3) -> bool {
        position.x.abs() <= self.half_size && position.z.abs() <= self.half_size
    }

    /// Pushes a kart out of any obstacle it penetrates and cancels the velocity
    /// driving into it. Returns the largest impact speed, or 0.
    pub fn resolve_obstacles(&self, body: &mut KartBody, radius: f32) -> f32 {
        let mut impact: f32 = 0.0;

        for obstacle in &self.obstacles {
            let center = body.position + Vec3::Y * radius;
            let closest = obstacle.closest_point(center);
            let mut offset = center - closest;
            offset.y = 0.0;
            let distance = offset.length();
            if distance >= radius || closest.distance(center) >= radius {
                continue;
            }

            let normal = if distance > 0.001 {
                offset / distance
            } else {
                // Centre is inside the box: push out along the shallowest axis.
                let local = center - obstacle.center;
                let overlap_x = obstacle.half_extents.x - local.x.abs();
                let overlap_z = obstacle.half_extents.z - local.z.abs();
                if overlap_x < overlap_z {
                    Vec3::new(local.x.signum(), 0.0, 0.0)
                } else {
                    Vec3::new(0.0, 0.0, local.z.signum())
                }
            };

            let target = closest + normal * radius;
            body.position.x = target.x;
            body.position.z = target.z;

            let into = -body.velocity.dot(normal);
            if into > 0.0 {
                body.velocity += normal * into;
                impact = impact.max(into);
            }
        }

        impact
    }
}

/// Separates two overlapping karts and exchanges their approach velocity.
/// Returns the closing speed at impact, or 0 if they did not touch.
pub fn resolve_kart_contact(a: &mut KartBody, b: &mut KartBody, radius: f32) -> f32 {
    let mut offset = b.position - a.position;
    offset.y = 0.0;
    let distance = offset.length();
    let min_distance = radius * 2.0;

    if distance >= min_distance {
        return 0.0;
    }

    if distance < 0.001 {
        a.position.x -= radius;
        b.position.x += radius;
        return 0.0;
    }

    let normal = offset / distance;
    let separation = (min_distance - distance) / 2.0;
    a.position -= normal * separation;
    b.position += normal * separation;

    let closing = (a.velocity - b.velocity).dot(normal);
    if closing <= 0.0 {
        return 0.0;
    }

    let a_normal = normal * a.velocity.dot(normal);
    let b_normal = normal * b.velocity.dot(normal);
    a.velocity += (b_normal - a_normal) * 0.8;
    b.velocity += (a_normal - b_normal) * 0.8;

    closing
}

/// Outward impulse from an explosion origin, flattened onto the ground plane.
pub fn radial_impulse(origin: Vec3, target: Vec3, magnitude: f32) -> Vec3 {
    let mut direction = target - origin;
    direction.y = 0.0;
    let direction = direction.normalize_or_zero();
    (direction + Vec3::Y * 0.3) * magnitude
}

/// Calculates physics substeps required to prevent collision tunneling
pub fn calculate_required_substeps(dt: f32, max_speed: f32, min_collision_radius: f32) -> u32 {
    const SAFETY_FACTOR: f32 = 0.5;

    let max_movement_per_step = min_collision_radius * SAFETY_FACTOR;
    let max_movement_this_tick = max_speed * dt;

    if max_movement_per_step > 0.0 && max_movement_this_tick > max_movement_per_step {
        (max_movement_this_tick / max_movement_per_step).ceil() as u32
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObstacleConfig;
    use assert_approx_eq::assert_approx_eq;

    fn world_with_pillar() -> PhysicsWorld {
        let arena = ArenaConfig {
            obstacles: vec![ObstacleConfig {
                center: Vec3::new(0.0, 1.5, 0.0),
                half_extents: Vec3::new(2.0, 1.5, 2.0),
            }],
            ..ArenaConfig::default()
        };
        PhysicsWorld::new(&arena)
    }

    #[test]
    fn test_overlap_reports_every_kart_collider() {
        let mut world = world_with_pillar();
        let tuning = KartTuning::default();
        let body = KartBody::at(Vec3::new(10.0, 0.0, 10.0), 0.0);
        world.add_kart_colliders(7, &body, &tuning);

        let hits = world.overlap_sphere(Vec3::new(10.0, 0.5, 11.0), 1.0, QueryFilter::ENTITIES);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.owner == Some(7)));
    }

    #[test]
    fn test_overlap_static_geometry_has_no_owner() {
        let world = world_with_pillar();
        let hits = world.overlap_sphere(Vec3::new(2.3, 0.5, 0.0), 0.5, QueryFilter::ALL);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].owner, None);
        assert_approx_eq!(hits[0].point.x, 2.0);

        let hits = world.overlap_sphere(Vec3::new(2.3, 0.5, 0.0), 0.5, QueryFilter::ENTITIES);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_obstacle_resolution_reports_impact() {
        let world = world_with_pillar();
        let mut body = KartBody::at(Vec3::new(-2.5, 0.0, 0.0), 0.0);
        body.velocity = Vec3::new(12.0, 0.0, 0.0);

        let impact = world.resolve_obstacles(&mut body, 1.0);

        assert_approx_eq!(impact, 12.0, 1e-4);
        assert_approx_eq!(body.position.x, -3.0, 1e-4);
        assert_approx_eq!(body.velocity.x, 0.0, 1e-4);
    }

    #[test]
    fn test_floor_bounds() {
        let world = world_with_pillar();
        assert!(world.is_over_floor(Vec3::new(39.0, 0.0, -39.0)));
        assert!(!world.is_over_floor(Vec3::new(41.0, 0.0, 0.0)));
    }

    #[test]
    fn test_kart_contact_separates_and_reports_closing_speed() {
        let mut a = KartBody::at(Vec3::new(0.0, 0.0, 0.0), 0.0);
        let mut b = KartBody::at(Vec3::new(1.5, 0.0, 0.0), 0.0);
        a.velocity = Vec3::new(10.0, 0.0, 0.0);

        let closing = resolve_kart_contact(&mut a, &mut b, 1.0);

        assert_approx_eq!(closing, 10.0, 1e-4);
        assert!(a.position.distance(b.position) >= 1.999);
        assert_approx_eq!(a.velocity.x, 2.0, 1e-4);
        assert_approx_eq!(b.velocity.x, 8.0, 1e-4);
    }

    #[test]
    fn test_radial_impulse_points_away() {
        let impulse = radial_impulse(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0), 10.0);
        assert!(impulse.z > 0.0);
        assert_approx_eq!(impulse.x, 0.0);
    }

    #[test]
    fn test_substep_calculation() {
        assert_eq!(calculate_required_substeps(1.0 / 60.0, 35.0, 0.5), 3);
        assert_eq!(calculate_required_substeps(1.0 / 1000.0, 35.0, 0.5), 1);
        assert!(calculate_required_substeps(1.0, 35.0, 0.5) > 1);
    }
}
