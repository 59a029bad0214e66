use glam::Vec2;

/// Attack hitbox shapes (§4.5). `Projectile` describes the spawned projectile's own
/// collision body, used when it ticks independently rather than resolving at an
/// action point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitboxShape {
    Rectangle { width: f32, length: f32 },
    Cone { range: f32, angle_radians: f32 },
    Circle { radius: f32 },
    Projectile { width: f32, length: f32 },
}

/// Tests whether `point` is contained by a hitbox of `shape` anchored at `origin`,
/// oriented along `facing` (radians), for the rectangle/cone shapes; circles ignore
/// facing. Rectangles are anchored at their near edge and extend forward.
pub fn contains(shape: HitboxShape, origin: Vec2, facing: f32, point: Vec2) -> bool {
    let offset = point - origin;

    match shape {
        HitboxShape::Circle { radius } => offset.length_squared() <= radius * radius,

        HitboxShape::Cone { range, angle_radians } => {
            let distance = offset.length();
            if distance > range || distance < f32::EPSILON {
                return false;
            }
            let to_point = offset.normalize();
            let forward = Vec2::new(facing.cos(), facing.sin());
            let cos_angle = forward.dot(to_point).clamp(-1.0, 1.0);
            cos_angle.acos() <= angle_radians / 2.0
        }

        HitboxShape::Rectangle { width, length } | HitboxShape::Projectile { width, length } => {
            let forward = Vec2::new(facing.cos(), facing.sin());
            let right = Vec2::new(-forward.y, forward.x);
            let along = offset.dot(forward);
            let across = offset.dot(right);
            (0.0..=length).contains(&along) && across.abs() <= width / 2.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_contains_forward_point() {
        let shape = HitboxShape::Rectangle { width: 45.0, length: 85.0 };
        assert!(contains(shape, Vec2::ZERO, 0.0, Vec2::new(50.0, 0.0)));
        assert!(!contains(shape, Vec2::ZERO, 0.0, Vec2::new(-10.0, 0.0)));
        assert!(!contains(shape, Vec2::ZERO, 0.0, Vec2::new(50.0, 30.0)));
    }

    #[test]
    fn circle_ignores_facing() {
        let shape = HitboxShape::Circle { radius: 10.0 };
        assert!(contains(shape, Vec2::ZERO, 1.2, Vec2::new(5.0, 5.0)));
        assert!(!contains(shape, Vec2::ZERO, 1.2, Vec2::new(20.0, 0.0)));
    }

    #[test]
    fn cone_checks_angle_and_range() {
        let shape = HitboxShape::Cone {
            range: 10.0,
            angle_radians: std::f32::consts::FRAC_PI_2,
        };
        assert!(contains(shape, Vec2::ZERO, 0.0, Vec2::new(5.0, 1.0)));
        assert!(!contains(shape, Vec2::ZERO, 0.0, Vec2::new(-5.0, 0.1)));
    }
}
