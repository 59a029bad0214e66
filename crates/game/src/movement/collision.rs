use glam::Vec2;

/// Precomputed tile-based collision mask (§4.4). Uploaded once per client or
/// configured server-side; the core treats it as a finished, read-only grid (world
/// tile generation is out of scope, §1).
#[derive(Debug, Clone)]
pub struct CollisionMask {
    width: u32,
    height: u32,
    tile_size: f32,
    /// `true` = blocked tile.
    blocked: Vec<bool>,
}

impl CollisionMask {
    pub fn empty(width: u32, height: u32, tile_size: f32) -> Self {
        Self {
            width,
            height,
            tile_size,
            blocked: vec![false; (width * height) as usize],
        }
    }

    pub fn from_packed_bits(width: u32, height: u32, tile_size: f32, packed: &[u8]) -> Self {
        let mut blocked = vec![false; (width * height) as usize];
        for (i, cell) in blocked.iter_mut().enumerate() {
            let byte = packed.get(i / 8).copied().unwrap_or(0);
            *cell = (byte >> (i % 8)) & 1 == 1;
        }
        Self {
            width,
            height,
            tile_size,
            blocked,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn set_blocked(&mut self, x: u32, y: u32, blocked: bool) {
        if let Some(idx) = self.index(x, y) {
            self.blocked[idx] = blocked;
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    pub fn world_to_tile(&self, pos: Vec2) -> (i64, i64) {
        (
            (pos.x / self.tile_size).floor() as i64,
            (pos.y / self.tile_size).floor() as i64,
        )
    }

    pub fn is_blocked_tile(&self, tx: i64, ty: i64) -> bool {
        if tx < 0 || ty < 0 {
            return true;
        }
        match self.index(tx as u32, ty as u32) {
            Some(idx) if (tx as u32) < self.width && (ty as u32) < self.height => self.blocked[idx],
            _ => true,
        }
    }

    pub fn is_blocked_world(&self, pos: Vec2) -> bool {
        let (tx, ty) = self.world_to_tile(pos);
        self.is_blocked_tile(tx, ty)
    }

    pub fn is_line_of_sight_clear(&self, from: Vec2, to: Vec2) -> bool {
        let steps = (from.distance(to) / (self.tile_size * 0.5)).ceil().max(1.0) as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let point = from.lerp(to, t);
            if self.is_blocked_world(point) {
                return false;
            }
        }
        true
    }
}

/// Moves `position` by `delta`, retried axis-separated (X-only, then Y-only) to
/// allow wall-sliding (§4.4). `radius` is the mover's collision radius.
pub fn move_with_sliding(mask: &CollisionMask, position: Vec2, delta: Vec2, radius: f32) -> Vec2 {
    let mut result = position;

    let try_x = Vec2::new(result.x + delta.x, result.y);
    if !collides(mask, try_x, radius) {
        result.x = try_x.x;
    }

    let try_y = Vec2::new(result.x, result.y + delta.y);
    if !collides(mask, try_y, radius) {
        result.y = try_y.y;
    }

    result
}

fn collides(mask: &CollisionMask, center: Vec2, radius: f32) -> bool {
    let offsets = [
        Vec2::new(-radius, -radius),
        Vec2::new(radius, -radius),
        Vec2::new(-radius, radius),
        Vec2::new(radius, radius),
        Vec2::ZERO,
    ];
    offsets.iter().any(|o| mask.is_blocked_world(center + *o))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slides_along_wall() {
        let mut mask = CollisionMask::empty(10, 10, 1.0);
        // Vertical wall at x=5 blocking straight-through movement.
        for y in 0..10 {
            mask.set_blocked(5, y, true);
        }

        let start = Vec2::new(4.5, 4.5);
        let delta = Vec2::new(2.0, 1.0);
        let result = move_with_sliding(&mask, start, delta, 0.2);

        // X blocked by the wall, Y still free to slide.
        assert!(result.x < 5.0);
        assert!((result.y - 5.5).abs() < 0.01);
    }

    #[test]
    fn line_of_sight_blocked_by_wall() {
        let mut mask = CollisionMask::empty(10, 10, 1.0);
        mask.set_blocked(5, 5, true);

        assert!(!mask.is_line_of_sight_clear(Vec2::new(0.5, 5.5), Vec2::new(9.5, 5.5)));
        assert!(mask.is_line_of_sight_clear(Vec2::new(0.5, 0.5), Vec2::new(0.5, 9.5)));
    }
}
