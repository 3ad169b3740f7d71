//! Enemies: Pooka and Fygar
//!
//! Both kinds share one struct. The kind tag carries the Fygar-only fire
//! breath, and callers ask `can_breathe_fire` instead of matching on the kind.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{Aabb, line_of_sight};
use super::grid::{Grid, distance_to_boundary, grid_to_pixel, pixel_to_grid};
use crate::consts::*;
use crate::{Direction, approach, axis_offset, is_aligned};

/// Points for popping an enemy, by depth layer (top to bottom)
pub const POP_SCORES: [u64; 4] = [200, 300, 400, 500];

/// Kind tag without kind-specific data (snapshots, generator output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyType {
    Pooka,
    Fygar,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FireState {
    Idle,
    /// Standing still, about to breathe
    Charging { timer: f32 },
    /// Flame hitbox live
    Active { timer: f32 },
    Cooldown { timer: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireBreath {
    pub state: FireState,
    /// Always horizontal
    pub direction: Direction,
}

impl FireBreath {
    fn new() -> Self {
        Self {
            state: FireState::Idle,
            direction: Direction::Right,
        }
    }

    /// Advance the charge/active/cooldown timers
    fn advance(&mut self, dt: f32) {
        self.state = match self.state {
            FireState::Idle => FireState::Idle,
            FireState::Charging { timer } if timer + dt >= FIRE_CHARGE_TIME => {
                FireState::Active { timer: 0.0 }
            }
            FireState::Charging { timer } => FireState::Charging { timer: timer + dt },
            FireState::Active { timer } if timer + dt >= FIRE_ACTIVE_TIME => {
                FireState::Cooldown { timer: 0.0 }
            }
            FireState::Active { timer } => FireState::Active { timer: timer + dt },
            FireState::Cooldown { timer } if timer + dt >= FIRE_COOLDOWN => FireState::Idle,
            FireState::Cooldown { timer } => FireState::Cooldown { timer: timer + dt },
        };
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.state,
            FireState::Charging { .. } | FireState::Active { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnemyKind {
    Pooka,
    Fygar(FireBreath),
}

impl EnemyKind {
    pub fn new(kind: EnemyType) -> Self {
        match kind {
            EnemyType::Pooka => EnemyKind::Pooka,
            EnemyType::Fygar => EnemyKind::Fygar(FireBreath::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnemyState {
    /// Holding still right after (re)spawn; harmless
    Spawning { timer: f32 },
    /// Walking the tunnels
    Roaming,
    /// Drifting through dirt toward the player
    Ghosting { timer: f32 },
    /// Being pumped. Inflation runs 0..1; at 1 the enemy pops.
    Inflating { inflation: f32, deflating: bool },
    /// Pop animation; removed when it finishes
    Popped { timer: f32 },
    /// Pinned under a falling rock, position slaved to it
    Smooshed { rock_id: u32 },
    /// Last enemy leaving the level
    Escaping,
}

/// Per-tick environment an enemy reads while moving
#[derive(Debug, Clone, Copy)]
pub struct EnemyContext<'a> {
    pub grid: &'a Grid,
    /// Top-left of the player's hitbox as of the previous tick
    pub player_pos: Vec2,
    pub player_alive: bool,
    pub speed: f32,
    pub ghost_speed: f32,
    pub ghost_interval: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    pub kind: EnemyKind,
    /// Top-left of the tile-sized hitbox
    pub pos: Vec2,
    pub direction: Direction,
    pub state: EnemyState,
    pub spawn_pos: Vec2,
    /// Roaming time since the last ghost run
    pub ghost_timer: f32,
    /// Tagged by the orchestrator when it is the only enemy left
    pub sole_survivor: bool,
    /// Pump held on this enemy during the last collision pass
    pub pumped: bool,
    pub pumped_horizontally: bool,
    /// Ready for removal from the enemy list
    pub destroyed: bool,
    /// Left the level instead of dying
    pub escaped: bool,
}

impl Enemy {
    pub fn new(id: u32, kind: EnemyType, col: i32, row: i32, grid: &Grid) -> Self {
        let pos = grid_to_pixel(col, row);
        Self {
            id,
            kind: EnemyKind::new(kind),
            pos,
            direction: initial_direction(grid, col, row),
            state: EnemyState::Spawning { timer: 0.0 },
            spawn_pos: pos,
            ghost_timer: 0.0,
            sole_survivor: false,
            pumped: false,
            pumped_horizontally: false,
            destroyed: false,
            escaped: false,
        }
    }

    pub fn enemy_type(&self) -> EnemyType {
        match self.kind {
            EnemyKind::Pooka => EnemyType::Pooka,
            EnemyKind::Fygar(_) => EnemyType::Fygar,
        }
    }

    pub fn can_breathe_fire(&self) -> bool {
        matches!(self.kind, EnemyKind::Fygar(_))
    }

    pub fn fire(&self) -> Option<&FireBreath> {
        match &self.kind {
            EnemyKind::Fygar(fire) => Some(fire),
            EnemyKind::Pooka => None,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.pos + Vec2::splat(TILE_SIZE / 2.0)
    }

    pub fn is_ghosting(&self) -> bool {
        matches!(self.state, EnemyState::Ghosting { .. })
    }

    pub fn is_smooshed(&self) -> bool {
        matches!(self.state, EnemyState::Smooshed { .. })
    }

    pub fn inflation(&self) -> f32 {
        match self.state {
            EnemyState::Inflating { inflation, .. } => inflation,
            EnemyState::Popped { .. } => 1.0,
            _ => 0.0,
        }
    }

    /// Alive and still a valid pump target
    pub fn is_pumpable(&self) -> bool {
        !self.destroyed
            && !matches!(
                self.state,
                EnemyState::Popped { .. } | EnemyState::Smooshed { .. }
            )
    }

    /// Whether touching this enemy kills the player
    pub fn is_harmful(&self) -> bool {
        !self.destroyed
            && matches!(
                self.state,
                EnemyState::Roaming | EnemyState::Ghosting { .. } | EnemyState::Escaping
            )
    }

    /// Whether a falling rock can still pin this enemy
    pub fn is_crushable(&self) -> bool {
        !self.destroyed
            && !matches!(
                self.state,
                EnemyState::Popped { .. } | EnemyState::Smooshed { .. }
            )
    }

    /// Flame hitbox while the fire is active
    pub fn fire_hitbox(&self) -> Option<Aabb> {
        let fire = self.fire()?;
        if !matches!(fire.state, FireState::Active { .. }) {
            return None;
        }
        let y = self.pos.y + TILE_SIZE * 0.25;
        let x = match fire.direction {
            Direction::Left => self.pos.x - FIRE_LENGTH,
            _ => self.pos.x + TILE_SIZE,
        };
        Some(Aabb::new(
            Vec2::new(x, y),
            Vec2::new(FIRE_LENGTH, TILE_SIZE * 0.5),
        ))
    }

    /// Points for popping, by depth and pump direction
    pub fn pop_score(&self, grid_height: usize) -> u64 {
        let (_, row) = pixel_to_grid(self.center());
        let dirt_rows = grid_height.saturating_sub(SKY_ROWS).max(1) as i32;
        let layer = ((row - SKY_ROWS as i32).max(0) * 4 / dirt_rows).clamp(0, 3) as usize;
        let base = POP_SCORES[layer];
        if self.can_breathe_fire() && self.pumped_horizontally {
            base * 2
        } else {
            base
        }
    }

    /// One tick of pump pressure. Returns true if the enemy popped.
    pub fn pump(&mut self, dt: f32, horizontal: bool) -> bool {
        if !self.is_pumpable() {
            return false;
        }
        let inflation = match self.state {
            EnemyState::Inflating { inflation, .. } => inflation,
            _ => 0.0,
        } + INFLATE_RATE * dt;
        self.pumped = true;
        self.pumped_horizontally = horizontal;
        self.stop_fire();

        if inflation >= 1.0 {
            log::debug!("Enemy {} popped", self.id);
            self.state = EnemyState::Popped { timer: 0.0 };
            true
        } else {
            self.state = EnemyState::Inflating {
                inflation,
                deflating: false,
            };
            false
        }
    }

    /// Pinned by a falling rock
    pub fn smoosh(&mut self, rock_id: u32) {
        self.state = EnemyState::Smooshed { rock_id };
        self.stop_fire();
    }

    pub fn start_escape(&mut self) {
        log::debug!("Enemy {} escaping", self.id);
        self.state = EnemyState::Escaping;
        self.stop_fire();
    }

    /// Back to the spawn tile (after the player respawns)
    pub fn reset_to_spawn(&mut self, grid: &Grid) {
        if self.destroyed || self.is_smooshed() || matches!(self.state, EnemyState::Popped { .. }) {
            return;
        }
        self.pos = self.spawn_pos;
        let (col, row) = pixel_to_grid(self.center());
        self.direction = initial_direction(grid, col, row);
        self.state = EnemyState::Spawning { timer: 0.0 };
        self.ghost_timer = 0.0;
        self.pumped = false;
        if let EnemyKind::Fygar(fire) = &mut self.kind {
            *fire = FireBreath::new();
        }
    }

    fn stop_fire(&mut self) {
        if let EnemyKind::Fygar(fire) = &mut self.kind {
            if fire.state != FireState::Idle {
                fire.state = FireState::Cooldown { timer: 0.0 };
            }
        }
    }

    /// Advance one tick
    pub fn update(&mut self, ctx: &EnemyContext, dt: f32) {
        if self.destroyed {
            return;
        }
        let pumped = std::mem::take(&mut self.pumped);

        match self.state {
            EnemyState::Spawning { timer } => {
                self.state = if timer + dt >= ENEMY_SPAWN_HOLD {
                    EnemyState::Roaming
                } else {
                    EnemyState::Spawning { timer: timer + dt }
                };
            }
            EnemyState::Roaming => {
                if !self.update_fire(ctx, dt) {
                    self.roam(ctx, dt);
                    self.ghost_timer += dt;
                    if self.should_ghost(ctx) {
                        self.state = EnemyState::Ghosting { timer: 0.0 };
                        self.ghost_timer = 0.0;
                    }
                }
            }
            EnemyState::Ghosting { timer } => {
                let target = ctx.player_pos;
                self.drift_toward(target, ctx.ghost_speed * dt, ctx.grid);
                let timer = timer + dt;
                if timer >= MIN_GHOST_TIME && ctx.grid.is_box_in_tunnel(self.pos) {
                    let (col, row) = pixel_to_grid(self.center());
                    self.pos = grid_to_pixel(col, row);
                    self.direction = initial_direction(ctx.grid, col, row);
                    self.state = EnemyState::Roaming;
                } else {
                    self.state = EnemyState::Ghosting { timer };
                }
            }
            EnemyState::Inflating { inflation, .. } => {
                if !pumped {
                    let inflation = inflation - DEFLATE_RATE * dt;
                    self.state = if inflation > 0.0 {
                        EnemyState::Inflating {
                            inflation,
                            deflating: true,
                        }
                    } else if ctx.grid.is_box_in_tunnel(self.pos) {
                        EnemyState::Roaming
                    } else {
                        // Pumped mid-ghost: keep drifting out of the dirt
                        EnemyState::Ghosting { timer: 0.0 }
                    };
                }
            }
            EnemyState::Popped { timer } => {
                if timer + dt >= POP_DURATION {
                    self.destroyed = true;
                } else {
                    self.state = EnemyState::Popped { timer: timer + dt };
                }
            }
            EnemyState::Smooshed { .. } => {}
            EnemyState::Escaping => self.escape(ctx, dt),
        }
    }

    /// Fygar breath. Returns true while the enemy is standing to breathe.
    fn update_fire(&mut self, ctx: &EnemyContext, dt: f32) -> bool {
        let pos = self.pos;
        let EnemyKind::Fygar(fire) = &mut self.kind else {
            return false;
        };
        fire.advance(dt);

        if fire.state == FireState::Idle && ctx.player_alive {
            let dx = ctx.player_pos.x - pos.x;
            let dy = ctx.player_pos.y - pos.y;
            if dy.abs() <= FIRE_BAND && dx.abs() <= FIRE_RANGE && dx != 0.0 {
                fire.direction = if dx > 0.0 { Direction::Right } else { Direction::Left };
                fire.state = FireState::Charging { timer: 0.0 };
                self.direction = fire.direction;
            }
        }
        fire.is_busy()
    }

    fn should_ghost(&self, ctx: &EnemyContext) -> bool {
        if self.ghost_timer < ctx.ghost_interval || !ctx.player_alive {
            return false;
        }
        let from = pixel_to_grid(self.center());
        let to = pixel_to_grid(ctx.player_pos + Vec2::splat(TILE_SIZE / 2.0));
        !line_of_sight(ctx.grid, from, to)
    }

    /// Tunnel walking: straight ahead, reverse at walls, snap the cross axis
    fn roam(&mut self, ctx: &EnemyContext, dt: f32) {
        let step = ctx.speed * dt;
        if step <= 0.0 {
            return;
        }
        let grid = ctx.grid;

        if is_aligned(self.pos.x) && is_aligned(self.pos.y) {
            if let Some(turn) = self.chase_turn(ctx) {
                self.direction = turn;
            }
        }

        let dist = step.min(distance_to_boundary(self.pos, self.direction));
        let next = self.pos + self.direction.vector() * dist;
        if !grid.is_box_in_tunnel(next) {
            self.direction = self.direction.opposite();
            return;
        }
        self.pos = next;

        // Pull the cross axis toward the tile line, only if it stays in the tunnel
        let mut snapped = self.pos;
        if self.direction.is_horizontal() {
            snapped.y = approach(snapped.y, snapped.y - axis_offset(snapped.y), step);
        } else {
            snapped.x = approach(snapped.x, snapped.x - axis_offset(snapped.x), step);
        }
        if snapped != self.pos && grid.is_box_in_tunnel(snapped) {
            self.pos = snapped;
        }
    }

    /// Perpendicular turn at a tile centre into an open tunnel toward the player
    fn chase_turn(&self, ctx: &EnemyContext) -> Option<Direction> {
        if !ctx.player_alive {
            return None;
        }
        let delta = ctx.player_pos - self.pos;
        let candidate = if self.direction.is_horizontal() {
            if delta.y.abs() < TILE_SIZE / 2.0 {
                return None;
            }
            if delta.y > 0.0 { Direction::Down } else { Direction::Up }
        } else {
            if delta.x.abs() < TILE_SIZE / 2.0 {
                return None;
            }
            if delta.x > 0.0 { Direction::Right } else { Direction::Left }
        };
        let (col, row) = pixel_to_grid(self.center());
        let (dc, dr) = candidate.offset();
        ctx.grid.is_empty(col + dc, row + dr).then_some(candidate)
    }

    /// Straight-line drift ignoring dirt. Rock still blocks; each axis is
    /// tried on its own when the diagonal move is blocked.
    fn drift_toward(&mut self, target: Vec2, max_step: f32, grid: &Grid) {
        let delta = target - self.pos;
        let len = delta.length();
        if len <= f32::EPSILON {
            return;
        }
        let motion = delta * (max_step.min(len) / len);
        let candidates = [
            self.pos + motion,
            self.pos + Vec2::new(motion.x, 0.0),
            self.pos + Vec2::new(0.0, motion.y),
        ];
        if let Some(next) = candidates.into_iter().find(|&p| grid.is_position_valid(p)) {
            if motion.x.abs() > motion.y.abs() {
                self.direction = if motion.x > 0.0 { Direction::Right } else { Direction::Left };
            } else if motion.y != 0.0 {
                self.direction = if motion.y > 0.0 { Direction::Down } else { Direction::Up };
            }
            self.pos = next;
        }
    }

    /// Head for the surface at the left edge, then walk off the map
    fn escape(&mut self, ctx: &EnemyContext, dt: f32) {
        let step = ctx.speed * dt;
        let exit = Vec2::new(0.0, (SKY_ROWS.saturating_sub(1)) as f32 * TILE_SIZE);
        if self.pos.x > 0.0 && self.pos.distance(exit) > ALIGN_EPSILON {
            self.drift_toward(exit, step, ctx.grid);
        } else if (self.pos.y - exit.y).abs() > step {
            // At the edge but below the surface: climb before walking off
            self.drift_toward(Vec2::new(self.pos.x, exit.y), step, ctx.grid);
        } else {
            self.pos.y = exit.y;
            self.pos.x -= step;
            self.direction = Direction::Left;
            if self.pos.x <= -TILE_SIZE {
                log::debug!("Enemy {} escaped", self.id);
                self.destroyed = true;
                self.escaped = true;
            }
        }
    }
}

/// Spawn direction: any open horizontal neighbour first, then vertical
pub fn initial_direction(grid: &Grid, col: i32, row: i32) -> Direction {
    [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ]
    .into_iter()
    .find(|dir| {
        let (dc, dr) = dir.offset();
        grid.is_empty(col + dc, row + dr)
    })
    .unwrap_or(Direction::Right)
}
