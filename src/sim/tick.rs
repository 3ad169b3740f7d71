//! Per-frame simulation step
//!
//! Within one tick the player moves first, then enemies, then rocks, and only
//! then are collisions resolved, in a fixed priority order.

use glam::Vec2;

use super::collision::{Aabb, point_segment_distance};
use super::enemy::{Enemy, EnemyContext, EnemyState};
use super::grid::pixel_to_grid;
use super::level::LevelGenerator;
use super::player::{Player, PlayerState};
use super::rock::Rock;
use super::state::{CRUSH_SCORES, GameEvent, GamePhase, GameState};
use crate::Direction;
use crate::consts::*;

/// Contact boxes are shrunk by this much on every side
pub const CONTACT_MARGIN: f32 = TILE_SIZE * 0.25;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Held movement direction
    pub direction: Option<Direction>,
    /// Attack (pump) held
    pub attack: bool,
    /// Start / confirm pressed this frame
    pub start: bool,
    /// Pause toggle pressed this frame
    pub pause: bool,
    /// Idle/demo mode - AI plays the game
    pub idle_mode: bool,
}

/// Advance the game state by `dt` seconds (capped at `MAX_FRAME_DT`)
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    let dt = dt.clamp(0.0, MAX_FRAME_DT);

    let mut input = *input;
    if input.idle_mode {
        autopilot(state, &mut input);
    }

    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::Paused;
                log::debug!("Paused");
                return;
            }
            GamePhase::Paused => {
                state.phase = GamePhase::Playing;
                log::debug!("Resumed");
            }
            _ => {}
        }
    }

    match state.phase {
        GamePhase::Paused => return,
        GamePhase::Menu => {
            if input.start {
                state.new_run();
            }
        }
        GamePhase::Intro { timer } => {
            let timer = timer + dt;
            state.phase = if timer >= INTRO_DURATION {
                GamePhase::Playing
            } else {
                GamePhase::Intro { timer }
            };
        }
        GamePhase::Playing => update_playing(state, &input, dt),
        GamePhase::Dying => update_dying(state, dt),
        GamePhase::Respawning { timer } => {
            let timer = timer + dt;
            if timer >= RESPAWN_DELAY {
                state.respawn_player();
                state.phase = GamePhase::Playing;
            } else {
                state.phase = GamePhase::Respawning { timer };
            }
        }
        GamePhase::LevelComplete { timer } => {
            let timer = timer + dt;
            if timer >= LEVEL_COMPLETE_DELAY {
                state.level += 1;
                state.start_level();
                state.phase = GamePhase::Playing;
            } else {
                state.phase = GamePhase::LevelComplete { timer };
            }
        }
        GamePhase::GameOver => {
            if input.start {
                log::debug!("Back to menu");
                state.phase = GamePhase::Menu;
            }
        }
    }

    state.time_ticks += 1;
}

fn update_playing(state: &mut GameState, input: &TickInput, dt: f32) {
    // Enemies steer by where the player was before this tick's move
    let player_before = state.player.pos;
    let outcome = state
        .player
        .update(input.direction, input.attack, &mut state.grid, dt);
    if outcome.tiles_dug > 0 {
        state.add_score(DIG_SCORE * u64::from(outcome.tiles_dug), None);
    }

    update_enemies(state, player_before, dt);
    update_rocks(state, dt);
    update_rock_respawn(state, dt);
    update_effects(state, dt);
    update_pinned(state);

    resolve_pump(state, dt);
    resolve_fire(state);
    resolve_rock_player(state);
    resolve_rock_enemies(state);
    resolve_enemy_contact(state);
    resolve_bonus_pickup(state);

    remove_destroyed(state);

    if !state.player.is_alive() {
        log::info!("Player down on level {} ({} lives)", state.level, state.lives);
        state.phase = GamePhase::Dying;
    } else if state.enemies.is_empty() && !state.rocks.iter().any(Rock::is_mid_crush) {
        log::info!("Level {} complete, score {}", state.level, state.score);
        state.events.push(GameEvent::LevelComplete { level: state.level });
        state.phase = GamePhase::LevelComplete { timer: 0.0 };
    }
}

/// Enemies freeze; the death animation and any rock still carrying the
/// player play out.
fn update_dying(state: &mut GameState, dt: f32) {
    let outcome = state.player.update(None, false, &mut state.grid, dt);
    update_rocks(state, dt);
    update_effects(state, dt);
    update_pinned(state);
    resolve_rock_enemies(state);
    remove_destroyed(state);

    if outcome.death_finished {
        state.lives = state.lives.saturating_sub(1);
        state.events.push(GameEvent::LifeLost { lives: state.lives });
        if state.lives == 0 {
            log::info!("Game over at level {} with {}", state.level, state.score);
            state.events.push(GameEvent::GameOver {
                score: state.score,
                level: state.level,
            });
            state.phase = GamePhase::GameOver;
        } else {
            state.phase = GamePhase::Respawning { timer: 0.0 };
        }
    }
}

fn update_enemies(state: &mut GameState, player_pos: Vec2, dt: f32) {
    let active: Vec<usize> = state
        .enemies
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            !e.destroyed && !matches!(e.state, EnemyState::Popped { .. } | EnemyState::Smooshed { .. })
        })
        .map(|(i, _)| i)
        .collect();

    // The last enemy standing makes a run for it after a while
    if let [only] = active.as_slice() {
        let enemy = &mut state.enemies[*only];
        enemy.sole_survivor = true;
        state.session.survivor_timer += dt;
        if state.session.survivor_timer >= ESCAPE_DELAY && enemy.state == EnemyState::Roaming {
            enemy.start_escape();
        }
    } else {
        state.session.survivor_timer = 0.0;
        for enemy in &mut state.enemies {
            enemy.sole_survivor = false;
        }
    }

    let level = state.level;
    let ctx = EnemyContext {
        grid: &state.grid,
        player_pos,
        player_alive: state.player.is_alive(),
        speed: state.tuning.enemy_speed(level),
        ghost_speed: state.tuning.ghost_speed(level),
        ghost_interval: state.tuning.ghost_interval(level),
    };
    for enemy in &mut state.enemies {
        enemy.update(&ctx, dt);
    }
}

fn update_rocks(state: &mut GameState, dt: f32) {
    let trigger = state.player.is_alive().then_some(state.player.pos);
    for rock in &mut state.rocks {
        let outcome = rock.update(&mut state.grid, trigger, dt);
        if outcome.started_falling {
            state.session.rocks_dropped += 1;
        }
    }
}

/// A board without rocks gets a new one after a delay
fn update_rock_respawn(state: &mut GameState, dt: f32) {
    if state.rocks.iter().any(|r| !r.is_destroyed()) {
        state.session.rock_respawn_timer = 0.0;
        return;
    }
    state.session.rock_respawn_timer += dt;
    if state.session.rock_respawn_timer < ROCK_RESPAWN_DELAY {
        return;
    }
    state.session.rock_respawn_timer = 0.0;

    let enemies: Vec<(i32, i32)> = state
        .enemies
        .iter()
        .map(|e| pixel_to_grid(e.center()))
        .collect();
    let player = pixel_to_grid(state.player.center());
    let rng = state.rng_state.next_rng();
    let placed = LevelGenerator::new(rng, &state.tuning).respawn_rock(&mut state.grid, &enemies, player);

    if let Some((col, row)) = placed {
        let id = state.next_entity_id();
        log::debug!("Rock {id} respawned at ({col}, {row})");
        state.rocks.push(Rock::new(id, col, row));
    }
}

fn update_effects(state: &mut GameState, dt: f32) {
    for bonus in &mut state.bonuses {
        bonus.ttl -= dt;
    }
    state.bonuses.retain(|b| b.ttl > 0.0);

    for score in &mut state.floating_scores {
        score.ttl -= dt;
        score.pos.y -= FLOATING_SCORE_RISE * dt;
    }
    state.floating_scores.retain(|s| s.ttl > 0.0);
}

fn live_rock(rocks: &[Rock], id: u32) -> Option<&Rock> {
    rocks.iter().find(|r| r.id == id && !r.is_destroyed())
}

/// Entities pinned under a rock follow it until the rock is gone
fn update_pinned(state: &mut GameState) {
    for enemy in &mut state.enemies {
        if let EnemyState::Smooshed { rock_id } = enemy.state {
            match live_rock(&state.rocks, rock_id) {
                Some(rock) => enemy.pos = rock.pos,
                None => enemy.destroyed = true,
            }
        }
    }

    if let PlayerState::Smooshed { rock_id } = state.player.state {
        match live_rock(&state.rocks, rock_id) {
            Some(rock) => state.player.pos = rock.pos,
            None => state.player.finish_smoosh(),
        }
    }
}

/// Nearest enemy the extended pump line touches, if any
pub fn acquire_pump_target(player: &Player, enemies: &[Enemy]) -> Option<u32> {
    let origin = player.center();
    let end = player.pump_endpoint();
    let forward = player.pump.direction.vector();

    enemies
        .iter()
        .filter(|e| e.is_pumpable())
        .filter_map(|e| {
            let center = e.center();
            let to_enemy = center - origin;
            let distance = to_enemy.length();
            let hit = point_segment_distance(center, origin, end) < PUMP_HIT_THRESHOLD
                && distance <= player.pump.length
                && forward.dot(to_enemy) > 0.0;
            hit.then_some((e.id, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

fn resolve_pump(state: &mut GameState, dt: f32) {
    if !state.player.is_pumping() {
        return;
    }

    let target = match state.player.pump.target {
        Some(id) => id,
        None => {
            if state.player.pump.is_retracting() {
                return;
            }
            let Some(id) = acquire_pump_target(&state.player, &state.enemies) else {
                return;
            };
            log::debug!("Pump locked on enemy {id}");
            state.player.pump.target = Some(id);
            id
        }
    };

    let horizontal = state.player.pump.direction.is_horizontal();
    let grid_height = state.grid.height();
    let popped = match state
        .enemies
        .iter_mut()
        .find(|e| e.id == target && e.is_pumpable())
    {
        Some(enemy) => enemy
            .pump(dt, horizontal)
            .then(|| (enemy.pop_score(grid_height), enemy.pos)),
        None => {
            // Target vanished (crushed, escaped) since it was locked
            state.player.pump.release_target();
            return;
        }
    };

    if let Some((points, at)) = popped {
        state.player.pump.release_target();
        state.add_score(points, Some(at));
    }
}

fn player_hitbox(player: &Player) -> Aabb {
    Aabb::tile(player.pos).shrink(CONTACT_MARGIN)
}

fn resolve_fire(state: &mut GameState) {
    let player = &state.player;
    if !player.is_alive() || player.is_invincible() {
        return;
    }
    let hitbox = player_hitbox(player);
    if state
        .enemies
        .iter()
        .filter_map(Enemy::fire_hitbox)
        .any(|flame| flame.overlaps(&hitbox))
    {
        log::debug!("Player burned");
        state.player.kill();
    }
}

/// Falling rocks pin the player regardless of invincibility
fn resolve_rock_player(state: &mut GameState) {
    if !state.player.is_alive() {
        return;
    }
    let hitbox = player_hitbox(&state.player);
    let player_y = state.player.pos.y;
    if let Some(rock) = state
        .rocks
        .iter_mut()
        .find(|r| r.is_falling() && player_y > r.pos.y && r.hitbox().overlaps(&hitbox))
    {
        rock.carrying_player = true;
        state.player.smoosh(rock.id);
    }
}

fn resolve_rock_enemies(state: &mut GameState) {
    let mut crushes: Vec<(u64, Vec2)> = Vec::new();
    for rock in state.rocks.iter_mut().filter(|r| r.is_falling()) {
        let rock_box = rock.hitbox();
        for enemy in state.enemies.iter_mut().filter(|e| e.is_crushable()) {
            let below = enemy.center().y > rock.pos.y + TILE_SIZE * 0.5;
            if below && rock_box.overlaps(&Aabb::tile(enemy.pos).shrink(CONTACT_MARGIN)) {
                enemy.smoosh(rock.id);
                rock.crushed.push(enemy.id);
                let nth = rock.crushed.len().min(CRUSH_SCORES.len()) - 1;
                log::debug!("Rock {} crushed enemy {} (#{})", rock.id, enemy.id, nth + 1);
                crushes.push((CRUSH_SCORES[nth], enemy.pos));
            }
        }
    }
    for (points, at) in crushes {
        state.add_score(points, Some(at));
    }

    if !state.session.bonus_spawned && state.session.rocks_dropped >= BONUS_ROCK_MILESTONE {
        state.spawn_bonus();
    }
}

fn resolve_enemy_contact(state: &mut GameState) {
    let player = &state.player;
    if !player.is_alive() || player.is_invincible() {
        return;
    }
    let hitbox = player_hitbox(player);
    if state
        .enemies
        .iter()
        .any(|e| e.is_harmful() && Aabb::tile(e.pos).shrink(CONTACT_MARGIN).overlaps(&hitbox))
    {
        state.player.kill();
    }
}

fn resolve_bonus_pickup(state: &mut GameState) {
    if !state.player.is_alive() {
        return;
    }
    let hitbox = player_hitbox(&state.player);
    if let Some(index) = state
        .bonuses
        .iter()
        .position(|b| Aabb::tile(b.pos).overlaps(&hitbox))
    {
        let bonus = state.bonuses.remove(index);
        log::debug!("Bonus {} collected for {}", bonus.index, bonus.value);
        state.add_score(bonus.value, Some(bonus.pos));
    }
}

fn remove_destroyed(state: &mut GameState) {
    state.enemies.retain(|e| !e.destroyed);
    state.rocks.retain(|r| !r.is_destroyed());
}

/// Attract-mode driver: dig toward the nearest enemy and pump when lined up
fn autopilot(state: &GameState, input: &mut TickInput) {
    match state.phase {
        GamePhase::Menu | GamePhase::GameOver => {
            input.start = true;
            return;
        }
        GamePhase::Playing => {}
        _ => return,
    }

    let player = &state.player;
    input.direction = None;
    input.attack = false;
    if !player.is_alive() {
        return;
    }
    if player.is_pumping() {
        input.attack = !player.pump.is_retracting();
        return;
    }

    let origin = player.center();
    let Some(target) = state
        .enemies
        .iter()
        .filter(|e| e.is_pumpable())
        .min_by(|a, b| {
            a.center()
                .distance_squared(origin)
                .total_cmp(&b.center().distance_squared(origin))
        })
    else {
        return;
    };

    let delta = target.center() - origin;
    let toward = if delta.x.abs() >= delta.y.abs() {
        if delta.x > 0.0 { Direction::Right } else { Direction::Left }
    } else if delta.y > 0.0 {
        Direction::Down
    } else {
        Direction::Up
    };

    let lined_up = if toward.is_horizontal() {
        delta.y.abs() < CONTACT_MARGIN
    } else {
        delta.x.abs() < CONTACT_MARGIN
    };
    if lined_up && delta.length() <= PUMP_MAX_LENGTH && player.facing == toward {
        input.attack = !player.needs_release;
    } else {
        input.direction = Some(toward);
    }
}
