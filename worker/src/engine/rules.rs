// Standard ruleset: the five tick stages and the parameters that tune them

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::game_state::{
    Death, DeathCause, DeathUpdate, Direction, Game, GameFrame, Point, SnakeUpdate, TurnIssue,
};
use super::{FoodError, Ruleset};

// Standard rules configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StandardRules {
    pub max_health: i32,
    pub health_cost: i32,
    pub min_food: usize,
    pub food_spawn_chance: f64,
}

impl Default for StandardRules {
    fn default() -> Self {
        Self {
            max_health: 100,
            health_cost: 1,
            min_food: 1,            // Always have at least 1 food
            food_spawn_chance: 0.0, // Only replace what was eaten
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RulesError {
    #[error("max_health must be positive, got {0}")]
    MaxHealth(i32),
    #[error("health_cost must not be negative, got {0}")]
    HealthCost(i32),
    #[error("food_spawn_chance must be within 0..=1, got {0}")]
    FoodSpawnChance(f64),
    #[error("{snakes} snakes do not fit on a {width}x{height} board")]
    TooManySnakes {
        snakes: usize,
        width: i32,
        height: i32,
    },
}

impl StandardRules {
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.max_health <= 0 {
            return Err(RulesError::MaxHealth(self.max_health));
        }
        if self.health_cost < 0 {
            return Err(RulesError::HealthCost(self.health_cost));
        }
        if !(0.0..=1.0).contains(&self.food_spawn_chance) {
            return Err(RulesError::FoodSpawnChance(self.food_spawn_chance));
        }
        Ok(())
    }
}

/// The built-in ruleset. Holds only its parameters, so one instance can be
/// shared by every slot.
#[derive(Debug, Clone, Default)]
pub struct StandardRuleset {
    rules: StandardRules,
}

impl StandardRuleset {
    pub fn new(rules: StandardRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &StandardRules {
        &self.rules
    }
}

impl Ruleset for StandardRuleset {
    fn update_snake_locations(&self, _game: &Game, frame: &mut GameFrame, moves: &[SnakeUpdate]) {
        let mut issues = Vec::new();

        for snake in frame.snakes.iter_mut().filter(|s| s.is_alive()) {
            let Some(head) = snake.head() else {
                continue;
            };

            let requested = moves.iter().find(|m| m.snake_id == snake.id);
            let direction = match requested.map(|m| m.direction) {
                Some(Some(direction)) => direction,
                Some(None) => {
                    issues.push(TurnIssue::InvalidMove {
                        snake_id: snake.id.clone(),
                    });
                    snake.heading().unwrap_or(Direction::Up)
                }
                None => {
                    issues.push(TurnIssue::NoMove {
                        snake_id: snake.id.clone(),
                    });
                    snake.heading().unwrap_or(Direction::Up)
                }
            };

            snake.move_to(head.apply_direction(direction));
        }

        frame.issues.extend(issues);
    }

    fn update_snake_health(&self, frame: &mut GameFrame) {
        for snake in frame.snakes.iter_mut().filter(|s| s.is_alive()) {
            snake.health -= self.rules.health_cost;
        }
    }

    fn check_for_snakes_eating(&self, frame: &GameFrame) -> Vec<Point> {
        let heads: HashSet<Point> = frame.alive_snakes().filter_map(|s| s.head()).collect();

        let mut eaten: Vec<Point> = Vec::new();
        for food in &frame.food {
            if heads.contains(food) && !eaten.contains(food) {
                eaten.push(*food);
            }
        }
        eaten
    }

    fn update_food(
        &self,
        game: &Game,
        frame: &mut GameFrame,
        eaten: &[Point],
    ) -> Result<Vec<Point>, FoodError> {
        let target = frame.food.len().max(self.rules.min_food);

        let mut food: Vec<Point> = Vec::with_capacity(target);
        for point in &frame.food {
            if !eaten.contains(point) && !food.contains(point) {
                food.push(*point);
            }
        }

        for snake in frame.snakes.iter_mut().filter(|s| s.is_alive()) {
            if snake.head().is_some_and(|head| eaten.contains(&head)) {
                snake.health = self.rules.max_health;
                snake.pending_growth += 1;
            }
        }

        let mut rng = StdRng::seed_from_u64(tick_seed(&game.id, frame.turn));
        let mut requested = target.saturating_sub(food.len());
        if self.rules.food_spawn_chance > 0.0 && rng.gen_bool(self.rules.food_spawn_chance) {
            requested += 1;
        }

        if requested == 0 {
            return Ok(food);
        }

        let mut free = unoccupied_points(game, frame, &food);
        free.shuffle(&mut rng);
        let placed = requested.min(free.len());
        food.extend(free.into_iter().take(placed));

        if placed < requested {
            return Err(FoodError::NoSpawnLocation {
                food,
                requested,
                placed,
            });
        }

        Ok(food)
    }

    fn check_for_death(&self, width: i32, height: i32, frame: &GameFrame) -> Vec<DeathUpdate> {
        let mut deaths = Vec::new();

        for snake in frame.alive_snakes() {
            let Some(head) = snake.head() else {
                continue;
            };

            let cause = if !head.in_bounds(width, height) {
                Some(DeathCause::OutOfBounds)
            } else if snake.health <= 0 {
                Some(DeathCause::Starvation)
            } else if snake.body[1..].contains(&head) {
                Some(DeathCause::SelfCollision)
            } else {
                collision_with_others(snake, frame)
            };

            if let Some(cause) = cause {
                deaths.push(DeathUpdate {
                    snake_id: snake.id.clone(),
                    cause,
                    turn: frame.turn,
                });
            }
        }

        deaths
    }
}

impl StandardRuleset {
    /// Turn 0 for a freshly started game: every snake stacked on its own
    /// start cell, one food per snake.
    pub fn initial_frame(&self, game: &Game) -> Result<GameFrame, RulesError> {
        let mut rng = StdRng::seed_from_u64(tick_seed(&game.id, 0));
        let positions = starting_positions(game, &mut rng)?;

        let snakes: Vec<_> = game
            .snakes
            .iter()
            .zip(positions)
            .map(|(snake, start)| {
                super::Snake::new(snake.id.clone(), vec![start; 3], self.rules.max_health)
            })
            .collect();

        let mut frame = GameFrame::new(snakes, Vec::new());
        let mut free = unoccupied_points(game, &frame, &[]);
        free.shuffle(&mut rng);
        let count = game.snakes.len().max(self.rules.min_food);
        frame.food = free.into_iter().take(count).collect();
        Ok(frame)
    }
}

/// One distinct cell per snake: corners first, then edge midpoints, then
/// random free cells once the fixed spots run out or collapse on a small
/// board.
fn starting_positions(game: &Game, rng: &mut StdRng) -> Result<Vec<Point>, RulesError> {
    let (width, height) = (game.width, game.height);
    let count = game.snakes.len();
    let preferred = [
        Point::new(1, 1),
        Point::new(width - 2, height - 2),
        Point::new(1, height - 2),
        Point::new(width - 2, 1),
        Point::new(width / 2, 1),
        Point::new(width / 2, height - 2),
        Point::new(1, height / 2),
        Point::new(width - 2, height / 2),
    ];

    let mut positions: Vec<Point> = Vec::with_capacity(count);
    for point in preferred {
        if positions.len() == count {
            break;
        }
        if point.in_bounds(width, height) && !positions.contains(&point) {
            positions.push(point);
        }
    }

    let missing = count - positions.len();
    if missing > 0 {
        let mut free: Vec<Point> = (0..height)
            .flat_map(|y| (0..width).map(move |x| Point::new(x, y)))
            .filter(|point| !positions.contains(point))
            .collect();
        if free.len() < missing {
            return Err(RulesError::TooManySnakes {
                snakes: count,
                width,
                height,
            });
        }
        free.shuffle(rng);
        positions.extend(free.into_iter().take(missing));
    }

    Ok(positions)
}

// Body collisions win over head-to-head so the reported cause names the body
// that was hit.
fn collision_with_others(snake: &super::Snake, frame: &GameFrame) -> Option<DeathCause> {
    let head = snake.head()?;

    for other in frame.alive_snakes().filter(|o| o.id != snake.id) {
        if other.body.iter().skip(1).any(|p| *p == head) {
            return Some(DeathCause::SnakeCollision {
                other_snake_id: other.id.clone(),
            });
        }
    }

    // Equal length counts as a loss for both snakes
    frame
        .alive_snakes()
        .filter(|o| o.id != snake.id)
        .find(|o| o.head() == Some(head) && snake.body.len() <= o.body.len())
        .map(|o| DeathCause::HeadToHead {
            other_snake_id: o.id.clone(),
        })
}

/// Free cells in row-major order, so the shuffle is the only source of
/// variation for a given seed.
fn unoccupied_points(game: &Game, frame: &GameFrame, food: &[Point]) -> Vec<Point> {
    let occupied: HashSet<Point> = frame
        .alive_snakes()
        .flat_map(|s| s.body.iter().copied())
        .chain(food.iter().copied())
        .collect();

    let mut free = Vec::new();
    for y in 0..game.height {
        for x in 0..game.width {
            let point = Point::new(x, y);
            if !occupied.contains(&point) {
                free.push(point);
            }
        }
    }
    free
}

/// Seed for the food RNG of one turn, stable across processes
pub(crate) fn tick_seed(game_id: &str, turn: u32) -> u64 {
    let hash = game_id
        .bytes()
        .fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    hash ^ (turn as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

pub(crate) fn record_deaths(frame: &mut GameFrame, deaths: Vec<DeathUpdate>) {
    for update in &deaths {
        if let Some(snake) = frame
            .snakes
            .iter_mut()
            .find(|s| s.id == update.snake_id && s.is_alive())
        {
            snake.health = snake.health.max(0);
            snake.death = Some(Death {
                cause: update.cause.clone(),
                turn: update.turn,
            });
        }
    }
    frame.deaths.extend(deaths);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        assert!(StandardRules::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let rules = StandardRules {
            food_spawn_chance: 1.5,
            ..Default::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::FoodSpawnChance(1.5)));

        let rules = StandardRules {
            max_health: 0,
            ..Default::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::MaxHealth(0)));

        let rules = StandardRules {
            health_cost: -1,
            ..Default::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::HealthCost(-1)));
    }

    #[test]
    fn test_initial_frame() {
        let game = crate::engine::tests::game_with_snakes(11, 11, &["a", "b"]);
        let frame = StandardRuleset::default().initial_frame(&game).unwrap();

        assert_eq!(frame.turn, 0);
        assert_eq!(frame.snakes.len(), 2);
        assert_eq!(frame.snakes[0].body, vec![Point::new(1, 1); 3]);
        assert_eq!(frame.snakes[1].body, vec![Point::new(9, 9); 3]);
        assert!(frame.snakes.iter().all(|s| s.health == 100 && s.is_alive()));
        assert_eq!(frame.food.len(), 2);
        assert!(frame.food.iter().all(|f| f.in_bounds(11, 11)));
    }

    fn distinct_heads(frame: &GameFrame) -> HashSet<Point> {
        frame.snakes.iter().filter_map(|s| s.head()).collect()
    }

    #[test]
    fn test_every_snake_gets_a_start_cell() {
        let ids = ["a", "b", "c", "d", "e", "f", "g", "h", "i"];
        let game = crate::engine::tests::game_with_snakes(11, 11, &ids);
        let frame = StandardRuleset::default().initial_frame(&game).unwrap();

        let placed: Vec<&str> = frame.snakes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(placed, ids);
        assert_eq!(distinct_heads(&frame).len(), ids.len());
        assert!(distinct_heads(&frame).iter().all(|p| p.in_bounds(11, 11)));
    }

    #[test]
    fn test_small_board_starts_do_not_overlap() {
        let game = crate::engine::tests::game_with_snakes(3, 3, &["a", "b"]);
        let ruleset = StandardRuleset::default();
        let frame = ruleset.initial_frame(&game).unwrap();

        assert_eq!(frame.snakes.len(), 2);
        assert_eq!(distinct_heads(&frame).len(), 2);
        assert_eq!(frame, ruleset.initial_frame(&game).unwrap());

        // A full board still seats everyone
        let ids = ["a", "b", "c", "d", "e", "f", "g", "h", "i"];
        let full = crate::engine::tests::game_with_snakes(3, 3, &ids);
        let frame = ruleset.initial_frame(&full).unwrap();
        assert_eq!(distinct_heads(&frame).len(), 9);
    }

    #[test]
    fn test_unseatable_game_is_rejected() {
        let ids = ["a", "b", "c", "d", "e"];
        let game = crate::engine::tests::game_with_snakes(2, 2, &ids);

        assert_eq!(
            StandardRuleset::default().initial_frame(&game),
            Err(RulesError::TooManySnakes {
                snakes: 5,
                width: 2,
                height: 2
            })
        );
    }

    #[test]
    fn test_tick_seed_is_stable() {
        assert_eq!(tick_seed("game-1", 4), tick_seed("game-1", 4));
        assert_ne!(tick_seed("game-1", 4), tick_seed("game-1", 5));
        assert_ne!(tick_seed("game-1", 4), tick_seed("game-2", 4));
    }
}
