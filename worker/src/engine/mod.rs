// Snake game engine
// The per-tick pipeline every ruleset runs, plus the registry of rulesets

pub mod game_state;
pub mod registry;
pub mod replay;
pub mod rules;

#[cfg(test)]
pub(crate) mod tests;

pub use game_state::{
    Death, DeathCause, DeathUpdate, Direction, Game, GameFrame, GameSnake, GameStatus, Point,
    Snake, SnakeUpdate, TurnIssue,
};
pub use registry::RulesetRegistry;
pub use rules::{RulesError, StandardRules, StandardRuleset};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FoodError {
    /// The board ran out of free cells. `food` is the best food set that
    /// could be built and is still usable.
    #[error("no free cell for food: placed {placed} of {requested}")]
    NoSpawnLocation {
        food: Vec<Point>,
        requested: usize,
        placed: usize,
    },
}

/// A set of rules that turns one frame into the next.
///
/// Implementations must not keep per-game state: the same instance is used
/// by every slot at once. The stages are called in the order `tick` lists
/// them and all of them work on the frame being built for the new turn.
pub trait Ruleset: Send + Sync {
    fn update_snake_locations(&self, game: &Game, frame: &mut GameFrame, moves: &[SnakeUpdate]);

    fn update_snake_health(&self, frame: &mut GameFrame);

    fn check_for_snakes_eating(&self, frame: &GameFrame) -> Vec<Point>;

    fn update_food(
        &self,
        game: &Game,
        frame: &mut GameFrame,
        eaten: &[Point],
    ) -> Result<Vec<Point>, FoodError>;

    fn check_for_death(&self, width: i32, height: i32, frame: &GameFrame) -> Vec<DeathUpdate>;

    /// Run one full turn.
    ///
    /// A food spawn failure does not abort the turn: the degraded food set is
    /// kept and the shortfall is recorded on the frame.
    fn tick(&self, game: &Game, previous: &GameFrame, moves: &[SnakeUpdate]) -> GameFrame {
        let mut frame = GameFrame {
            turn: previous.turn + 1,
            snakes: previous.snakes.clone(),
            food: previous.food.clone(),
            deaths: Vec::new(),
            issues: Vec::new(),
        };

        self.update_snake_locations(game, &mut frame, moves);
        self.update_snake_health(&mut frame);
        let eaten = self.check_for_snakes_eating(&frame);
        frame.food = match self.update_food(game, &mut frame, &eaten) {
            Ok(food) => food,
            Err(FoodError::NoSpawnLocation {
                food,
                requested,
                placed,
            }) => {
                tracing::warn!(
                    game_id = %game.id,
                    turn = frame.turn,
                    requested,
                    placed,
                    "Could not place all food, continuing with what fits"
                );
                frame.issues.push(TurnIssue::FoodShortfall { requested, placed });
                food
            }
        };
        let deaths = self.check_for_death(game.width, game.height, &frame);
        rules::record_deaths(&mut frame, deaths);

        frame
    }
}

/// The game is over once at most one snake is left, or none for a solo game
pub fn is_game_over(frame: &GameFrame) -> bool {
    let alive = frame.alive_count();
    if frame.snakes.len() <= 1 {
        alive == 0
    } else {
        alive <= 1
    }
}

pub fn get_winner(frame: &GameFrame) -> Option<&str> {
    let mut alive = frame.alive_snakes();
    match (alive.next(), alive.next()) {
        (Some(winner), None) if frame.snakes.len() > 1 => Some(winner.id.as_str()),
        _ => None,
    }
}
