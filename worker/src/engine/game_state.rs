// Game and frame representation shared by the worker and the controller

use serde::{Deserialize, Serialize};

pub const DEFAULT_RULESET: &str = "standard";
pub const DEFAULT_SNAKE_TIMEOUT_MS: u64 = 500;

// 2D coordinate on the game board. Signed so a head that left the board is
// still representable until the death check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn apply_direction(&self, direction: Direction) -> Point {
        match direction {
            Direction::Up => Point::new(self.x, self.y + 1),
            Direction::Down => Point::new(self.x, self.y - 1),
            Direction::Left => Point::new(self.x - 1, self.y),
            Direction::Right => Point::new(self.x + 1, self.y),
        }
    }

    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < width && self.y < height
    }
}

// Movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Direction that leads from `from` to the adjacent point `to`
    pub fn between(from: Point, to: Point) -> Option<Self> {
        match (to.x - from.x, to.y - from.y) {
            (0, 1) => Some(Direction::Up),
            (0, -1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Unstarted,
    Running,
    Stopped,
}

/// A participant as registered with the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnake {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// One simulation as stored by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub width: i32,
    pub height: i32,
    #[serde(default = "default_ruleset")]
    pub ruleset: String,
    pub status: GameStatus,
    pub snakes: Vec<GameSnake>,
    #[serde(default = "default_snake_timeout")]
    pub snake_timeout_ms: u64,
    #[serde(default)]
    pub max_turns: Option<u32>,
}

fn default_ruleset() -> String {
    DEFAULT_RULESET.to_string()
}

fn default_snake_timeout() -> u64 {
    DEFAULT_SNAKE_TIMEOUT_MS
}

// Reasons a snake can die
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "kebab-case")]
pub enum DeathCause {
    Starvation,
    OutOfBounds,
    SelfCollision,
    SnakeCollision { other_snake_id: String },
    HeadToHead { other_snake_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Death {
    pub cause: DeathCause,
    pub turn: u32,
}

/// A death produced on a specific turn. Appended to the frame of that turn
/// and never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathUpdate {
    pub snake_id: String,
    pub cause: DeathCause,
    pub turn: u32,
}

/// Problems found while computing a turn. They travel with the frame so the
/// controller sees them instead of the slot failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TurnIssue {
    NoMove { snake_id: String },
    InvalidMove { snake_id: String },
    FoodShortfall { requested: usize, placed: usize },
}

// Snake representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snake {
    pub id: String,
    pub body: Vec<Point>, // Head is at index 0
    pub health: i32,
    #[serde(default)]
    pub pending_growth: u32,
    #[serde(default)]
    pub death: Option<Death>,
}

impl Snake {
    pub fn new(id: impl Into<String>, body: Vec<Point>, health: i32) -> Self {
        Self {
            id: id.into(),
            body,
            health,
            pending_growth: 0,
            death: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.death.is_none()
    }

    pub fn head(&self) -> Option<Point> {
        self.body.first().copied()
    }

    /// Direction the snake is currently travelling, if it has a neck that is
    /// not stacked on the head.
    pub fn heading(&self) -> Option<Direction> {
        match self.body.as_slice() {
            [head, neck, ..] => Direction::between(*neck, *head),
            _ => None,
        }
    }

    pub fn move_to(&mut self, new_head: Point) {
        self.body.insert(0, new_head);
        if self.pending_growth > 0 {
            self.pending_growth -= 1;
        } else {
            self.body.pop();
        }
    }
}

/// One immutable step of a game once published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFrame {
    pub turn: u32,
    pub snakes: Vec<Snake>,
    pub food: Vec<Point>,
    #[serde(default)]
    pub deaths: Vec<DeathUpdate>,
    #[serde(default)]
    pub issues: Vec<TurnIssue>,
}

impl GameFrame {
    pub fn new(snakes: Vec<Snake>, food: Vec<Point>) -> Self {
        Self {
            turn: 0,
            snakes,
            food,
            deaths: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn alive_snakes(&self) -> impl Iterator<Item = &Snake> {
        self.snakes.iter().filter(|s| s.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.alive_snakes().count()
    }

    pub fn snake(&self, id: &str) -> Option<&Snake> {
        self.snakes.iter().find(|s| s.id == id)
    }
}

/// A single snake's chosen direction for the turn being computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnakeUpdate {
    pub snake_id: String,
    /// `None` when the snake did not answer or answered with something that
    /// is not a direction
    pub direction: Option<Direction>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub timed_out: bool,
}

impl SnakeUpdate {
    pub fn new(snake_id: impl Into<String>, direction: Direction) -> Self {
        Self {
            snake_id: snake_id.into(),
            direction: Some(direction),
            latency_ms: None,
            timed_out: false,
        }
    }
}
