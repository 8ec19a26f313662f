use super::*;

pub(crate) fn game_with_snakes(width: i32, height: i32, ids: &[&str]) -> Game {
    Game {
        id: "test-game".to_string(),
        width,
        height,
        ruleset: "standard".to_string(),
        status: GameStatus::Running,
        snakes: ids
            .iter()
            .map(|id| GameSnake {
                id: id.to_string(),
                name: format!("Snake {id}"),
                url: format!("http://{id}.snakes.test"),
            })
            .collect(),
        snake_timeout_ms: 500,
        max_turns: None,
    }
}

fn snake(id: &str, body: &[(i32, i32)]) -> Snake {
    Snake::new(
        id,
        body.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        100,
    )
}

fn moves(list: &[(&str, Direction)]) -> Vec<SnakeUpdate> {
    list.iter()
        .map(|(id, direction)| SnakeUpdate::new(*id, *direction))
        .collect()
}

#[test]
fn test_eating_on_small_board() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(3, 3, &["a"]);
    let previous = GameFrame::new(vec![snake("a", &[(1, 1), (0, 1)])], vec![Point::new(2, 1)]);

    let frame = ruleset.tick(&game, &previous, &moves(&[("a", Direction::Right)]));

    let a = frame.snake("a").unwrap();
    assert_eq!(frame.turn, previous.turn + 1);
    assert_eq!(a.body, vec![Point::new(2, 1), Point::new(1, 1)]);
    assert_eq!(a.health, 100);
    assert_eq!(a.pending_growth, 1);
    assert!(a.is_alive());
    assert!(frame.deaths.is_empty());
    assert!(!frame.food.contains(&Point::new(2, 1)));
    // The eaten food is replaced somewhere free
    assert_eq!(frame.food.len(), 1);
    assert!(!a.body.contains(&frame.food[0]));
}

#[test]
fn test_growth_applies_on_next_move() {
    let ruleset = StandardRuleset::new(StandardRules {
        min_food: 0,
        ..Default::default()
    });
    let game = game_with_snakes(5, 5, &["a"]);
    let previous = GameFrame::new(vec![snake("a", &[(1, 1), (0, 1)])], vec![Point::new(2, 1)]);

    let mut fed = ruleset.tick(&game, &previous, &moves(&[("a", Direction::Right)]));
    // Drop the replacement so the next move cannot land on food
    fed.food.clear();
    let grown = ruleset.tick(&game, &fed, &moves(&[("a", Direction::Up)]));

    let a = grown.snake("a").unwrap();
    assert_eq!(
        a.body,
        vec![Point::new(2, 2), Point::new(2, 1), Point::new(1, 1)]
    );
    assert_eq!(a.pending_growth, 0);
}

#[test]
fn test_tick_is_deterministic() {
    let ruleset = StandardRuleset::new(StandardRules {
        food_spawn_chance: 0.5,
        min_food: 3,
        ..Default::default()
    });
    let game = game_with_snakes(11, 11, &["a", "b", "c"]);
    let previous = ruleset.initial_frame(&game).unwrap();
    let turn_moves = moves(&[
        ("a", Direction::Up),
        ("b", Direction::Down),
        ("c", Direction::Right),
    ]);

    let first = ruleset.tick(&game, &previous, &turn_moves);
    let second = ruleset.tick(&game, &previous, &turn_moves);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn test_wall_collision() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(7, 7, &["a", "b"]);
    let previous = GameFrame::new(
        vec![snake("a", &[(0, 3), (1, 3)]), snake("b", &[(5, 5), (5, 4)])],
        vec![Point::new(6, 0)],
    );

    let frame = ruleset.tick(
        &game,
        &previous,
        &moves(&[("a", Direction::Left), ("b", Direction::Up)]),
    );

    assert_eq!(
        frame.deaths,
        vec![DeathUpdate {
            snake_id: "a".to_string(),
            cause: DeathCause::OutOfBounds,
            turn: 1,
        }]
    );
    assert!(!frame.snake("a").unwrap().is_alive());
    assert!(frame.snake("b").unwrap().is_alive());
}

#[test]
fn test_head_to_head_equal_length_both_die() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(7, 7, &["a", "b"]);
    let previous = GameFrame::new(
        vec![snake("a", &[(2, 3), (1, 3)]), snake("b", &[(4, 3), (5, 3)])],
        vec![Point::new(0, 0)],
    );

    let frame = ruleset.tick(
        &game,
        &previous,
        &moves(&[("a", Direction::Right), ("b", Direction::Left)]),
    );

    assert_eq!(frame.deaths.len(), 2);
    assert!(frame.deaths.iter().all(|d| matches!(d.cause, DeathCause::HeadToHead { .. })));
    assert_eq!(frame.alive_count(), 0);
    assert!(is_game_over(&frame));
    assert_eq!(get_winner(&frame), None);
}

#[test]
fn test_head_to_head_longer_snake_survives() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(7, 7, &["a", "b"]);
    let previous = GameFrame::new(
        vec![
            snake("a", &[(2, 3), (1, 3), (0, 3)]),
            snake("b", &[(4, 3), (5, 3)]),
        ],
        vec![Point::new(0, 0)],
    );

    let frame = ruleset.tick(
        &game,
        &previous,
        &moves(&[("a", Direction::Right), ("b", Direction::Left)]),
    );

    assert_eq!(
        frame.deaths,
        vec![DeathUpdate {
            snake_id: "b".to_string(),
            cause: DeathCause::HeadToHead {
                other_snake_id: "a".to_string()
            },
            turn: 1,
        }]
    );
    assert!(frame.snake("a").unwrap().is_alive());
    assert_eq!(get_winner(&frame), Some("a"));
}

#[test]
fn test_head_to_head_three_way() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(11, 11, &["a", "b", "c"]);
    let previous = GameFrame::new(
        vec![
            snake("a", &[(4, 5), (3, 5), (2, 5), (1, 5)]),
            snake("b", &[(6, 5), (7, 5), (8, 5)]),
            snake("c", &[(5, 4), (5, 3), (5, 2)]),
        ],
        vec![Point::new(0, 0)],
    );

    let frame = ruleset.tick(
        &game,
        &previous,
        &moves(&[
            ("a", Direction::Right),
            ("b", Direction::Left),
            ("c", Direction::Up),
        ]),
    );

    let mut dead: Vec<&str> = frame.deaths.iter().map(|d| d.snake_id.as_str()).collect();
    dead.sort();
    assert_eq!(dead, vec!["b", "c"]);
    for death in &frame.deaths {
        assert_eq!(
            death.cause,
            DeathCause::HeadToHead {
                other_snake_id: "a".to_string()
            }
        );
    }
    let a = frame.snake("a").unwrap();
    assert!(a.is_alive());
    assert_eq!(a.head(), Some(Point::new(5, 5)));
    assert_eq!(get_winner(&frame), Some("a"));
}

#[test]
fn test_body_collision() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(7, 7, &["a", "b"]);
    let previous = GameFrame::new(
        vec![
            snake("a", &[(2, 3), (2, 2)]),
            snake("b", &[(3, 4), (2, 4), (1, 4)]),
        ],
        vec![Point::new(0, 0)],
    );

    let frame = ruleset.tick(
        &game,
        &previous,
        &moves(&[("a", Direction::Up), ("b", Direction::Right)]),
    );

    assert_eq!(frame.deaths.len(), 1);
    assert_eq!(frame.deaths[0].snake_id, "a");
    assert_eq!(
        frame.deaths[0].cause,
        DeathCause::SnakeCollision {
            other_snake_id: "b".to_string()
        }
    );
}

#[test]
fn test_self_collision_when_reversing() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(7, 7, &["a"]);
    let previous = GameFrame::new(
        vec![snake("a", &[(2, 2), (2, 1), (2, 0)])],
        vec![Point::new(6, 6)],
    );

    let frame = ruleset.tick(&game, &previous, &moves(&[("a", Direction::Down)]));

    assert_eq!(frame.deaths[0].cause, DeathCause::SelfCollision);
    assert!(is_game_over(&frame));
}

#[test]
fn test_starvation_freezes_snake() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(11, 11, &["a", "b"]);
    let mut hungry = snake("a", &[(2, 2), (2, 1)]);
    hungry.health = 1;
    let previous = GameFrame::new(
        vec![hungry, snake("b", &[(8, 8), (8, 7)])],
        vec![Point::new(10, 0)],
    );

    let frame = ruleset.tick(
        &game,
        &previous,
        &moves(&[("a", Direction::Up), ("b", Direction::Up)]),
    );

    let a = frame.snake("a").unwrap();
    assert_eq!(a.health, 0);
    assert_eq!(
        a.death,
        Some(Death {
            cause: DeathCause::Starvation,
            turn: 1
        })
    );
    assert_eq!(frame.deaths[0].cause, DeathCause::Starvation);

    let frozen_body = a.body.clone();
    let mut later = frame;
    for _ in 0..3 {
        later = ruleset.tick(
            &game,
            &later,
            &moves(&[("a", Direction::Left), ("b", Direction::Left)]),
        );
        let a = later.snake("a").unwrap();
        assert_eq!(a.body, frozen_body);
        assert_eq!(a.health, 0);
        // Deaths are only reported on the turn they happen
        assert!(later.deaths.iter().all(|d| d.snake_id != "a"));
    }
}

#[test]
fn test_dead_snakes_do_not_collide() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(7, 7, &["a", "b", "c"]);
    let mut dead = snake("c", &[(3, 3), (4, 3)]);
    dead.death = Some(Death {
        cause: DeathCause::Starvation,
        turn: 0,
    });
    let previous = GameFrame::new(
        vec![
            snake("a", &[(2, 3), (1, 3)]),
            snake("b", &[(5, 5), (5, 4)]),
            dead,
        ],
        vec![Point::new(0, 0)],
    );

    let frame = ruleset.tick(
        &game,
        &previous,
        &moves(&[
            ("a", Direction::Right),
            ("b", Direction::Up),
            ("c", Direction::Up),
        ]),
    );

    assert!(frame.deaths.is_empty());
    assert_eq!(frame.snake("c").unwrap().body, previous.snakes[2].body);
}

#[test]
fn test_missing_and_invalid_moves_continue_heading() {
    let ruleset = StandardRuleset::default();
    let game = game_with_snakes(7, 7, &["a", "b"]);
    let previous = GameFrame::new(
        vec![snake("a", &[(2, 2), (1, 2)]), snake("b", &[(4, 4), (4, 4)])],
        vec![Point::new(0, 0)],
    );
    let turn_moves = vec![SnakeUpdate {
        snake_id: "b".to_string(),
        direction: None,
        latency_ms: None,
        timed_out: true,
    }];

    let frame = ruleset.tick(&game, &previous, &turn_moves);

    // a keeps going right, b has no heading yet and goes up
    assert_eq!(frame.snake("a").unwrap().head(), Some(Point::new(3, 2)));
    assert_eq!(frame.snake("b").unwrap().head(), Some(Point::new(4, 5)));
    assert_eq!(
        frame.issues,
        vec![
            TurnIssue::NoMove {
                snake_id: "a".to_string()
            },
            TurnIssue::InvalidMove {
                snake_id: "b".to_string()
            },
        ]
    );
}

#[test]
fn test_food_is_removed_once_and_never_duplicated() {
    let ruleset = StandardRuleset::new(StandardRules {
        min_food: 4,
        ..Default::default()
    });
    let game = game_with_snakes(7, 7, &["a", "b"]);
    let mut frame = GameFrame::new(
        vec![snake("a", &[(2, 2), (1, 2)]), snake("b", &[(4, 4), (4, 5)])],
        vec![Point::new(2, 2), Point::new(5, 5), Point::new(2, 2)],
    );

    let eaten = ruleset.check_for_snakes_eating(&frame);
    assert_eq!(eaten, vec![Point::new(2, 2)]);

    let food = ruleset.update_food(&game, &mut frame, &eaten).unwrap();

    assert_eq!(food.len(), 4);
    assert!(!food.contains(&Point::new(2, 2)));
    assert!(food.contains(&Point::new(5, 5)));
    let unique: std::collections::HashSet<_> = food.iter().collect();
    assert_eq!(unique.len(), food.len());
    assert_eq!(frame.snake("a").unwrap().pending_growth, 1);
}

#[test]
fn test_food_shortfall_keeps_the_turn() {
    let ruleset = StandardRuleset::new(StandardRules {
        min_food: 10,
        ..Default::default()
    });
    let game = game_with_snakes(3, 3, &["a"]);
    let previous = GameFrame::new(vec![snake("a", &[(1, 1), (0, 1)])], Vec::new());

    let mut staged = previous.clone();
    staged.turn = 1;
    let err = ruleset.update_food(&game, &mut staged, &[]).unwrap_err();
    assert!(matches!(
        err,
        FoodError::NoSpawnLocation {
            requested: 10,
            placed: 7,
            ..
        }
    ));

    let frame = ruleset.tick(&game, &previous, &moves(&[("a", Direction::Up)]));

    assert_eq!(frame.turn, 1);
    assert_eq!(frame.food.len(), 7);
    assert_eq!(
        frame.issues,
        vec![TurnIssue::FoodShortfall {
            requested: 10,
            placed: 7
        }]
    );
    assert!(frame.snake("a").unwrap().is_alive());
}

#[test]
fn test_game_over_detection() {
    let mut frame = GameFrame::new(
        vec![
            snake("a", &[(1, 1)]),
            snake("b", &[(3, 3)]),
            snake("c", &[(5, 5)]),
        ],
        Vec::new(),
    );
    let dead = Some(Death {
        cause: DeathCause::OutOfBounds,
        turn: 1,
    });

    frame.snakes[0].death = dead.clone();
    assert!(!is_game_over(&frame));

    frame.snakes[1].death = dead.clone();
    assert!(is_game_over(&frame));
    assert_eq!(get_winner(&frame), Some("c"));

    frame.snakes[2].death = dead;
    assert!(is_game_over(&frame));
    assert_eq!(get_winner(&frame), None);
}

#[test]
fn test_solo_game_runs_until_death() {
    let frame = GameFrame::new(vec![snake("a", &[(1, 1)])], Vec::new());
    assert!(!is_game_over(&frame));
    assert_eq!(get_winner(&frame), None);
}
