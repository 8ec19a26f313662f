//! Replays a recorded frame log through a ruleset.
//!
//! Every frame after the first must be reproducible from the frame before it
//! and the moves recorded for its turn. The first frame that is not
//! reproduced is reported.

use super::{Game, GameFrame, Ruleset, SnakeUpdate};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    #[error("frame log is empty")]
    EmptyLog,
    #[error("expected {expected} move sets for {frames} frames, got {actual}")]
    MoveCountMismatch {
        frames: usize,
        expected: usize,
        actual: usize,
    },
    #[error("turn {turn} diverged from the recorded frame")]
    Diverged {
        turn: u32,
        expected: Box<GameFrame>,
        actual: Box<GameFrame>,
    },
}

/// Check that `frames` is exactly what `ruleset` produces when fed `moves`.
///
/// `moves[i]` holds the moves that turned `frames[i]` into `frames[i + 1]`.
pub fn verify(
    ruleset: &dyn Ruleset,
    game: &Game,
    frames: &[GameFrame],
    moves: &[Vec<SnakeUpdate>],
) -> Result<(), ReplayError> {
    let Some((first, rest)) = frames.split_first() else {
        return Err(ReplayError::EmptyLog);
    };

    if moves.len() != rest.len() {
        return Err(ReplayError::MoveCountMismatch {
            frames: frames.len(),
            expected: rest.len(),
            actual: moves.len(),
        });
    }

    let mut previous = first.clone();
    for (recorded, turn_moves) in rest.iter().zip(moves) {
        let computed = ruleset.tick(game, &previous, turn_moves);
        if computed != *recorded {
            return Err(ReplayError::Diverged {
                turn: recorded.turn,
                expected: Box::new(recorded.clone()),
                actual: Box::new(computed),
            });
        }
        previous = computed;
    }

    Ok(())
}
