//! Heuristic scoring of non-terminal positions

use crate::position::{static_masks, Position, Side};
use crate::{HEIGHT, WIDTH};

/// Score of a completed four, used as the saturated win score by the searches
pub const WIN_SCORE: i32 = 100_000_000;
pub const THREE_SCORE: i32 = 1_000;
pub const TWO_SCORE: i32 = 100;
/// An opponent three weighs more than an own three, a missed block loses outright
pub const BLOCK_THREE_SCORE: i32 = 1_200;
pub const BLOCK_TWO_SCORE: i32 = 100;

const CENTER_COLUMN: usize = WIDTH / 2;

const NUM_WINDOWS: usize = (WIDTH - 3) * HEIGHT // horizontal
    + WIDTH * (HEIGHT - 3) // vertical
    + 2 * (WIDTH - 3) * (HEIGHT - 3); // diagonals

/// Every length-4 line on the board as a bitmap
const WINDOWS: [u64; NUM_WINDOWS] = window_masks();

const fn window_masks() -> [u64; NUM_WINDOWS] {
    let mut masks = [0; NUM_WINDOWS];
    let directions: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];
    let mut i = 0;
    let mut d = 0;
    while d < directions.len() {
        let (dc, dr) = directions[d];
        let mut column = 0;
        while column < WIDTH as i32 {
            let mut row = 0;
            while row < HEIGHT as i32 {
                let end_column = column + 3 * dc;
                let end_row = row + 3 * dr;
                if end_column < WIDTH as i32 && end_row >= 0 && end_row < HEIGHT as i32 {
                    let mut mask = 0u64;
                    let mut k = 0;
                    while k < 4 {
                        let c = (column + k * dc) as usize;
                        let r = (row + k * dr) as usize;
                        mask |= 1 << (c * (HEIGHT + 1) + r);
                        k += 1;
                    }
                    masks[i] = mask;
                    i += 1;
                }
                row += 1;
            }
            column += 1;
        }
        d += 1;
    }
    masks
}

fn window_score(own: u32, opponent: u32) -> i64 {
    let score = match (own, opponent) {
        (4, 0) => WIN_SCORE,
        (3, 0) => THREE_SCORE,
        (2, 0) => TWO_SCORE,
        (1, 0) => 1,
        (0, 4) => -WIN_SCORE,
        (0, 3) => -BLOCK_THREE_SCORE,
        (0, 2) => -BLOCK_TWO_SCORE,
        (0, 1) => -1,
        _ => 0,
    };
    score as i64
}

/// Bonuses for the placement of `mask`'s tiles regardless of any line
fn positional_score(mask: u64) -> i64 {
    let count = |m: u64| m.count_ones() as i64;
    let mut score = 0;

    score += count(mask & Position::column_mask(CENTER_COLUMN)) * 3;

    for column in 0..WIDTH {
        let distance = (column as i64 - CENTER_COLUMN as i64).abs();
        score += count(mask & Position::column_mask(column)) * (3 - distance.min(3)) * 5;
    }

    // lower rows are more stable
    for row in 0..HEIGHT {
        let row_mask = static_masks::bottom_mask() << row;
        score += count(mask & row_mask) * (HEIGHT - row) as i64 * 3;
    }

    // adjacent pairs, counted once from each end
    score += count(mask & (mask >> (HEIGHT + 1))) * 2 * 3;
    score += count(mask & (mask << 1)) * 5;
    score += count(mask & (mask >> HEIGHT)) * 2 * 2;
    score += count(mask & (mask >> (HEIGHT + 2))) * 2 * 2;

    score
}

/// Scores `position` from the point of view of `side`; higher is better
///
/// This is a leaf estimate for the search, not a proof of anything: it is only
/// directionally consistent, and the scores for the two sides are not negations
/// of each other.
pub fn evaluate(position: &Position, side: Side) -> i32 {
    let own = position.mask_of(side);
    let opponent = position.mask_of(side.opponent());

    let lines: i64 = WINDOWS
        .iter()
        .map(|&window| window_score((own & window).count_ones(), (opponent & window).count_ones()))
        .sum();

    let score = lines + positional_score(own);
    score.clamp(-10 * WIN_SCORE as i64, 10 * WIN_SCORE as i64) as i32
}
