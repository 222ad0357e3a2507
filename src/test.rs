#[cfg(test)]
pub mod test {
    use anyhow::{anyhow, Result};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use std::collections::HashMap;
    use std::time::Duration;

    use crate::api::{respond, MoveRequest, MoveResponse};
    use crate::config::{BudgetStep, EngineConfig, EngineKind, MctsConfig, NegamaxConfig};
    use crate::evaluation::{evaluate, WIN_SCORE};
    use crate::mcts::{reward_of, Mcts, NodeTable};
    use crate::negamax::{center_most, move_order, Negamax};
    use crate::transposition_table::TranspositionTable;
    use crate::{fallback_move, EngineError, GameResult, MoveSelector, Position, Side};
    use crate::{HEIGHT, WIDTH};

    const LONG: Duration = Duration::from_secs(60);

    fn to_grid(position: &Position) -> [[u8; WIDTH]; HEIGHT] {
        let mut grid = [[0; WIDTH]; HEIGHT];
        for (row, cells) in grid.iter_mut().enumerate() {
            for (column, cell) in cells.iter_mut().enumerate() {
                *cell = position.cell(row, column).map(Side::number).unwrap_or(0);
            }
        }
        grid
    }

    // player 2 has 1-2-3 on the bottom row, both ends open
    fn open_three_grid() -> [[u8; WIDTH]; HEIGHT] {
        [
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 1, 0, 0, 0, 0],
            [0, 2, 2, 2, 0, 1, 1],
        ]
    }

    // player 2 has 1-2-3 on the second row, both ends unsupported
    fn hanging_three_grid() -> [[u8; WIDTH]; HEIGHT] {
        [
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 2, 2, 2, 0, 0, 0],
            [0, 1, 1, 2, 0, 1, 1],
        ]
    }

    fn negamax_config(max_depth: u32, use_transposition_table: bool) -> NegamaxConfig {
        NegamaxConfig {
            max_depth,
            use_transposition_table,
            ..NegamaxConfig::default()
        }
    }

    fn mcts_config(max_iterations: u64) -> MctsConfig {
        MctsConfig {
            max_iterations: Some(max_iterations),
            ..MctsConfig::default()
        }
    }

    fn fixed_config(engine: EngineKind, time_ms: u64, max_depth: Option<u32>) -> EngineConfig {
        EngineConfig {
            engine,
            seed: Some(7),
            schedule: vec![BudgetStep {
                until_move: u32::MAX,
                time_ms,
                max_depth,
            }],
            ..EngineConfig::default()
        }
    }

    // ---- position model ----

    #[test]
    pub fn legal_moves_of_empty_board() {
        let position = Position::new();
        assert_eq!(position.legal_moves(), (0..WIDTH).collect::<Vec<_>>());
        assert_eq!(position.side_to_move(), Side::One);
        assert!(!position.is_terminal());
    }

    #[test]
    pub fn full_column_is_not_legal() -> Result<()> {
        let position = Position::from_moves("111111")?;
        assert_eq!(position.legal_moves(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            position.play(0),
            Err(EngineError::InvalidMove {
                column: 0,
                reason: "is full"
            })
        );
        assert!(matches!(
            position.play(WIDTH),
            Err(EngineError::InvalidMove { .. })
        ));
        Ok(())
    }

    #[test]
    pub fn play_drops_to_lowest_cell() -> Result<()> {
        let position = Position::new().play(3)?;
        assert_eq!(position.cell(HEIGHT - 1, 3), Some(Side::One));
        assert_eq!(position.side_to_move(), Side::Two);
        assert_eq!(position.num_moves(), 1);

        let position = position.play(3)?;
        assert_eq!(position.cell(HEIGHT - 2, 3), Some(Side::Two));
        assert_eq!(position.cell(HEIGHT - 1, 3), Some(Side::One));
        assert_eq!(position.side_to_move(), Side::One);
        assert_eq!(position.num_moves(), 2);
        Ok(())
    }

    #[test]
    pub fn horizontal_and_vertical_wins() -> Result<()> {
        let horizontal = Position::from_moves("1122334")?;
        assert!(horizontal.is_terminal());
        assert_eq!(horizontal.winner(), Some(Side::One));

        let vertical = Position::from_moves("1212121")?;
        assert_eq!(vertical.result(), Some(GameResult::Win(Side::One)));

        let almost = Position::from_moves("121212")?;
        assert!(!almost.is_terminal());
        assert_eq!(almost.winning_moves(Side::One), vec![0]);
        assert_eq!(almost.winning_moves(Side::Two), vec![1]);
        assert!(almost.check_winning_move(0));
        Ok(())
    }

    #[test]
    pub fn diagonal_wins() -> Result<()> {
        let rising = Position::from_grid(
            &[
                [0, 0, 0, 0, 0, 0, 0],
                [0, 0, 0, 0, 0, 0, 0],
                [0, 0, 0, 1, 0, 0, 0],
                [0, 0, 1, 2, 0, 0, 0],
                [0, 1, 2, 2, 0, 0, 0],
                [1, 2, 2, 2, 0, 0, 1],
            ],
            Side::Two,
        )?;
        assert_eq!(rising.winner(), Some(Side::One));

        let falling = Position::from_grid(
            &[
                [0, 0, 0, 0, 0, 0, 0],
                [0, 0, 0, 0, 0, 0, 0],
                [0, 0, 0, 2, 0, 0, 0],
                [0, 0, 0, 1, 2, 0, 0],
                [0, 0, 0, 1, 1, 2, 0],
                [1, 0, 0, 1, 1, 1, 2],
            ],
            Side::One,
        )?;
        assert_eq!(falling.winner(), Some(Side::Two));
        Ok(())
    }

    #[test]
    pub fn full_board_without_line_is_a_draw() -> Result<()> {
        let a = [1, 1, 2, 2, 1, 1, 2];
        let b = [2, 2, 1, 1, 2, 2, 1];
        let position = Position::from_grid(&[a, b, a, b, a, b], Side::One)?;

        assert!(position.is_full());
        assert!(position.is_terminal());
        assert_eq!(position.result(), Some(GameResult::Draw));
        assert_eq!(position.winner(), None);
        assert!(position.legal_moves().is_empty());
        Ok(())
    }

    #[test]
    pub fn transpositions_share_a_key() -> Result<()> {
        let first = Position::from_moves("123")?;
        let second = Position::from_moves("321")?;
        assert_eq!(first, second);
        assert_eq!(first.key(), second.key());

        // same grid, other side to move
        let grid = to_grid(&first);
        let other_side = Position::from_grid(&grid, Side::One)?;
        assert_ne!(other_side.key(), first.key());
        assert_ne!(Position::new().key(), Position::from_grid(&[[0; WIDTH]; HEIGHT], Side::Two)?.key());
        Ok(())
    }

    #[test]
    pub fn from_grid_matches_from_moves() -> Result<()> {
        let position = Position::from_moves("4453")?;
        let grid = [
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 2, 0, 0, 0],
            [0, 0, 2, 1, 1, 0, 0],
        ];
        assert_eq!(Position::from_grid(&grid, Side::One)?, position);
        Ok(())
    }

    #[test]
    pub fn from_grid_rejects_bad_boards() {
        let mut floating = [[0; WIDTH]; HEIGHT];
        floating[3][2] = 1;
        assert!(matches!(
            Position::from_grid(&floating, Side::One),
            Err(EngineError::InvalidBoard(_))
        ));

        let mut unknown = [[0; WIDTH]; HEIGHT];
        unknown[HEIGHT - 1][0] = 3;
        assert!(matches!(
            Position::from_grid(&unknown, Side::One),
            Err(EngineError::InvalidBoard(_))
        ));
    }

    #[test]
    pub fn from_moves_rejects_bad_input() {
        assert!(Position::from_moves("1111111").is_err());
        assert!(Position::from_moves("18").is_err());
        // game over after the 7th move
        assert!(Position::from_moves("12121212").is_err());
    }

    // ---- evaluation ----

    #[test]
    pub fn evaluation_prefers_center() -> Result<()> {
        let center = Position::from_moves("4")?;
        let edge = Position::from_moves("1")?;
        assert!(evaluate(&center, Side::One) > evaluate(&edge, Side::One));
        Ok(())
    }

    #[test]
    pub fn evaluation_punishes_open_opponent_three() -> Result<()> {
        let position = Position::from_grid(&open_three_grid(), Side::One)?;
        assert!(evaluate(&position, Side::One) < 0);
        assert!(evaluate(&position, Side::Two) > evaluate(&position, Side::One));
        Ok(())
    }

    // ---- transposition table ----

    #[test]
    pub fn table_checks_full_key() {
        let mut table = TranspositionTable::with_capacity(7);
        assert!(table.is_empty());
        table.set(3, 42, 2, Some(1), true);
        assert!(!table.is_empty());
        assert_eq!(table.get(3).map(|entry| entry.score), Some(42));
        // same slot, different key
        assert_eq!(table.get(10), None);

        table.set(10, -5, 1, None, false);
        assert_eq!(table.get(3), None);
        let entry = table.get(10).unwrap();
        assert!(!entry.trusted_for(1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    pub fn only_exact_deep_entries_are_trusted() {
        let mut table = TranspositionTable::new();
        table.set(99, 10, 4, Some(3), true);
        let entry = table.get(99).unwrap();
        assert!(entry.trusted_for(4));
        assert!(entry.trusted_for(2));
        assert!(!entry.trusted_for(5));
    }

    // ---- negamax ----

    #[test]
    pub fn move_order_is_center_out() {
        assert_eq!(move_order(), [3, 4, 2, 5, 1, 6, 0]);
        assert_eq!(center_most(&[0, 4]), Some(4));
        assert_eq!(center_most(&[]), None);
    }

    #[test]
    pub fn negamax_takes_immediate_win() -> Result<()> {
        // three of player 1 stacked in column 3 (index 2)
        let position = Position::from_moves("313237")?;
        assert_eq!(position.side_to_move(), Side::One);

        let report = Negamax::new(position, NegamaxConfig::default()).search(LONG)?;
        assert!(report.tactical);
        assert_eq!(report.best_move, 2);
        assert_eq!(report.nodes, 0);
        Ok(())
    }

    #[test]
    pub fn negamax_blocks_closest_to_center() -> Result<()> {
        let position = Position::from_grid(&open_three_grid(), Side::One)?;
        assert_eq!(position.winning_moves(Side::Two), vec![0, 4]);

        let report = Negamax::new(position, NegamaxConfig::default()).search(LONG)?;
        assert!(report.tactical);
        assert_eq!(report.best_move, 4);
        Ok(())
    }

    #[test]
    pub fn negamax_avoids_giving_away_a_win() -> Result<()> {
        let position = Position::from_grid(&hanging_three_grid(), Side::One)?;
        assert!(Negamax::tactical_move(&position).is_none());

        for depth in 2..=4 {
            let report = Negamax::new(position, negamax_config(depth, true)).search(LONG)?;
            assert!(!report.tactical);
            assert!(
                report.best_move != 0 && report.best_move != 4,
                "depth {} played {}",
                depth,
                report.best_move
            );
            let child = position.play(report.best_move)?;
            assert!(child.winning_moves(Side::Two).is_empty());
        }
        Ok(())
    }

    #[test]
    pub fn negamax_opening_is_safe() -> Result<()> {
        let position = Position::new();
        let report = Negamax::new(position, negamax_config(3, true)).search(LONG)?;
        assert!(!report.tactical);
        assert_eq!(report.depth, 3);
        let child = position.play(report.best_move)?;
        assert!(child.winning_moves(Side::Two).is_empty());
        Ok(())
    }

    #[test]
    pub fn transposition_table_does_not_change_result() -> Result<()> {
        for moves in ["", "4453", "3344", "2345", "44556", "1234567"].iter() {
            let position = Position::from_moves(moves)?;
            for depth in 1..=5 {
                let with_table = Negamax::new(position, negamax_config(depth, true)).search_depth(depth)?;
                let without_table =
                    Negamax::new(position, negamax_config(depth, false)).search_depth(depth)?;
                assert_eq!(with_table, without_table, "moves {:?} depth {}", moves, depth);
            }
        }
        Ok(())
    }

    #[test]
    pub fn negamax_without_time_uses_default_move() -> Result<()> {
        let report = Negamax::new(Position::new(), NegamaxConfig::default()).search(Duration::ZERO)?;
        assert_eq!(report.best_move, 3);
        assert_eq!(report.depth, 0);

        let position = Position::from_moves("444444")?;
        let report = Negamax::new(position, NegamaxConfig::default()).search(Duration::ZERO)?;
        assert_eq!(report.best_move, 0);
        Ok(())
    }

    #[test]
    pub fn negamax_stops_deepening_at_forced_win() -> Result<()> {
        // player 1 holds columns 3 and 4 of the bottom row, either side
        // makes an open three that cannot be blocked twice
        let position = Position::from_moves("3344")?;
        assert!(Negamax::tactical_move(&position).is_none());

        let report = Negamax::new(position, negamax_config(8, true)).search(LONG)?;
        assert!(!report.tactical);
        assert!(report.score >= WIN_SCORE / 2, "score {}", report.score);
        assert!(report.depth < 8, "depth {}", report.depth);
        assert_eq!(report.depth, 3);

        let child = position.play(report.best_move)?;
        assert!(child.winning_moves(Side::One).len() >= 2);
        Ok(())
    }

    #[test]
    pub fn negamax_keeps_last_completed_depth() -> Result<()> {
        let position = Position::from_moves("4453")?;
        let config = negamax_config(20, true);

        let report = Negamax::new(position, config.clone()).search(Duration::from_millis(15))?;
        assert!(!report.tactical);
        assert!(report.depth >= 1);
        // the budget ran out in the middle of a deeper iteration
        assert!(report.depth < 20, "depth {}", report.depth);

        let (score, best_move) = Negamax::new(position, config).search_depth(report.depth)?;
        assert_eq!(Some(report.best_move), best_move);
        assert_eq!(report.score, score);
        Ok(())
    }

    #[test]
    pub fn negamax_fails_without_legal_moves() -> Result<()> {
        let a = [1, 1, 2, 2, 1, 1, 2];
        let b = [2, 2, 1, 1, 2, 2, 1];
        let full = Position::from_grid(&[a, b, a, b, a, b], Side::One)?;
        let result = Negamax::new(full, NegamaxConfig::default()).search(LONG);
        assert_eq!(result, Err(EngineError::NoLegalMoves));
        Ok(())
    }

    // ---- mcts ----

    #[test]
    pub fn rewards_are_from_player_one_view() {
        assert_eq!(reward_of(Some(GameResult::Win(Side::One))), 1.0);
        assert_eq!(reward_of(Some(GameResult::Win(Side::Two))), 0.0);
        assert_eq!(reward_of(Some(GameResult::Draw)), 0.5);
    }

    #[test]
    pub fn node_table_merges_transpositions() -> Result<()> {
        let mut table = NodeTable::new();
        assert!(table.is_empty());
        let first = table.get_or_insert(Position::from_moves("123")?);
        let second = table.get_or_insert(Position::from_moves("321")?);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.node(first).mean(), 0.0);
        Ok(())
    }

    #[test]
    pub fn mcts_is_reproducible_with_a_seed() -> Result<()> {
        let position = Position::from_moves("4453")?;
        let run = || {
            let mut mcts = Mcts::new(position, mcts_config(300), ChaCha8Rng::seed_from_u64(42));
            mcts.search(LONG)
        };
        let first = run()?;
        let second = run()?;

        assert_eq!(first.best_move, second.best_move);
        assert_eq!(first.value, second.value);
        assert_eq!(first.iterations, 300);
        assert_eq!(first.root_visits, second.root_visits);
        assert_eq!(first.table_size, second.table_size);
        Ok(())
    }

    #[test]
    pub fn mcts_visit_counts_never_decrease() -> Result<()> {
        let position = Position::from_moves("44")?;
        let config = mcts_config(200);
        let runs = config.rollouts_per_leaf as u64;
        let mut mcts = Mcts::new(position, config, ChaCha8Rng::seed_from_u64(1));
        let mut seen: HashMap<u64, u64> = HashMap::new();

        for iteration in 1..=200u64 {
            mcts.iterate();
            for node in mcts.table().iter() {
                let previous = seen.insert(node.position.key(), node.visits).unwrap_or(0);
                assert!(node.visits >= previous);
            }
            assert_eq!(mcts.root().visits, iteration * runs);
            assert_eq!(mcts.iterations(), iteration);
        }

        // every visit of a non-root node came through exactly one predecessor
        let root_key = mcts.root().position.key();
        for node in mcts.table().iter() {
            if node.position.key() != root_key {
                assert_eq!(node.edge_visits.values().sum::<u64>(), node.visits);
            }
        }
        Ok(())
    }

    #[test]
    pub fn mcts_finds_immediate_win() -> Result<()> {
        let position = Position::from_moves("313237")?;
        let mut mcts = Mcts::new(position, mcts_config(2_000), ChaCha8Rng::seed_from_u64(3));
        let stats = mcts.search(LONG)?;
        assert_eq!(stats.best_move, 2);
        assert_eq!(stats.value, 1.0);
        Ok(())
    }

    #[test]
    pub fn mcts_minimizes_for_player_two() -> Result<()> {
        // player 2 to move with three stacked in column 2 (index 1)
        let position = Position::from_moves("1212123")?;
        assert_eq!(position.side_to_move(), Side::Two);
        assert!(position.winning_moves(Side::Two).contains(&1));

        let mut mcts = Mcts::new(position, mcts_config(2_000), ChaCha8Rng::seed_from_u64(5));
        let stats = mcts.search(LONG)?;
        assert_eq!(stats.best_move, 1);
        assert_eq!(stats.value, 0.0);
        Ok(())
    }

    #[test]
    pub fn mcts_returns_legal_move_without_time() -> Result<()> {
        let position = Position::from_moves("444444")?;
        let mut mcts = Mcts::new(position, MctsConfig::default(), ChaCha8Rng::seed_from_u64(9));
        let stats = mcts.search(Duration::ZERO)?;
        assert_eq!(stats.iterations, 0);
        assert!(position.legal_moves().contains(&stats.best_move));
        Ok(())
    }

    #[test]
    pub fn mcts_unexplored_children_score_zero() -> Result<()> {
        // player 2 to move, so an absent child looks like a certain win
        let position = Position::from_moves("4")?;
        let mut mcts = Mcts::new(position, mcts_config(3), ChaCha8Rng::seed_from_u64(11));
        let stats = mcts.search(LONG)?;

        let explored: Vec<usize> = position
            .legal_moves()
            .into_iter()
            .filter(|&column| mcts.table().get(&position.play_unchecked(column)).is_some())
            .collect();
        assert_eq!(explored, vec![0, 1]);
        assert_eq!(stats.value, 0.0);

        // one root child is inserted per iteration after the first
        let mut mcts = Mcts::new(position, mcts_config(WIDTH as u64 + 1), ChaCha8Rng::seed_from_u64(11));
        mcts.search(LONG)?;
        for column in position.legal_moves() {
            let child = position.play_unchecked(column);
            assert!(mcts.table().get(&child).is_some(), "column {}", column);
        }
        Ok(())
    }

    // ---- selector ----

    #[test]
    pub fn fallback_prefers_center() {
        assert_eq!(fallback_move(&[0, 3, 6]), Some(3));
        assert_eq!(fallback_move(&[1, 6]), Some(1));
        assert_eq!(fallback_move(&[]), None);
    }

    #[test]
    pub fn selector_never_returns_full_column() -> Result<()> {
        let position = Position::from_moves("444444")?;
        for engine in [EngineKind::Negamax, EngineKind::Mcts].iter() {
            let mut selector = MoveSelector::new(fixed_config(*engine, 100, Some(3)));
            let decision = selector.choose(&position, &position.legal_moves())?;
            assert_ne!(decision.column, 3);
            assert!(position.legal_moves().contains(&decision.column));
        }
        Ok(())
    }

    #[test]
    pub fn selector_replaces_illegal_answer() -> Result<()> {
        // the engine wants the center, the caller only allows the edges
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 1_000, Some(1)));
        let decision = selector.choose(&Position::new(), &[0, 6])?;
        assert!(decision.fallback);
        assert_eq!(decision.column, 0);
        Ok(())
    }

    #[test]
    pub fn selector_requires_a_legal_move() {
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 100, Some(1)));
        assert_eq!(
            selector.choose(&Position::new(), &[]),
            Err(EngineError::NoLegalMoves)
        );
    }

    #[test]
    pub fn selector_counts_moves_and_resets() -> Result<()> {
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 100, Some(1)));
        let position = Position::from_moves("44")?;
        selector.choose(&position, &position.legal_moves())?;
        selector.choose(&position, &position.legal_moves())?;
        assert_eq!(selector.ai_moves_made(), 2);

        // a new game on an empty board
        selector.choose(&Position::new(), &Position::new().legal_moves())?;
        assert_eq!(selector.ai_moves_made(), 1);
        Ok(())
    }

    #[test]
    pub fn selector_blocks_with_both_engines() -> Result<()> {
        let position = Position::from_grid(&open_three_grid(), Side::One)?;
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 500, None));
        assert_eq!(selector.choose(&position, &position.legal_moves())?.column, 4);

        let win = Position::from_moves("313237")?;
        let mut selector = MoveSelector::new(EngineConfig {
            mcts: mcts_config(2_000),
            ..fixed_config(EngineKind::Mcts, 60_000, None)
        });
        assert_eq!(selector.choose(&win, &win.legal_moves())?.column, 2);
        Ok(())
    }

    // ---- boundary ----

    fn request(board: Vec<Vec<i64>>, current_player: i64, valid_moves: Vec<i64>) -> MoveRequest {
        MoveRequest {
            board,
            current_player,
            valid_moves,
        }
    }

    fn grid_to_rows(grid: &[[u8; WIDTH]; HEIGHT]) -> Vec<Vec<i64>> {
        grid.iter()
            .map(|row| row.iter().map(|&cell| cell as i64).collect())
            .collect()
    }

    #[test]
    pub fn respond_blocks_threat() -> Result<()> {
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 500, None));
        let response = respond(
            &mut selector,
            &request(grid_to_rows(&open_three_grid()), 1, (0..7).collect()),
        )?;
        assert_eq!(response.column, 4);
        assert!(response.execution_time.is_some());
        Ok(())
    }

    #[test]
    pub fn respond_errors_only_without_moves() {
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 100, Some(1)));
        let empty_board = vec![vec![0; WIDTH]; HEIGHT];
        assert_eq!(
            respond(&mut selector, &request(empty_board.clone(), 1, vec![])),
            Err(EngineError::NoLegalMoves)
        );
        assert_eq!(
            respond(&mut selector, &request(empty_board, 1, vec![-1, 9])),
            Err(EngineError::NoLegalMoves)
        );
    }

    #[test]
    pub fn respond_falls_back_on_bad_input() -> Result<()> {
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 100, Some(1)));

        // five rows only
        let short = request(vec![vec![0; WIDTH]; HEIGHT - 1], 1, vec![2, 3, 5]);
        let response = respond(&mut selector, &short)?;
        assert_eq!(response.column, 3);
        assert_eq!(response.evaluation, None);

        // unknown player numbering
        let zero_player = request(vec![vec![0; WIDTH]; HEIGHT], 0, vec![1, 5]);
        assert_eq!(respond(&mut selector, &zero_player)?.column, 1);

        // floating piece
        let mut floating = vec![vec![0; WIDTH]; HEIGHT];
        floating[0][0] = 2;
        let response = respond(&mut selector, &request(floating, 1, vec![0, 1, 2, 3]))?;
        assert_eq!(response.column, 3);
        Ok(())
    }

    #[test]
    pub fn response_uses_move_field() -> Result<()> {
        let request: MoveRequest = serde_json::from_str(
            r#"{"board": [[0,0,0,0,0,0,0],[0,0,0,0,0,0,0],[0,0,0,0,0,0,0],
                          [0,0,0,0,0,0,0],[0,0,0,0,0,0,0],[0,0,0,0,0,0,0]],
                "current_player": 2, "valid_moves": [0,1,2,3,4,5,6]}"#,
        )?;
        let mut selector = MoveSelector::new(fixed_config(EngineKind::Negamax, 100, Some(2)));
        let response = respond(&mut selector, &request)?;

        let json = serde_json::to_value(&response)?;
        let column = json["move"]
            .as_u64()
            .ok_or_else(|| anyhow!("missing move in {}", json))?;
        assert!(column < WIDTH as u64);
        assert_eq!(json["depth"], 2);

        let parsed: MoveResponse = serde_json::from_str(r#"{"move": 4}"#)?;
        assert_eq!(parsed.column, 4);
        assert_eq!(parsed.depth, None);
        Ok(())
    }

    // ---- config ----

    #[test]
    pub fn default_schedule_shrinks_budget() {
        let config = EngineConfig::default();
        let budgets: Vec<u64> = [0, 2, 3, 8, 9, 13, 14, 40]
            .iter()
            .map(|&moves| config.budget_for(moves).time_ms)
            .collect();
        assert_eq!(budgets, vec![3_000, 3_000, 5_000, 5_000, 2_000, 2_000, 1_000, 1_000]);
    }

    #[test]
    pub fn config_parses_partial_toml() -> Result<()> {
        let config = EngineConfig::from_toml_str(
            r#"
            engine = "mcts"
            seed = 11

            [mcts]
            rollouts_per_leaf = 5

            [[schedule]]
            until_move = 10
            time_ms = 250

            [[schedule]]
            until_move = 4
            time_ms = 500
            max_depth = 4
            "#,
        )?;
        assert_eq!(config.engine, EngineKind::Mcts);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.mcts.rollouts_per_leaf, 5);
        assert_eq!(config.mcts.exploration, 2.0);
        assert_eq!(config.negamax, NegamaxConfig::default());
        assert_eq!(config.budget_for(3).max_depth, Some(4));
        assert_eq!(config.budget_for(7).time_ms, 250);
        // past the last step the last budget applies
        assert_eq!(config.budget_for(50).time_ms, 250);

        assert!(EngineConfig::from_toml_str("engine = \"minimax\"").is_err());
        Ok(())
    }

    #[test]
    pub fn engine_kind_from_str() {
        assert_eq!("MCTS".parse::<EngineKind>(), Ok(EngineKind::Mcts));
        assert_eq!("negamax".parse::<EngineKind>(), Ok(EngineKind::Negamax));
        assert!("alphabeta".parse::<EngineKind>().is_err());
    }

    // ---- properties ----

    fn play_sequence(columns: &[usize]) -> Vec<Position> {
        let mut positions = vec![Position::new()];
        let mut position = Position::new();
        for &column in columns {
            if position.is_terminal() {
                break;
            }
            if let Ok(next) = position.play(column) {
                position = next;
                positions.push(position);
            }
        }
        positions
    }

    proptest! {
        #[test]
        fn prop_legal_moves_are_open_columns(columns in proptest::collection::vec(0usize..WIDTH, 0..60)) {
            for position in play_sequence(&columns) {
                let legal = position.legal_moves();
                let open: Vec<usize> = (0..WIDTH).filter(|&c| position.cell(0, c).is_none()).collect();
                prop_assert_eq!(&legal, &open);
                prop_assert!(legal.windows(2).all(|w| w[0] < w[1]));
                if !position.is_terminal() {
                    prop_assert!(!legal.is_empty());
                }
            }
        }

        #[test]
        fn prop_play_adds_one_piece_at_bottom(columns in proptest::collection::vec(0usize..WIDTH, 0..60)) {
            for position in play_sequence(&columns) {
                for column in position.legal_moves() {
                    let next = position.play(column).unwrap();
                    prop_assert_eq!(next.num_moves(), position.num_moves() + 1);
                    prop_assert_eq!(next.side_to_move(), position.side_to_move().opponent());
                    let row = (0..HEIGHT).rev().find(|&r| position.cell(r, column).is_none()).unwrap();
                    prop_assert_eq!(next.cell(row, column), Some(position.side_to_move()));
                }
            }
        }

        #[test]
        fn prop_grid_round_trip_keeps_result(columns in proptest::collection::vec(0usize..WIDTH, 0..60)) {
            for position in play_sequence(&columns) {
                let rebuilt = Position::from_grid(&to_grid(&position), position.side_to_move()).unwrap();
                prop_assert_eq!(rebuilt, position);
            }
        }
    }
}
