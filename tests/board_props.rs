use proptest::prelude::*;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use seabattle::{Board, BOARD_COLUMNS, BOARD_ROWS, STANDARD_FLEET};

fn chebyshev(a: (usize, usize), b: (usize, usize)) -> usize {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1))
}

fn random_board(seed: u64) -> Board {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut board = Board::new();
    board.random_shuffle(&mut rng).unwrap();
    let shots = rng.random_range(0..BOARD_ROWS * BOARD_COLUMNS);
    for _ in 0..shots {
        let r = rng.random_range(0..BOARD_ROWS);
        let c = rng.random_range(0..BOARD_COLUMNS);
        board.register_shot(r, c).unwrap();
    }
    board
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn shuffled_ships_never_touch(seed in any::<u64>()) {
        let mut board = Board::new();
        board.random_shuffle(&mut SmallRng::seed_from_u64(seed)).unwrap();
        prop_assert!(board.matches_fleet(&STANDARD_FLEET));

        let ships: Vec<Vec<(usize, usize)>> =
            board.placed_ships().map(|ship| ship.coordinates()).collect();
        for (i, a) in ships.iter().enumerate() {
            for cell in a {
                prop_assert!(cell.0 < BOARD_ROWS && cell.1 < BOARD_COLUMNS);
            }
            for b in ships.iter().skip(i + 1) {
                for &x in a {
                    for &y in b {
                        prop_assert!(chebyshev(x, y) >= 2, "{:?} and {:?} touch", x, y);
                    }
                }
            }
        }
    }

    #[test]
    fn document_roundtrip(seed in any::<u64>()) {
        let board = random_board(seed);
        let doc = board.to_document();
        let back = Board::from_document(&doc).unwrap();
        prop_assert_eq!(back.to_document(), doc);
        prop_assert_eq!(back.are_all_ships_sunk(), board.are_all_ships_sunk());
        for cell in board.hit_coordinates() {
            prop_assert!(back.hit_coordinates().contains(cell));
        }
    }

    #[test]
    fn sink_is_reported_once(seed in any::<u64>(), row in 0..BOARD_ROWS, col in 0..BOARD_COLUMNS) {
        let mut board = random_board(seed);
        let first = board.register_shot(row, col).unwrap();
        let second = board.register_shot(row, col).unwrap();
        prop_assert_eq!(first.is_hit, second.is_hit);
        prop_assert!(!second.is_sunk);
    }
}
