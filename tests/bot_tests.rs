use rand::{rngs::SmallRng, SeedableRng};
use seabattle::{EnemyView, HuntTargeting, RandomTargeting, Targeting};

#[test]
fn test_random_targeting_never_repeats() {
    let mut rng = SmallRng::seed_from_u64(5);
    let mut view = EnemyView::new(3, 3);
    let mut targeting = RandomTargeting;
    for _ in 0..9 {
        let (row, col) = targeting.select_target(&mut rng, &view).unwrap();
        assert!(!view.is_coordinate_shot_at(row, col));
        view.register_shot_on_view(row, col, false);
    }
    assert_eq!(targeting.select_target(&mut rng, &view), None);
}

#[test]
fn test_hunt_tries_neighbours_after_hit() {
    let mut rng = SmallRng::seed_from_u64(5);
    let mut view = EnemyView::new(10, 10);
    let mut targeting = HuntTargeting::new();

    view.register_shot_on_view(5, 5, true);
    targeting.handle_shot_result((5, 5), true, false);
    assert!(targeting.is_hunting());

    let next = targeting.select_target(&mut rng, &view).unwrap();
    assert!(
        [(4, 5), (6, 5), (5, 4), (5, 6)].contains(&next),
        "{next:?} is not adjacent to the hit"
    );
}

#[test]
fn test_hunt_follows_line_of_two_hits() {
    let mut rng = SmallRng::seed_from_u64(5);
    let mut view = EnemyView::new(10, 10);
    let mut targeting = HuntTargeting::new();

    view.register_shot_on_view(5, 5, true);
    targeting.handle_shot_result((5, 5), true, false);
    view.register_shot_on_view(5, 6, true);
    targeting.handle_shot_result((5, 6), true, false);

    assert_eq!(targeting.select_target(&mut rng, &view), Some((5, 7)));
}

#[test]
fn test_hunt_skips_cells_outside_the_board() {
    let mut rng = SmallRng::seed_from_u64(5);
    let mut view = EnemyView::new(10, 10);
    let mut targeting = HuntTargeting::new();

    view.register_shot_on_view(0, 0, true);
    targeting.handle_shot_result((0, 0), true, false);
    let next = targeting.select_target(&mut rng, &view).unwrap();
    assert!([(1, 0), (0, 1)].contains(&next));
}

#[test]
fn test_sink_ends_the_hunt() {
    let mut targeting = HuntTargeting::new();
    targeting.handle_shot_result((2, 2), true, false);
    targeting.handle_shot_result((2, 3), true, true);
    assert!(!targeting.is_hunting());

    targeting.handle_shot_result((7, 7), false, false);
    assert!(!targeting.is_hunting());
}
