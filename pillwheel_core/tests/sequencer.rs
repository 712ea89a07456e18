use pillwheel_core::{Hopper, HopperId, next_target};

#[test]
fn first_declared_hopper_is_served_until_satisfied() {
    let mut d_done = 0;
    loop {
        let hoppers = vec![
            Hopper::with_progress(HopperId(0), "D", 2, d_done),
            Hopper::with_progress(HopperId(1), "C", 1, 0),
        ];
        let target = next_target(&hoppers);
        if d_done < 2 {
            assert_eq!(target, Some(HopperId(0)));
            d_done += 1;
        } else {
            assert_eq!(target, Some(HopperId(1)));
            break;
        }
    }
}

#[test]
fn empty_and_satisfied_lists_have_no_target() {
    assert_eq!(next_target(&[]), None);
    let done = vec![
        Hopper::with_progress(HopperId(0), "D", 2, 2),
        Hopper::with_progress(HopperId(1), "C", 1, 1),
    ];
    assert_eq!(next_target(&done), None);
}

#[test]
fn later_hopper_waits_even_if_earlier_is_partial() {
    let hoppers = vec![
        Hopper::with_progress(HopperId(0), "D", 3, 1),
        Hopper::with_progress(HopperId(1), "C", 1, 0),
    ];
    assert_eq!(next_target(&hoppers), Some(HopperId(0)));
}
