use shared::{Team, Winner, WIN_THRESHOLD};

/// Team that has reached the win threshold, if any
pub fn check_winner(red_flags: u32, blue_flags: u32) -> Option<Team> {
    if red_flags >= WIN_THRESHOLD {
        Some(Team::Red)
    } else if blue_flags >= WIN_THRESHOLD {
        Some(Team::Blue)
    } else {
        None
    }
}

/// Decides a game that ended without reaching the threshold (the clients'
/// round timer ran out). Equal counts are a tie.
pub fn decide_by_count(red_flags: u32, blue_flags: u32) -> Winner {
    match red_flags.cmp(&blue_flags) {
        std::cmp::Ordering::Greater => Winner::Team(Team::Red),
        std::cmp::Ordering::Less => Winner::Team(Team::Blue),
        std::cmp::Ordering::Equal => Winner::Tie,
    }
}
