//! FSRS-5 memory formulas.
//!
//! - Retrievability: R = (1 + FACTOR * t / S)^DECAY
//! - Interval: t = S / FACTOR * (R_target^(1 / DECAY) - 1)
//!
//! All functions are pure; the weight vector is passed in.

use wordcards_core::Rating;

/// Forgetting curve exponent.
pub const DECAY: f64 = -0.5;

/// Chosen so that R = 0.9 exactly when t = S: `0.9^(1 / DECAY) - 1`.
pub const FACTOR: f64 = 19.0 / 81.0;

pub const STABILITY_MIN: f64 = 0.001;
pub const DIFFICULTY_MIN: f64 = 1.0;
pub const DIFFICULTY_MAX: f64 = 10.0;

/// Number of model weights.
pub const WEIGHT_COUNT: usize = 19;

pub const DEFAULT_WEIGHTS: [f64; WEIGHT_COUNT] = [
    0.40255, 1.18385, 3.173, 15.69105, 7.1949, 0.5345, 1.4604, 0.0046, 1.54575, 0.1192, 1.01925,
    1.9395, 0.11, 0.29605, 2.2698, 0.2315, 2.9898, 0.51655, 0.6621,
];

fn grade(rating: Rating) -> f64 {
    rating.value() as f64
}

/// Probability of recall after `elapsed_days` with the given stability.
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (1.0 + FACTOR * elapsed_days.max(0.0) / stability)
        .powf(DECAY)
        .clamp(0.0, 1.0)
}

/// Interval in (fractional) days that brings R down to `desired_retention`.
pub fn interval_days(stability: f64, desired_retention: f64) -> f64 {
    stability / FACTOR * (desired_retention.powf(1.0 / DECAY) - 1.0)
}

pub fn initial_stability(w: &[f64; WEIGHT_COUNT], rating: Rating) -> f64 {
    w[(rating.value() - 1) as usize].max(STABILITY_MIN)
}

pub fn initial_difficulty(w: &[f64; WEIGHT_COUNT], rating: Rating) -> f64 {
    clamp_difficulty(w[4] - (w[5] * (grade(rating) - 1.0)).exp() + 1.0)
}

pub fn clamp_difficulty(difficulty: f64) -> f64 {
    difficulty.clamp(DIFFICULTY_MIN, DIFFICULTY_MAX)
}

/// Difficulty after a rating: linear damping toward 10, then mean reversion
/// toward the initial difficulty of an Easy first rating.
pub fn next_difficulty(w: &[f64; WEIGHT_COUNT], difficulty: f64, rating: Rating) -> f64 {
    let delta = -w[6] * (grade(rating) - 3.0);
    let damped = difficulty + (10.0 - difficulty) * delta / 9.0;
    let reverted = w[7] * initial_difficulty(w, Rating::Easy) + (1.0 - w[7]) * damped;
    clamp_difficulty(reverted)
}

/// Same-day review stability update.
pub fn short_term_stability(w: &[f64; WEIGHT_COUNT], stability: f64, rating: Rating) -> f64 {
    let mut increase = (w[17] * (grade(rating) - 3.0 + w[18])).exp();
    if rating.is_correct() {
        increase = increase.max(1.0);
    }
    (stability * increase).max(STABILITY_MIN)
}

pub fn next_recall_stability(
    w: &[f64; WEIGHT_COUNT],
    difficulty: f64,
    stability: f64,
    retrievability: f64,
    rating: Rating,
) -> f64 {
    let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
    stability
        * (1.0
            + w[8].exp()
                * (11.0 - difficulty)
                * stability.powf(-w[9])
                * (((1.0 - retrievability) * w[10]).exp() - 1.0)
                * hard_penalty
                * easy_bonus)
}

pub fn next_forget_stability(
    w: &[f64; WEIGHT_COUNT],
    difficulty: f64,
    stability: f64,
    retrievability: f64,
) -> f64 {
    let long_term = w[11]
        * difficulty.powf(-w[12])
        * ((stability + 1.0).powf(w[13]) - 1.0)
        * ((1.0 - retrievability) * w[14]).exp();
    let short_term = stability / (w[17] * w[18]).exp();
    long_term.min(short_term)
}

/// Long-term stability update for a review at least a day after the last.
pub fn next_stability(
    w: &[f64; WEIGHT_COUNT],
    difficulty: f64,
    stability: f64,
    retrievability: f64,
    rating: Rating,
) -> f64 {
    let next = match rating {
        Rating::Again => next_forget_stability(w, difficulty, stability, retrievability),
        _ => next_recall_stability(w, difficulty, stability, retrievability, rating),
    };
    next.max(STABILITY_MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_target_interval_equals_stability() {
        let interval = interval_days(12.5, 0.9);
        assert!((interval - 12.5).abs() < 1e-9);
    }

    #[test]
    fn higher_retention_shortens_interval() {
        assert!(interval_days(10.0, 0.95) < interval_days(10.0, 0.9));
    }

    #[test]
    fn retrievability_decays() {
        assert_eq!(retrievability(0.0, 5.0), 1.0);
        let at_stability = retrievability(5.0, 5.0);
        assert!((at_stability - 0.9).abs() < 1e-9);
        assert!(retrievability(30.0, 5.0) < at_stability);
        assert_eq!(retrievability(3.0, 0.0), 0.0);
    }

    #[test]
    fn initial_values_follow_rating() {
        let w = &DEFAULT_WEIGHTS;
        assert_eq!(initial_stability(w, Rating::Easy), 15.69105);
        assert!(
            initial_stability(w, Rating::Again) < initial_stability(w, Rating::Good)
        );
        assert!(
            initial_difficulty(w, Rating::Again) > initial_difficulty(w, Rating::Easy)
        );
        for rating in Rating::ALL {
            let d = initial_difficulty(w, rating);
            assert!((DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&d));
        }
    }

    #[test]
    fn difficulty_moves_with_rating() {
        let w = &DEFAULT_WEIGHTS;
        assert!(next_difficulty(w, 5.0, Rating::Again) > 5.0);
        assert!(next_difficulty(w, 5.0, Rating::Easy) < 5.0);
        assert!(next_difficulty(w, 10.0, Rating::Again) <= DIFFICULTY_MAX);
    }

    #[test]
    fn recall_grows_and_forget_shrinks_stability() {
        let w = &DEFAULT_WEIGHTS;
        let r = retrievability(10.0, 10.0);
        assert!(next_stability(w, 5.0, 10.0, r, Rating::Good) > 10.0);
        assert!(
            next_stability(w, 5.0, 10.0, r, Rating::Easy)
                > next_stability(w, 5.0, 10.0, r, Rating::Good)
        );
        assert!(next_stability(w, 5.0, 10.0, r, Rating::Again) < 10.0);
    }

    #[test]
    fn same_day_good_never_lowers_stability() {
        let w = &DEFAULT_WEIGHTS;
        assert!(short_term_stability(w, 3.0, Rating::Good) >= 3.0);
        assert!(short_term_stability(w, 3.0, Rating::Again) < 3.0);
    }
}
