//! Tempo from inter-onset intervals.

/// Lower bound of the octave-correction range.
pub const MIN_TEMPO_BPM: f64 = 60.0;

/// Upper bound of the octave-correction range.
pub const MAX_TEMPO_BPM: f64 = 180.0;

/// `60 / median IOI`, octave-corrected into `[60, 180]` BPM.
///
/// Returns `None` with fewer than two distinct onsets.
pub fn estimate_tempo(onsets: &[usize], sample_rate: f64) -> Option<f64> {
    if onsets.len() < 2 || sample_rate <= 0.0 {
        return None;
    }

    let mut sorted = onsets.to_vec();
    sorted.sort_unstable();
    let mut intervals: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / sample_rate)
        .filter(|&ioi| ioi > 0.0)
        .collect();
    if intervals.is_empty() {
        return None;
    }

    intervals.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = intervals.len() / 2;
    let median = if intervals.len() % 2 == 0 {
        (intervals[mid - 1] + intervals[mid]) * 0.5
    } else {
        intervals[mid]
    };

    Some(correct_tempo_octave(60.0 / median))
}

/// Double or halve until the tempo lies in `[60, 180]`.
///
/// Heuristic: values near either bound can land an octave away from the
/// perceived tempo.
pub fn correct_tempo_octave(bpm: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return bpm;
    }
    let mut tempo = bpm;
    while tempo < MIN_TEMPO_BPM {
        tempo *= 2.0;
    }
    while tempo > MAX_TEMPO_BPM {
        tempo /= 2.0;
    }
    tempo
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_octave_correction() {
        assert_eq!(correct_tempo_octave(120.0), 120.0);
        assert_eq!(correct_tempo_octave(240.0), 120.0);
        assert_eq!(correct_tempo_octave(50.0), 100.0);
        assert_eq!(correct_tempo_octave(25.0), 100.0);
        assert_eq!(correct_tempo_octave(60.0), 60.0);
        assert_eq!(correct_tempo_octave(180.0), 180.0);
        assert_eq!(correct_tempo_octave(181.0), 90.5);
    }

    #[test]
    fn test_median_interval() {
        let sr = 1000.0;
        // IOIs 500, 500, 900 -> median 500 ms -> 120 BPM
        let tempo = estimate_tempo(&[0, 500, 1000, 1900], sr).unwrap();
        assert_relative_eq!(tempo, 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_not_enough_onsets() {
        assert_eq!(estimate_tempo(&[], 44100.0), None);
        assert_eq!(estimate_tempo(&[100], 44100.0), None);
        assert_eq!(estimate_tempo(&[100, 100], 44100.0), None);
    }
}
