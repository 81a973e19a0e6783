// Presentation timestamp pacing
//
// Timestamps come from the count of frames the container accepted, not from
// capture times, so irregular camera delivery never produces gaps or
// regressions in the output track.

use crate::frame::MediaTime;

/// Frame-index-driven presentation clock
#[derive(Debug, Clone)]
pub struct PaceClock {
    timescale: i32,
    frame_duration: i64,
    next_index: u64,
}

impl PaceClock {
    /// `timescale` units per second, one frame every `round(timescale / fps)` units.
    ///
    /// Zero values are clamped to 1 so the clock always advances.
    pub fn new(fps: u32, timescale: i32) -> Self {
        let timescale = timescale.max(1);
        let fps = fps.max(1);
        let frame_duration = ((timescale as f64 / fps as f64).round() as i64).max(1);
        Self {
            timescale,
            frame_duration,
            next_index: 0,
        }
    }

    /// Timestamp the next accepted frame will carry
    pub fn peek(&self) -> MediaTime {
        MediaTime::new(self.next_index as i64 * self.frame_duration, self.timescale)
    }

    /// Record that the frame at [`peek`](Self::peek) was accepted
    pub fn commit(&mut self) {
        self.next_index += 1;
    }

    pub fn frame_duration(&self) -> MediaTime {
        MediaTime::new(self.frame_duration, self.timescale)
    }

    pub fn timescale(&self) -> i32 {
        self.timescale
    }

    /// Frames committed so far
    pub fn frames_committed(&self) -> u64 {
        self.next_index
    }

    /// Presentation duration of everything committed so far
    pub fn elapsed(&self) -> MediaTime {
        self.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_and_steps_by_rounded_duration() {
        let mut clock = PaceClock::new(24, 600);
        assert_eq!(clock.peek(), MediaTime::new(0, 600));
        clock.commit();
        assert_eq!(clock.peek(), MediaTime::new(25, 600));
        clock.commit();
        assert_eq!(clock.peek(), MediaTime::new(50, 600));
        assert_eq!(clock.frames_committed(), 2);
    }

    #[test]
    fn peek_without_commit_does_not_advance() {
        let clock = PaceClock::new(30, 600);
        assert_eq!(clock.peek(), clock.peek());
        assert_eq!(clock.frame_duration(), MediaTime::new(20, 600));
    }

    #[test]
    fn non_divisible_rates_round_to_nearest() {
        assert_eq!(PaceClock::new(7, 600).frame_duration().value, 86);
        assert_eq!(PaceClock::new(29, 600).frame_duration().value, 21);
        assert_eq!(PaceClock::new(1000, 600).frame_duration().value, 1);
    }

    #[test]
    fn timestamps_strictly_increase() {
        let mut clock = PaceClock::new(60, 600);
        let mut last = None;
        for _ in 0..120 {
            let pts = clock.peek();
            if let Some(prev) = last {
                assert!(pts > prev);
                assert_eq!(pts.value - prev.value, 10);
            }
            last = Some(pts);
            clock.commit();
        }
    }
}
