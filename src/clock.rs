//! Injectable clock so streaks and weekly windows can be tested at a fixed instant.

use chrono::{DateTime, Duration, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
  #[default]
  System,
  Fixed(DateTime<Utc>),
}

impl Clock {
  #[cfg_attr(not(test), allow(dead_code))]
  pub fn fixed(at: DateTime<Utc>) -> Self {
    Self::Fixed(at)
  }

  pub fn now(&self) -> DateTime<Utc> {
    match self {
      Clock::System => Utc::now(),
      Clock::Fixed(t) => *t,
    }
  }

  /// Calendar day (UTC) of `now()`.
  pub fn today(&self) -> NaiveDate {
    self.now().date_naive()
  }

  /// Move a fixed clock forward. No effect on the system clock.
  #[cfg_attr(not(test), allow(dead_code))]
  pub fn advance(&mut self, delta: Duration) {
    if let Clock::Fixed(t) = self {
      *t += delta;
    }
  }
}

#[cfg(test)]
pub fn test_now() -> DateTime<Utc> {
  // 2024-03-15T18:00:00Z, a Friday evening.
  DateTime::<Utc>::from_timestamp(1_710_525_600, 0).expect("valid timestamp")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fixed_clock_advances() {
    let mut c = Clock::fixed(test_now());
    c.advance(Duration::hours(7));
    assert_eq!(c.now(), test_now() + Duration::hours(7));
    assert_eq!(c.today(), NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
  }
}
