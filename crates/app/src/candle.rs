//! The one-shot candle both triggers race to blow out.

use std::fmt;

/// How the candle was blown out. Both paths arrive over the same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Blow,
    Click,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Blow => write!(f, "blowing"),
            Trigger::Click => write!(f, "hand"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Candle {
    blown_by: Option<Trigger>,
}

impl Candle {
    /// Returns true only for the first trigger; later ones are ignored.
    pub fn blow_out(&mut self, trigger: Trigger) -> bool {
        if self.blown_by.is_some() {
            return false;
        }
        self.blown_by = Some(trigger);
        true
    }

    pub fn is_lit(&self) -> bool {
        self.blown_by.is_none()
    }

    pub fn blown_by(&self) -> Option<Trigger> {
        self.blown_by
    }
}

/// Instruction shown while the candle is lit.
pub fn prompt(listening: bool) -> &'static str {
    if listening {
        "Blow the candle (or press Enter)"
    } else {
        "Press Enter to blow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_wins() {
        let mut candle = Candle::default();
        assert!(candle.is_lit());
        assert!(candle.blow_out(Trigger::Click));
        assert!(!candle.blow_out(Trigger::Blow));
        assert!(!candle.blow_out(Trigger::Click));
        assert_eq!(candle.blown_by(), Some(Trigger::Click));
        assert!(!candle.is_lit());
    }

    #[test]
    fn test_prompt_falls_back_to_manual() {
        assert_eq!(prompt(false), "Press Enter to blow");
        assert!(prompt(true).starts_with("Blow"));
    }
}
