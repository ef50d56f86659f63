use std::fmt;

use serde::{Deserialize, Serialize};

/// A phase of the compile and execute pipeline.
///
/// Stages are strictly ordered. `Execute` and `Interpret` are alternative
/// terminal stages chosen by [`EngineConfig::execute`](crate::EngineConfig::execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Parse,
    Bind,
    Intermediate,
    Generate,
    Execute,
    Interpret,
}

impl Stage {
    /// The stage after this one, or `None` for a terminal stage.
    pub fn next(self, execute: bool) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::Parse),
            Stage::Parse => Some(Stage::Bind),
            Stage::Bind => Some(Stage::Intermediate),
            Stage::Intermediate => Some(Stage::Generate),
            Stage::Generate if execute => Some(Stage::Execute),
            Stage::Generate => Some(Stage::Interpret),
            Stage::Execute | Stage::Interpret => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Execute | Stage::Interpret)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Parse => "parse",
            Stage::Bind => "bind",
            Stage::Intermediate => "intermediate",
            Stage::Generate => "generate",
            Stage::Execute => "execute",
            Stage::Interpret => "interpret",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order() {
        let mut stages = vec![Stage::Init];
        while let Some(next) = stages.last().and_then(|s| s.next(false)) {
            stages.push(next);
        }
        assert_eq!(
            stages,
            vec![
                Stage::Init,
                Stage::Parse,
                Stage::Bind,
                Stage::Intermediate,
                Stage::Generate,
                Stage::Interpret
            ]
        );
        assert_eq!(Stage::Generate.next(true), Some(Stage::Execute));
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
    }
}
