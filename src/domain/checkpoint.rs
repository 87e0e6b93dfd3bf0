use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two checkpoints a training run produces.
///
///   Best  — written whenever validation loss improves
///   Final — written once after the last epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    Best,
    Final,
}

impl CheckpointKind {
    /// File name prefix used for every artifact of this checkpoint
    pub fn prefix(&self) -> &'static str {
        match self {
            CheckpointKind::Best  => "best",
            CheckpointKind::Final => "final",
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for CheckpointKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best"  => Ok(CheckpointKind::Best),
            "final" => Ok(CheckpointKind::Final),
            other   => anyhow::bail!("unknown checkpoint '{other}', expected best or final"),
        }
    }
}

/// Training bookkeeping stored next to the weights.
///
/// `epoch` is the 0-based index of the last completed epoch.
/// A resumed run continues at `epoch + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch:    usize,
    /// None when the checkpoint was written without a validation pass
    pub val_loss: Option<f64>,
}

impl CheckpointMeta {
    pub fn new(epoch: usize, val_loss: Option<f64>) -> Self {
        Self { epoch, val_loss }
    }

    pub fn resume_epoch(&self) -> usize {
        self.epoch + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("best".parse::<CheckpointKind>().unwrap(), CheckpointKind::Best);
        assert_eq!("FINAL".parse::<CheckpointKind>().unwrap(), CheckpointKind::Final);
        assert!("latest".parse::<CheckpointKind>().is_err());
    }

    #[test]
    fn test_resume_epoch_follows_saved_epoch() {
        let meta = CheckpointMeta::new(4, Some(0.25));
        assert_eq!(meta.resume_epoch(), 5);
    }

    #[test]
    fn test_meta_json_shape() {
        let meta = CheckpointMeta::new(2, None);
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"epoch":2,"val_loss":null}"#);
    }
}
