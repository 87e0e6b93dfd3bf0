use std::fmt;
use std::path::PathBuf;

/// Which part of the dataset a sample belongs to.
/// Each split lives in its own directory under the data root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val   => "val",
            Split::Test  => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One image on disk and the mask that labels it.
///
/// Mask pixels hold class indices (0, 1, 2, ...). The test split
/// may ship images without masks, hence the Option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePaths {
    pub id:    String,
    pub image: PathBuf,
    pub mask:  Option<PathBuf>,
}

impl SamplePaths {
    pub fn new(id: impl Into<String>, image: PathBuf, mask: Option<PathBuf>) -> Self {
        Self { id: id.into(), image, mask }
    }
}
