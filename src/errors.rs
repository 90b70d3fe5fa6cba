use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum BodyError {
    /// The archive version tag is outside of every supported band
    UnsupportedVersion(i32),

    /// A frame has a different number of control points than the first frame
    MismatchedSideLines {
        frame: usize,
        expected: usize,
        found: usize,
    },

    /// The operation would leave the body with fewer than two frames
    NotEnoughFrames,

    /// The operation would leave the frames with fewer than two side-lines
    NotEnoughSideLines,

    /// A frame or side-line index does not exist
    IndexOutOfRange { index: usize, len: usize },

    /// A value read from a stream is not valid for the field it was read into
    InvalidField(&'static str),

    /// The number of pressure coefficients doesn't match the number of panels
    PanelCountMismatch { expected: usize, found: usize },

    /// A frame would not lie strictly behind the frame before it or ahead of the frame after it
    FramesOutOfOrder { index: usize },

    /// A longitudinal scale factor must be positive
    InvalidScale(f64),
}

impl Display for BodyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyError::UnsupportedVersion(v) => {
                write!(f, "unsupported archive format version {}", v)
            }
            BodyError::MismatchedSideLines {
                frame,
                expected,
                found,
            } => write!(
                f,
                "frames have different number of side points: frame {} has {}, expected {}",
                frame, found, expected
            ),
            BodyError::NotEnoughFrames => write!(f, "a body needs at least two frames"),
            BodyError::NotEnoughSideLines => write!(f, "a frame needs at least two side points"),
            BodyError::IndexOutOfRange { index, len } => {
                write!(f, "index {} is out of range for length {}", index, len)
            }
            BodyError::InvalidField(name) => write!(f, "invalid value for field '{}'", name),
            BodyError::PanelCountMismatch { expected, found } => write!(
                f,
                "expected {} pressure coefficients (one per panel), found {}",
                expected, found
            ),
            BodyError::FramesOutOfOrder { index } => write!(
                f,
                "frame {} would leave the frames out of longitudinal order",
                index
            ),
            BodyError::InvalidScale(factor) => {
                write!(f, "longitudinal scale factor {} is not positive", factor)
            }
        }
    }
}

impl Error for BodyError {}
